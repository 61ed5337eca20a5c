use serde::Deserialize;
use tracing::warn;

/// 限流模式
///
/// 配置里四种模式都可以声明，但目前只有 `Mix` 有完整算法；
/// 其余模式在调速循环里会显式记一条 warn 日志并按 `Mix` 执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimiterPattern {
    /// 仅按 CPU 自适应（未实现）
    Cpu,
    /// 仅按延迟自适应（未实现）
    Latency,
    /// CPU 和延迟混合自适应
    Mix,
    /// 固定 QPS（未实现）
    Qps,
}

impl RateLimiterPattern {
    /// 字符串解析；未知取值回退到 `Mix` 并记录 warn
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "cpu" => RateLimiterPattern::Cpu,
            "latency" => RateLimiterPattern::Latency,
            "mix" => RateLimiterPattern::Mix,
            "qps" => RateLimiterPattern::Qps,
            other => {
                warn!("未知的限流模式: {}，使用默认 mix", other);
                RateLimiterPattern::Mix
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimiterPattern::Cpu => "cpu",
            RateLimiterPattern::Latency => "latency",
            RateLimiterPattern::Mix => "mix",
            RateLimiterPattern::Qps => "qps",
        }
    }

    /// 该模式的调速算法是否已实现
    pub fn is_implemented(&self) -> bool {
        matches!(self, RateLimiterPattern::Mix)
    }
}
