use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::limiter::pattern::RateLimiterPattern;

/// 限流器配置
///
/// 启动时加载一次，之后只读。运行期的开关切换走
/// `RateLimiterManager::set_enabled`，不回写配置。
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// 是否启用限流功能
    pub rate_limiter_enable: bool,
    /// 限流模式
    pub pattern: RateLimiterPattern,
    /// 是否启动周期性调速任务
    pub real_time_update_enable: bool,
    /// latency 采样窗口大小
    pub max_sample_number: usize,
    /// 多长时间计算一次 max_qps（毫秒）
    pub update_qps_time_ms: u64,

    /// mix 模式（cpu + latency 混合自适应）
    pub mix_pattern: MixPatternConfig,
    /// cpu 模式
    pub cpu_pattern: CpuPatternConfig,
    /// latency 模式
    pub latency_pattern: LatencyPatternConfig,
    /// qps 模式
    pub qps_pattern: QpsPatternConfig,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate_limiter_enable: false,
            pattern: RateLimiterPattern::Mix,
            real_time_update_enable: false,
            max_sample_number: 1000,
            update_qps_time_ms: 1000,
            mix_pattern: MixPatternConfig::default(),
            cpu_pattern: CpuPatternConfig::default(),
            latency_pattern: LatencyPatternConfig::default(),
            qps_pattern: QpsPatternConfig::default(),
        }
    }
}

/// mix 模式参数
#[derive(Debug, Clone)]
pub struct MixPatternConfig {
    pub min_qps_permits: f64,
    pub max_qps_permits: f64,
    /// 一次调整负载增减的百分比
    pub adjust_load_percent: f64,
    pub max_cpu_usage: f64,
    pub max_cpu_delta: f64,
    pub min_cpu_usage: f64,
    /// 高负载 QPS 采样区间的大小
    pub high_load_qps_number: usize,
}

impl Default for MixPatternConfig {
    fn default() -> Self {
        Self {
            min_qps_permits: 50.0,
            max_qps_permits: 500.0,
            adjust_load_percent: 0.03,
            max_cpu_usage: 96.0,
            max_cpu_delta: 3.0,
            min_cpu_usage: 80.0,
            high_load_qps_number: 4,
        }
    }
}

/// cpu 模式参数（数据持有，算法未实现，运行时回退到 mix）
#[derive(Debug, Clone)]
pub struct CpuPatternConfig {
    pub min_qps_permits: f64,
    pub max_qps_permits: f64,
    pub adjust_load_percent: f64,
    pub max_cpu_usage: f64,
    pub min_cpu_usage: f64,
}

impl Default for CpuPatternConfig {
    fn default() -> Self {
        Self {
            min_qps_permits: 50.0,
            max_qps_permits: 500.0,
            adjust_load_percent: 0.05,
            max_cpu_usage: 95.0,
            min_cpu_usage: 80.0,
        }
    }
}

/// latency 模式参数（数据持有，算法未实现，运行时回退到 mix）
#[derive(Debug, Clone)]
pub struct LatencyPatternConfig {
    pub min_qps_permits: f64,
    pub max_qps_permits: f64,
    pub max_latency_ms: u64,
    pub min_latency_ms: u64,
    /// 滑动窗口圈定请求数量
    pub min_sample_number: u32,
    pub change_sample_ratio: f64,
    pub adjust_load_percent: f64,
    /// 在滑动窗口内，大于 max_latency 的请求比例上限
    pub max_latency_ratio: f64,
    /// 在滑动窗口内，小于 min_latency 的请求比例
    pub min_latency_ratio: f64,
    /// 在滑动窗口内，大于 max_latency 的请求比例下限
    pub max_latency_ratio_min: f64,
    /// QPS 为 0 的时候，置空队列，恢复限流前状态
    pub empty_queue_ratio: f64,
}

impl Default for LatencyPatternConfig {
    fn default() -> Self {
        Self {
            min_qps_permits: 50.0,
            max_qps_permits: 500.0,
            max_latency_ms: 600,
            min_latency_ms: 100,
            min_sample_number: 100,
            change_sample_ratio: 0.5,
            adjust_load_percent: 0.05,
            max_latency_ratio: 0.30,
            min_latency_ratio: 0.95,
            max_latency_ratio_min: 0.03,
            empty_queue_ratio: 0.2,
        }
    }
}

/// qps 模式参数（数据持有，算法未实现，运行时回退到 mix）
#[derive(Debug, Clone)]
pub struct QpsPatternConfig {
    pub max_qps_permits: f64,
}

impl Default for QpsPatternConfig {
    fn default() -> Self {
        Self {
            max_qps_permits: 500.0,
        }
    }
}

impl RateLimiterConfig {
    /// 调速周期
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_qps_time_ms)
    }

    /// 从 TOML 文件加载配置
    ///
    /// 缺失 `[rate_limiter]` 段是致命错误；各 pattern 段缺失时使用内置默认值。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| "配置文件格式错误")?;

        if toml_config.rate_limiter.is_none() {
            bail!("配置缺少 [rate_limiter] 段: {:?}", path.as_ref());
        }

        Ok(toml_config.into())
    }

    /// 从环境变量合并配置（LOADGATE_ 前缀）
    pub fn merge_from_env(&mut self) {
        if let Ok(enable) = env::var("LOADGATE_RATE_LIMITER_ENABLE") {
            self.rate_limiter_enable = enable.parse().unwrap_or(self.rate_limiter_enable);
        }
        if let Ok(pattern) = env::var("LOADGATE_RATE_LIMITER_PATTERN") {
            self.pattern = RateLimiterPattern::from_str_lossy(&pattern);
        }
        if let Ok(realtime) = env::var("LOADGATE_REAL_TIME_UPDATE_ENABLE") {
            self.real_time_update_enable = realtime.parse().unwrap_or(self.real_time_update_enable);
        }
        if let Ok(samples) = env::var("LOADGATE_MAX_SAMPLE_NUMBER") {
            match samples.parse() {
                Ok(value) if value > 0 => self.max_sample_number = value,
                _ => warn!("LOADGATE_MAX_SAMPLE_NUMBER={} 非法，保持 {}", samples, self.max_sample_number),
            }
        }
        if let Ok(interval) = env::var("LOADGATE_UPDATE_QPS_TIME_MS") {
            match interval.parse() {
                Ok(value) if value > 0 => self.update_qps_time_ms = value,
                _ => warn!("LOADGATE_UPDATE_QPS_TIME_MS={} 非法，保持 {}", interval, self.update_qps_time_ms),
            }
        }
    }

    /// 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            info!("从配置文件加载: {:?}", path);
            Self::from_toml_file(path)?
        } else if Path::new("loadgate.toml").exists() {
            info!("从默认配置文件加载: loadgate.toml");
            Self::from_toml_file("loadgate.toml")?
        } else {
            Self::default()
        };

        config.merge_from_env();

        Ok(config)
    }
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    rate_limiter: Option<TomlRateLimiterConfig>,
    mix_pattern: Option<TomlMixPatternConfig>,
    cpu_pattern: Option<TomlCpuPatternConfig>,
    latency_pattern: Option<TomlLatencyPatternConfig>,
    qps_pattern: Option<TomlQpsPatternConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlRateLimiterConfig {
    rate_limiter_enable: Option<bool>,
    rate_limiter_pattern: Option<String>,
    real_time_update_enable: Option<bool>,
    max_sample_number: Option<usize>,
    update_qps_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlMixPatternConfig {
    min_qps_permits: Option<f64>,
    max_qps_permits: Option<f64>,
    adjust_load_percent: Option<f64>,
    max_cpu_usage: Option<f64>,
    max_cpu_delta: Option<f64>,
    min_cpu_usage: Option<f64>,
    high_load_qps_number: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TomlCpuPatternConfig {
    min_qps_permits: Option<f64>,
    max_qps_permits: Option<f64>,
    adjust_load_percent: Option<f64>,
    max_cpu_usage: Option<f64>,
    min_cpu_usage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlLatencyPatternConfig {
    min_qps_permits: Option<f64>,
    max_qps_permits: Option<f64>,
    max_latency_ms: Option<u64>,
    min_latency_ms: Option<u64>,
    min_sample_number: Option<u32>,
    change_sample_ratio: Option<f64>,
    adjust_load_percent: Option<f64>,
    max_latency_ratio: Option<f64>,
    min_latency_ratio: Option<f64>,
    max_latency_ratio_min: Option<f64>,
    empty_queue_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlQpsPatternConfig {
    max_qps_permits: Option<f64>,
}

impl From<TomlConfig> for RateLimiterConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(rate_limiter) = toml.rate_limiter {
            if let Some(enable) = rate_limiter.rate_limiter_enable {
                config.rate_limiter_enable = enable;
            }
            if let Some(pattern) = rate_limiter.rate_limiter_pattern {
                config.pattern = RateLimiterPattern::from_str_lossy(&pattern);
            }
            if let Some(realtime) = rate_limiter.real_time_update_enable {
                config.real_time_update_enable = realtime;
            }
            if let Some(samples) = rate_limiter.max_sample_number {
                if samples == 0 {
                    warn!("max_sample_number 不能为 0，使用默认值 {}", config.max_sample_number);
                } else {
                    config.max_sample_number = samples;
                }
            }
            if let Some(interval) = rate_limiter.update_qps_time_ms {
                if interval == 0 {
                    warn!("update_qps_time_ms 不能为 0，使用默认值 {}", config.update_qps_time_ms);
                } else {
                    config.update_qps_time_ms = interval;
                }
            }
        }

        if let Some(mix) = toml.mix_pattern {
            if let Some(min) = mix.min_qps_permits {
                config.mix_pattern.min_qps_permits = min;
            }
            if let Some(max) = mix.max_qps_permits {
                config.mix_pattern.max_qps_permits = max;
            }
            if let Some(adjust) = mix.adjust_load_percent {
                config.mix_pattern.adjust_load_percent = adjust;
            }
            if let Some(max_cpu) = mix.max_cpu_usage {
                config.mix_pattern.max_cpu_usage = max_cpu;
            }
            if let Some(delta) = mix.max_cpu_delta {
                config.mix_pattern.max_cpu_delta = delta;
            }
            if let Some(min_cpu) = mix.min_cpu_usage {
                config.mix_pattern.min_cpu_usage = min_cpu;
            }
            if let Some(number) = mix.high_load_qps_number {
                if number == 0 {
                    warn!(
                        "high_load_qps_number 不能为 0，使用默认值 {}",
                        config.mix_pattern.high_load_qps_number
                    );
                } else {
                    config.mix_pattern.high_load_qps_number = number;
                }
            }
        }

        if let Some(cpu) = toml.cpu_pattern {
            if let Some(min) = cpu.min_qps_permits {
                config.cpu_pattern.min_qps_permits = min;
            }
            if let Some(max) = cpu.max_qps_permits {
                config.cpu_pattern.max_qps_permits = max;
            }
            if let Some(adjust) = cpu.adjust_load_percent {
                config.cpu_pattern.adjust_load_percent = adjust;
            }
            if let Some(max_cpu) = cpu.max_cpu_usage {
                config.cpu_pattern.max_cpu_usage = max_cpu;
            }
            if let Some(min_cpu) = cpu.min_cpu_usage {
                config.cpu_pattern.min_cpu_usage = min_cpu;
            }
        }

        if let Some(latency) = toml.latency_pattern {
            if let Some(min) = latency.min_qps_permits {
                config.latency_pattern.min_qps_permits = min;
            }
            if let Some(max) = latency.max_qps_permits {
                config.latency_pattern.max_qps_permits = max;
            }
            if let Some(max_ms) = latency.max_latency_ms {
                config.latency_pattern.max_latency_ms = max_ms;
            }
            if let Some(min_ms) = latency.min_latency_ms {
                config.latency_pattern.min_latency_ms = min_ms;
            }
            if let Some(min_samples) = latency.min_sample_number {
                config.latency_pattern.min_sample_number = min_samples;
            }
            if let Some(ratio) = latency.change_sample_ratio {
                config.latency_pattern.change_sample_ratio = ratio;
            }
            if let Some(adjust) = latency.adjust_load_percent {
                config.latency_pattern.adjust_load_percent = adjust;
            }
            if let Some(ratio) = latency.max_latency_ratio {
                config.latency_pattern.max_latency_ratio = ratio;
            }
            if let Some(ratio) = latency.min_latency_ratio {
                config.latency_pattern.min_latency_ratio = ratio;
            }
            if let Some(ratio) = latency.max_latency_ratio_min {
                config.latency_pattern.max_latency_ratio_min = ratio;
            }
            if let Some(ratio) = latency.empty_queue_ratio {
                config.latency_pattern.empty_queue_ratio = ratio;
            }
        }

        if let Some(qps) = toml.qps_pattern {
            if let Some(max) = qps.max_qps_permits {
                config.qps_pattern.max_qps_permits = max;
            }
        }

        config
    }
}
