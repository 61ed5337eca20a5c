use thiserror::Error;

/// 限流器错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 申请的令牌数不合法（必须 > 0）
    #[error("invalid permits: {0} (must be greater than 0)")]
    InvalidPermits(f64),

    /// 配置错误
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 控制循环已在运行
    #[error("rate limiter control loop is already running")]
    AlreadyRunning,

    /// CPU 采样失败
    #[error("cpu sampler error: {0}")]
    Sampler(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;
