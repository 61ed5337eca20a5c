pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod metrics;

pub use config::{
    CpuPatternConfig, LatencyPatternConfig, MixPatternConfig, QpsPatternConfig, RateLimiterConfig,
};
pub use error::{Error, Result};
pub use limiter::{
    CpuSampler, FixedCpuSampler, ProcStatCpuSampler, RateLimiterManager, RateLimiterPattern,
    TokenBucketRateLimiter,
};
