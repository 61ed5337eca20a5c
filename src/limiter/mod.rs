pub mod manager;
pub mod pattern;
pub mod sampler;
pub mod token_bucket;
pub mod window;

pub use manager::RateLimiterManager;
pub use pattern::RateLimiterPattern;
pub use sampler::{CpuSampler, FixedCpuSampler, ProcStatCpuSampler};
pub use token_bucket::TokenBucketRateLimiter;
