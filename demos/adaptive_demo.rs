use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::info;

use loadgate::{FixedCpuSampler, RateLimiterConfig, RateLimiterManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    info!("🚀 loadgate 自适应限流演示");

    let config = RateLimiterConfig {
        rate_limiter_enable: true,
        real_time_update_enable: true,
        max_sample_number: 100,
        update_qps_time_ms: 1000,
        ..RateLimiterConfig::default()
    };

    let sampler = Arc::new(FixedCpuSampler::new(0.5));
    let manager = Arc::new(RateLimiterManager::new(config, sampler.clone()));
    RateLimiterManager::start(&manager)?;

    // 模拟请求方：持续打入超过限速的流量并上报延迟
    let load_manager = manager.clone();
    let load = tokio::spawn(async move {
        loop {
            sleep(Duration::from_millis(1)).await;
            if let Ok(throttled) = load_manager.try_acquire().await {
                if !throttled {
                    let latency_ms = 5 + fastrand::u64(0..10);
                    load_manager.record_latency(Duration::from_millis(latency_ms));
                }
            }
        }
    });

    // 三个阶段：空闲 -> 过载 -> 恢复
    info!("阶段 1：CPU 50%，低负载");
    sleep(Duration::from_secs(10)).await;
    info!("当前速率: {:.2}", manager.current_rate().await);

    info!("阶段 2：CPU 98%，过载，目标速率应持续回落");
    sampler.set_ratio(0.98);
    sleep(Duration::from_secs(20)).await;
    info!("当前速率: {:.2}", manager.current_rate().await);

    info!("阶段 3：CPU 恢复 50%，目标速率应逐步回升");
    sampler.set_ratio(0.5);
    sleep(Duration::from_secs(20)).await;
    info!("当前速率: {:.2}", manager.current_rate().await);

    load.abort();
    manager.stop().await;
    info!("✅ 演示完成");
    Ok(())
}
