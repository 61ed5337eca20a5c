use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// 容量配置非法时的默认最大 QPS
pub const DEFAULT_MAX_QPS: f64 = 500.0;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// 令牌桶内部状态
///
/// 不变式：`0 <= stored_permits <= max_permits`；`next_free` 单调不减。
#[derive(Debug, Clone)]
struct BucketState {
    /// 最大令牌桶容量（= 当前速率）
    max_permits: f64,
    /// 当前桶内的令牌数
    stored_permits: f64,
    /// 下一个零等待时刻（相对创建时刻的微秒数）
    next_free: u64,
    /// 生成一个令牌的耗时（微秒）
    interval: f64,
}

/// 令牌桶限速器
///
/// 所有操作串行在同一把锁上，`try_acquire` 的等待阶段也持锁 —
/// 一个调用者在睡掉它的配额等待时，其他调用者拿不到令牌、速率也改不了。
/// 这是刻意的全局临界区，保证了排队的先后顺序。
pub struct TokenBucketRateLimiter {
    start: Instant,
    state: Mutex<BucketState>,
}

impl TokenBucketRateLimiter {
    /// 创建令牌桶；`max_permits <= 0` 时回退到 [`DEFAULT_MAX_QPS`]。
    /// 桶以满容量启动。
    pub fn new(max_permits: f64) -> Self {
        let effective = if max_permits <= 0.0 {
            warn!(
                "TokenBucketLimiter max_permits={:.2} 非法，回退到默认值 {:.2}",
                max_permits, DEFAULT_MAX_QPS
            );
            DEFAULT_MAX_QPS
        } else {
            max_permits
        };

        debug!("TokenBucketLimiter init max_permits={:.2}", effective);

        Self {
            start: Instant::now(),
            state: Mutex::new(BucketState {
                max_permits: effective,
                stored_permits: effective,
                next_free: 0,
                interval: MICROS_PER_SEC / effective,
            }),
        }
    }

    /// 尝试获取 `permits` 个令牌，最多容忍 `timeout_micros` 微秒的排队。
    ///
    /// 返回 `Ok(true)` 表示发生限流、请求应被丢弃，桶状态不变；
    /// 返回 `Ok(false)` 表示放行，调用可能已经在桶内睡掉了配额等待。
    pub async fn try_acquire(&self, permits: f64, timeout_micros: u64) -> Result<bool> {
        if permits <= 0.0 {
            return Err(Error::InvalidPermits(permits));
        }

        let mut state = self.state.lock().await;
        let now = self.start.elapsed().as_micros() as u64;

        if state.next_free > now + timeout_micros {
            // 限流：拒绝的请求不消耗也不预支任何容量
            return Ok(true);
        }

        // 补发闲置期间生成的令牌
        if now > state.next_free {
            let step = (now - state.next_free) as f64 / state.interval;
            state.stored_permits = (state.stored_permits + step).min(state.max_permits);
            state.next_free = now;
        }

        let wait = state.next_free - now;
        let stored = permits.min(state.stored_permits);
        let fresh = permits - stored;
        state.next_free += (fresh * state.interval) as u64;
        state.stored_permits -= stored;

        if wait > 0 {
            // 持锁等待，见类型注释
            sleep(Duration::from_micros(wait)).await;
        }

        Ok(false)
    }

    /// 更新速率；`rate <= 0` 拒绝为 no-op，保留原速率。
    pub async fn set_rate(&self, rate: f64) {
        if rate <= 0.0 {
            warn!("TokenBucketLimiter set_rate rate must be greater than 0, got {:.2}", rate);
            return;
        }

        let mut state = self.state.lock().await;
        state.interval = MICROS_PER_SEC / rate;
        state.max_permits = rate;
        debug!("TokenBucketLimiter setting rate to {:.2}", rate);
    }

    /// 当前速率
    pub async fn get_rate(&self) -> f64 {
        self.state.lock().await.max_permits
    }
}
