use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{MixPatternConfig, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::limiter::sampler::CpuSampler;
use crate::limiter::token_bucket::TokenBucketRateLimiter;
use crate::limiter::window::{tp99_index, HighLoadQpsWindow, LatencyWindow};
use crate::metrics;

/// 舒适区内 high_load_qps 的增长上限
const HIGH_LOAD_QPS_CAP: f64 = i32::MAX as f64;

/// mix 模式的反馈状态，只有调速循环访问
#[derive(Debug)]
struct MixState {
    /// 当前目标 QPS，也就是喂给令牌桶的速率
    max_qps_curr: f64,
    /// 高负载时的 QPS，作为机器最高负载能力的估计
    high_load_qps: f64,
    /// 高负载时的 tp99 延迟（微秒）
    high_load_latency: Option<i64>,
    /// 低负载时的平均延迟（微秒），即 cpu <= min_cpu_usage
    low_load_latency: Option<i64>,
    high_load_window: HighLoadQpsWindow,
}

/// 一个调速周期的输入快照
#[derive(Debug)]
struct MixCycleInput {
    /// 取整后的 CPU 使用率（0..=100）
    cpu_percent: f64,
    /// 本周期到达的请求数
    now_qps: i64,
    /// 本周期放行的请求数
    now_qps_handled: i64,
    /// 延迟窗口的排序快照；窗口未写满一轮时为 None
    sorted_latency: Option<Vec<i64>>,
    /// 延迟窗口均值；窗口未写满一轮时为 None
    latency_mean: Option<i64>,
    tp99_index: usize,
}

impl MixCycleInput {
    fn tp99(&self) -> Option<i64> {
        self.sorted_latency
            .as_ref()
            .map(|sorted| sorted[self.tp99_index])
    }
}

/// 自适应限流管理器
///
/// 持有令牌桶、采样窗口和周期计数器。请求路径只经过
/// `try_acquire` / `record_latency`，内部状态一律不外露。
pub struct RateLimiterManager {
    config: RateLimiterConfig,
    /// 运行期开关，初值来自配置，可用 `set_enabled` 在线切换
    enabled: AtomicBool,
    bucket: TokenBucketRateLimiter,
    cpu_sampler: Arc<dyn CpuSampler>,
    latency_window: LatencyWindow,
    /// 本周期到达计数，调速循环用单次 swap 读取并清零
    current_qps: AtomicI64,
    /// 本周期放行计数
    current_qps_handled: AtomicI64,
    /// 最近一次判定是否发生限流
    is_rate_limited: AtomicBool,
    mix: Mutex<MixState>,
    run: AtomicBool,
    stop_notify: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
    fallback_logged: AtomicBool,
}

impl RateLimiterManager {
    /// 创建管理器：按配置设定窗口尺寸，令牌桶以 mix 模式的
    /// `max_qps_permits` 起步，高负载 QPS 估计也从同一值起步。
    pub fn new(config: RateLimiterConfig, cpu_sampler: Arc<dyn CpuSampler>) -> Self {
        let initial_qps = config.mix_pattern.max_qps_permits;

        Self {
            enabled: AtomicBool::new(config.rate_limiter_enable),
            bucket: TokenBucketRateLimiter::new(initial_qps),
            cpu_sampler,
            latency_window: LatencyWindow::new(config.max_sample_number),
            current_qps: AtomicI64::new(0),
            current_qps_handled: AtomicI64::new(0),
            is_rate_limited: AtomicBool::new(false),
            mix: Mutex::new(MixState {
                max_qps_curr: initial_qps,
                high_load_qps: initial_qps,
                high_load_latency: None,
                low_load_latency: None,
                high_load_window: HighLoadQpsWindow::new(config.mix_pattern.high_load_qps_number),
            }),
            run: AtomicBool::new(false),
            stop_notify: Notify::new(),
            handle: Mutex::new(None),
            fallback_logged: AtomicBool::new(false),
            config,
        }
    }

    /// 启动周期性调速任务
    ///
    /// 只有配置了 `real_time_update_enable` 才会真正起任务；
    /// 重复启动返回 [`Error::AlreadyRunning`]。
    pub fn start(manager: &Arc<Self>) -> Result<()> {
        if !manager.config.real_time_update_enable {
            info!("real_time_update_enable 未开启，调速任务不启动");
            return Ok(());
        }

        let mut handle = manager.handle.lock();
        if handle.is_some() {
            return Err(Error::AlreadyRunning);
        }

        manager.run.store(true, Ordering::Relaxed);
        let task_manager = Arc::clone(manager);
        *handle = Some(tokio::spawn(async move {
            task_manager.run_update_loop().await;
        }));

        info!(
            "rate limiter pattern: {}, max_qps_permits: {:.2} [rate limiter started]",
            manager.config.pattern.as_str(),
            manager.config.mix_pattern.max_qps_permits
        );
        Ok(())
    }

    /// 停止调速任务并等待其退出
    pub async fn stop(&self) {
        self.run.store(false, Ordering::Relaxed);
        self.stop_notify.notify_one();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// 请求入口的限流判定
    ///
    /// 限流功能关闭时直接放行，不做任何计数。
    /// 返回 `Ok(true)` 表示发生限流，请求应被拒绝。
    pub async fn try_acquire(&self) -> Result<bool> {
        if !self.enabled.load(Ordering::Relaxed) {
            return Ok(false);
        }

        self.current_qps.fetch_add(1, Ordering::Relaxed);
        metrics::record_request();

        let throttled = self.bucket.try_acquire(1.0, 0).await?;
        self.is_rate_limited.store(throttled, Ordering::Relaxed);

        if throttled {
            metrics::record_throttled();
        } else {
            self.current_qps_handled.fetch_add(1, Ordering::Relaxed);
        }

        Ok(throttled)
    }

    /// 上报一次已完成请求的耗时，每个请求调用一次
    pub fn record_latency(&self, latency: Duration) {
        self.latency_window.record(latency.as_micros() as i64);
    }

    /// 最近一次判定是否发生了限流
    pub fn is_rate_limited(&self) -> bool {
        self.is_rate_limited.load(Ordering::Relaxed)
    }

    /// 在线切换限流开关（不重启进程）
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 令牌桶当前的速率
    pub async fn current_rate(&self) -> f64 {
        self.bucket.get_rate().await
    }

    /// 调速循环：每个周期跑一轮反馈，关闭时只做廉价轮询。
    /// 单个周期失败只记日志，不中断循环。
    async fn run_update_loop(self: Arc<Self>) {
        let interval = self.config.update_interval();

        while self.run.load(Ordering::Relaxed) {
            if self.enabled.load(Ordering::Relaxed) {
                self.log_pattern_fallback();
                if let Err(e) = self.update_max_qps_by_mix().await {
                    error!("update_max_qps cycle failed: {}", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.stop_notify.notified() => {}
            }
        }

        debug!("rate limiter control loop exited");
    }

    /// 未实现的模式显式回退到 mix，只在第一次记 warn
    fn log_pattern_fallback(&self) {
        if self.config.pattern.is_implemented() {
            return;
        }
        if !self.fallback_logged.swap(true, Ordering::Relaxed) {
            warn!(
                "限流模式 {} 的算法未实现，回退到 mix",
                self.config.pattern.as_str()
            );
        }
    }

    /// mix 模式的一轮调速：采样 CPU，快照延迟窗口，跑分支表，
    /// 把新目标速率推给令牌桶。
    async fn update_max_qps_by_mix(&self) -> Result<()> {
        // 读取并清零本周期计数。单次原子交换：落在交换点之后的
        // 增量归入下一周期，不会丢失。
        let now_qps = self.current_qps.swap(0, Ordering::Relaxed);
        let now_qps_handled = self.current_qps_handled.swap(0, Ordering::Relaxed);

        let ratio = self.cpu_sampler.cpu_ratio().await?;
        let cpu_percent = (ratio * 100.0).floor();

        let input = MixCycleInput {
            cpu_percent,
            now_qps,
            now_qps_handled,
            sorted_latency: self.latency_window.sorted_snapshot(),
            latency_mean: self.latency_window.mean(),
            tp99_index: tp99_index(self.latency_window.capacity()),
        };
        let curr_latency = input.tp99();

        let (before, after, high_load_qps, high_load_latency, low_load_latency) = {
            let mut mix = self.mix.lock();
            let before = mix.max_qps_curr;
            let after = mix_adjust(&mut mix, &input, &self.config.mix_pattern);
            (
                before,
                after,
                mix.high_load_qps,
                mix.high_load_latency,
                mix.low_load_latency,
            )
        };

        self.bucket.set_rate(after).await;

        metrics::record_max_qps(after);
        metrics::record_cpu_usage(cpu_percent);
        metrics::record_high_load_qps(high_load_qps);

        info!(
            "[RATE LIMITER] update_max_qps_by_mix: cpu={:.0}, now_qps={}, now_qps_handled={}, \
             high_load_qps={:.0}, high_load_latency={:?}, low_load_latency={:?}, curr_latency={:?}, \
             is_rate_limited={}, before max_qps_curr={:.2}, after max_qps_curr={:.2}",
            cpu_percent,
            now_qps,
            now_qps_handled,
            high_load_qps,
            high_load_latency,
            low_load_latency,
            curr_latency,
            self.is_rate_limited(),
            before,
            after,
        );

        Ok(())
    }
}

/// mix 模式的分支表
///
/// 两段各自「先匹配先生效」：记录段维护高/低负载的反馈信号，
/// 调整段推算新的目标 QPS。区间边界的开闭混用是刻意保留的，
/// 改动会让恰好落在阈值上的取值换分支。
fn mix_adjust(state: &mut MixState, input: &MixCycleInput, pattern: &MixPatternConfig) -> f64 {
    let cpu = input.cpu_percent;
    let p = pattern.adjust_load_percent;

    // 记录段
    if pattern.max_cpu_usage - pattern.max_cpu_delta <= cpu
        && cpu <= pattern.max_cpu_usage + pattern.max_cpu_delta
    {
        // CPU 贴近目标区间：记录本周期放行 QPS，取窗口最大值作为
        // 机器可持续峰值；放行数为 0 时退回当前目标值
        let sample = if input.now_qps_handled <= 0 {
            state.max_qps_curr as i64
        } else {
            input.now_qps_handled
        };
        state.high_load_window.record(sample);

        if state.high_load_window.is_warm() {
            state.high_load_qps = state.high_load_window.max() as f64;
            if let Some(sorted) = &input.sorted_latency {
                state.high_load_latency = Some(sorted[input.tp99_index]);
            }
        }
    } else if cpu <= pattern.min_cpu_usage {
        if let Some(mean) = input.latency_mean {
            state.low_load_latency = Some(mean);
        }
        state.high_load_window.clear();
    } else {
        state.high_load_window.clear();
    }

    // 调整段
    let old = state.max_qps_curr;
    if cpu >= pattern.max_cpu_usage {
        state.max_qps_curr = old * (1.0 - p) + input.now_qps_handled as f64 * p / 2.0;
    } else if cpu >= pattern.max_cpu_usage - pattern.max_cpu_delta {
        state.max_qps_curr = old * (1.0 - p) + input.now_qps_handled as f64 * p;
    } else if cpu <= pattern.min_cpu_usage {
        if input.now_qps_handled as f64 > state.high_load_qps * 0.9 {
            state.max_qps_curr = (state.high_load_qps * 2.0).min(old * (1.0 + p));
            state.high_load_qps = state.max_qps_curr;
        } else {
            state.max_qps_curr = state.high_load_qps.min(old * (1.0 + p));
        }
    } else if cpu < pattern.max_cpu_usage - pattern.max_cpu_delta {
        // 舒适区：到达数超过放行数说明还有被压下去的需求
        if input.now_qps > input.now_qps_handled {
            state.high_load_qps = (state.high_load_qps * (1.0 + p)).min(HIGH_LOAD_QPS_CAP);
        }
        match state.high_load_latency {
            Some(high_latency) => {
                if let Some(tp99) = input.tp99() {
                    if (tp99 as f64) < high_latency as f64 * (1.0 - p) {
                        state.max_qps_curr = state.high_load_qps.min(old * (1.0 + p));
                    }
                }
                // 延迟窗口样本不足：留待下个周期
            }
            None => {
                state.max_qps_curr = state.high_load_qps.min(old * (1.0 + p));
            }
        }
    }

    state.max_qps_curr = state.max_qps_curr.max(pattern.min_qps_permits);
    state.max_qps_curr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::sampler::FixedCpuSampler;
    use std::sync::atomic::AtomicI64;

    fn mix_state(max_qps: f64, high_load_qps: f64) -> MixState {
        MixState {
            max_qps_curr: max_qps,
            high_load_qps,
            high_load_latency: None,
            low_load_latency: None,
            high_load_window: HighLoadQpsWindow::new(4),
        }
    }

    fn input(cpu: f64, now_qps: i64, handled: i64) -> MixCycleInput {
        MixCycleInput {
            cpu_percent: cpu,
            now_qps,
            now_qps_handled: handled,
            sorted_latency: None,
            latency_mean: None,
            tp99_index: 0,
        }
    }

    fn pattern(p: f64) -> MixPatternConfig {
        MixPatternConfig {
            adjust_load_percent: p,
            ..MixPatternConfig::default()
        }
    }

    #[test]
    fn overload_cycle_blends_half_handled() {
        // cpu=97 >= max_cpu=96：old*(1-p) + handled*p/2
        let mut state = mix_state(200.0, 500.0);
        let result = mix_adjust(&mut state, &input(97.0, 150, 150), &pattern(0.05));
        assert!((result - 193.75).abs() < 1e-9);
    }

    #[test]
    fn near_target_band_blends_full_handled() {
        // max_cpu - delta = 93 <= cpu=94 < 96：old*(1-p) + handled*p
        let mut state = mix_state(200.0, 500.0);
        let result = mix_adjust(&mut state, &input(94.0, 150, 150), &pattern(0.05));
        assert!((result - (200.0 * 0.95 + 150.0 * 0.05)).abs() < 1e-9);
    }

    #[test]
    fn boundary_values_pick_the_overload_branch() {
        // cpu 恰好等于 max_cpu 走 >= max_cpu 分支，不是 band 分支
        let mut state = mix_state(200.0, 500.0);
        let result = mix_adjust(&mut state, &input(96.0, 100, 100), &pattern(0.05));
        assert!((result - (200.0 * 0.95 + 100.0 * 0.05 / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn sustained_overload_drives_rate_to_floor() {
        let cfg = pattern(0.05);
        let mut state = mix_state(500.0, 500.0);
        let mut last = state.max_qps_curr;

        for _ in 0..400 {
            let result = mix_adjust(&mut state, &input(98.0, 0, 0), &cfg);
            assert!(result <= last, "rate must be non-increasing under overload");
            last = result;
        }
        assert_eq!(last, cfg.min_qps_permits);
    }

    #[test]
    fn sustained_idle_grows_rate_bounded_by_twice_high_load_qps() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 100.0);
        let mut last = state.max_qps_curr;

        for _ in 0..100 {
            let high_before = state.high_load_qps;
            // 放行数贴近 high_load_qps，走向上突破的分支
            let handled = (high_before * 0.95) as i64;
            let result = mix_adjust(&mut state, &input(50.0, handled, handled), &cfg);
            assert!(result >= last, "rate must grow under low load");
            assert!(result <= high_before * 2.0, "growth is capped at twice the peak estimate");
            last = result;
        }
    }

    #[test]
    fn idle_with_low_demand_converges_to_high_load_qps() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 120.0);

        for _ in 0..50 {
            // handled 远低于 high_load_qps*0.9，增长被 high_load_qps 封顶
            mix_adjust(&mut state, &input(50.0, 10, 10), &cfg);
        }
        assert_eq!(state.max_qps_curr, 120.0);
    }

    #[test]
    fn comfortable_zone_grows_when_latency_improved() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 300.0);
        state.high_load_latency = Some(1000);

        let mut cycle = input(85.0, 50, 50);
        // tp99 = 800 < 1000 * 0.95
        cycle.sorted_latency = Some(vec![100, 200, 300, 800]);
        cycle.tp99_index = 3;

        let result = mix_adjust(&mut state, &cycle, &cfg);
        assert!((result - 105.0).abs() < 1e-9);
    }

    #[test]
    fn comfortable_zone_holds_when_latency_still_high() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 300.0);
        state.high_load_latency = Some(1000);

        let mut cycle = input(85.0, 50, 50);
        // tp99 = 990 >= 1000 * 0.95
        cycle.sorted_latency = Some(vec![100, 200, 300, 990]);
        cycle.tp99_index = 3;

        let result = mix_adjust(&mut state, &cycle, &cfg);
        assert_eq!(result, 100.0);
    }

    #[test]
    fn comfortable_zone_grows_when_no_high_load_latency_yet() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 300.0);

        let result = mix_adjust(&mut state, &input(85.0, 50, 50), &cfg);
        assert!((result - 105.0).abs() < 1e-9);
    }

    #[test]
    fn comfortable_zone_skips_growth_on_cold_window() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 300.0);
        state.high_load_latency = Some(1000);

        // 延迟窗口未写满：既不增长也不回落
        let result = mix_adjust(&mut state, &input(85.0, 50, 50), &cfg);
        assert_eq!(result, 100.0);
    }

    #[test]
    fn comfortable_zone_raises_peak_estimate_on_suppressed_demand() {
        let cfg = pattern(0.05);
        let mut state = mix_state(100.0, 200.0);

        // 到达数 > 放行数：peak 估计上调 5%
        mix_adjust(&mut state, &input(85.0, 120, 80), &cfg);
        assert!((state.high_load_qps - 210.0).abs() < 1e-9);

        // 封顶在 int32 上限
        state.high_load_qps = HIGH_LOAD_QPS_CAP;
        mix_adjust(&mut state, &input(85.0, 120, 80), &cfg);
        assert_eq!(state.high_load_qps, HIGH_LOAD_QPS_CAP);
    }

    #[test]
    fn near_target_band_records_peak_after_full_round() {
        let cfg = pattern(0.05);
        let mut state = mix_state(200.0, 500.0);

        let mut cycle = input(95.0, 300, 0);
        cycle.sorted_latency = Some(vec![10, 20, 30, 40]);
        cycle.tp99_index = 3;

        // 放行数为 0 的周期用当前目标值占位
        mix_adjust(&mut state, &cycle, &cfg);
        assert!(!state.high_load_window.is_warm());

        for handled in [260, 250, 240] {
            let mut cycle = input(95.0, 300, handled);
            cycle.sorted_latency = Some(vec![10, 20, 30, 40]);
            cycle.tp99_index = 3;
            mix_adjust(&mut state, &cycle, &cfg);
        }

        assert!(state.high_load_window.is_warm());
        assert!(state.high_load_qps >= 200.0);
        assert_eq!(state.high_load_latency, Some(40));
    }

    #[test]
    fn low_cpu_records_mean_latency_and_clears_peak_window() {
        let cfg = pattern(0.05);
        let mut state = mix_state(200.0, 500.0);
        for _ in 0..4 {
            state.high_load_window.record(400);
        }
        assert!(state.high_load_window.is_warm());

        let mut cycle = input(50.0, 10, 10);
        cycle.latency_mean = Some(250);

        mix_adjust(&mut state, &cycle, &cfg);
        assert_eq!(state.low_load_latency, Some(250));
        assert!(!state.high_load_window.is_warm());
    }

    #[test]
    fn middling_cpu_clears_peak_window() {
        // min_cpu < cpu < max_cpu - delta 以外的兜底分支（如 92.9 之上、93 未满）
        let cfg = pattern(0.05);
        let mut state = mix_state(200.0, 500.0);
        for _ in 0..4 {
            state.high_load_window.record(400);
        }

        mix_adjust(&mut state, &input(92.0, 10, 10), &cfg);
        assert!(!state.high_load_window.is_warm());
    }

    #[test]
    fn rate_never_drops_below_floor() {
        let cfg = pattern(0.5);
        let mut state = mix_state(60.0, 500.0);

        let result = mix_adjust(&mut state, &input(99.0, 0, 0), &cfg);
        assert_eq!(result, cfg.min_qps_permits);
    }

    #[test]
    fn counter_swap_loses_nothing() {
        // 读取-清零用单次 swap：并发增量要么进本周期、要么进下周期
        let counter = Arc::new(AtomicI64::new(0));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100_000 {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        let mut collected = 0i64;
        loop {
            collected += counter.swap(0, Ordering::Relaxed);
            if writers.iter().all(|w| w.is_finished()) {
                break;
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        collected += counter.swap(0, Ordering::Relaxed);

        assert_eq!(collected, 400_000);
    }

    fn enabled_config() -> RateLimiterConfig {
        RateLimiterConfig {
            rate_limiter_enable: true,
            real_time_update_enable: true,
            max_sample_number: 10,
            update_qps_time_ms: 100,
            ..RateLimiterConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_manager_admits_without_accounting() {
        let config = RateLimiterConfig::default();
        let sampler = Arc::new(FixedCpuSampler::new(0.5));
        let manager = RateLimiterManager::new(config, sampler);

        for _ in 0..100 {
            assert!(!manager.try_acquire().await.unwrap());
        }
        assert_eq!(manager.current_qps.load(Ordering::Relaxed), 0);
        assert_eq!(manager.current_qps_handled.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_manager_counts_arrivals_and_admissions() {
        let sampler = Arc::new(FixedCpuSampler::new(0.5));
        let manager = RateLimiterManager::new(enabled_config(), sampler);

        for _ in 0..10 {
            assert!(!manager.try_acquire().await.unwrap());
        }
        assert_eq!(manager.current_qps.load(Ordering::Relaxed), 10);
        assert_eq!(manager.current_qps_handled.load(Ordering::Relaxed), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn update_cycle_pushes_new_rate_into_bucket() {
        let sampler = Arc::new(FixedCpuSampler::new(0.98));
        let manager = RateLimiterManager::new(enabled_config(), sampler);
        assert_eq!(manager.current_rate().await, 500.0);

        manager.update_max_qps_by_mix().await.unwrap();
        let rate = manager.current_rate().await;
        assert!(rate < 500.0);

        for _ in 0..300 {
            manager.update_max_qps_by_mix().await.unwrap();
        }
        assert_eq!(manager.current_rate().await, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_is_rejected() {
        let sampler = Arc::new(FixedCpuSampler::new(0.5));
        let manager = Arc::new(RateLimiterManager::new(enabled_config(), sampler));

        RateLimiterManager::start(&manager).unwrap();
        assert!(matches!(
            RateLimiterManager::start(&manager),
            Err(Error::AlreadyRunning)
        ));
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_toggle_switches_accounting() {
        let sampler = Arc::new(FixedCpuSampler::new(0.5));
        let manager = RateLimiterManager::new(enabled_config(), sampler);

        assert!(manager.is_enabled());
        manager.set_enabled(false);
        for _ in 0..5 {
            assert!(!manager.try_acquire().await.unwrap());
        }
        assert_eq!(manager.current_qps.load(Ordering::Relaxed), 0);

        manager.set_enabled(true);
        assert!(!manager.try_acquire().await.unwrap());
        assert_eq!(manager.current_qps.load(Ordering::Relaxed), 1);
    }
}
