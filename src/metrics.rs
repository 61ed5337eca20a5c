//! Prometheus 指标：当前目标 QPS、CPU 使用率、限流判定量等
//!
//! 通过 `init()` 安装全局 Recorder；宿主服务用 `render_metrics()` 暴露抓取端点。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const GAUGE_MAX_QPS: &str = "loadgate_max_qps_current";
const GAUGE_CPU_USAGE: &str = "loadgate_cpu_usage_percent";
const GAUGE_HIGH_LOAD_QPS: &str = "loadgate_high_load_qps";
const COUNTER_REQUESTS: &str = "loadgate_requests_total";
const COUNTER_THROTTLED: &str = "loadgate_requests_throttled_total";

/// 初始化 Prometheus 指标（安装全局 Recorder，返回 Handle 用于 HTTP 暴露）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 是否已初始化
pub fn is_initialized() -> bool {
    HANDLE.get().is_some()
}

/// 渲染当前指标为 Prometheus 文本格式，供宿主的 GET /metrics 使用。
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 更新当前目标 QPS（Gauge）。每个调速周期结束后调用。
pub fn record_max_qps(qps: f64) {
    metrics::gauge!(GAUGE_MAX_QPS).set(qps);
}

/// 更新本周期观测到的 CPU 使用率（Gauge）。
pub fn record_cpu_usage(percent: f64) {
    metrics::gauge!(GAUGE_CPU_USAGE).set(percent);
}

/// 更新高负载 QPS 估计值（Gauge）。
pub fn record_high_load_qps(qps: f64) {
    metrics::gauge!(GAUGE_HIGH_LOAD_QPS).set(qps);
}

/// 记录一次进入限流判定的请求。
pub fn record_request() {
    metrics::counter!(COUNTER_REQUESTS).increment(1);
}

/// 记录一次被限流拒绝的请求。
pub fn record_throttled() {
    metrics::counter!(COUNTER_THROTTLED).increment(1);
}
