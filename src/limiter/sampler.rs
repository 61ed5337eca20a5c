use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// CPU 使用率采样接口
///
/// 调速循环每个周期轮询一次。实现方返回瞬时使用率，取值 0.0..=1.0。
#[async_trait]
pub trait CpuSampler: Send + Sync {
    async fn cpu_ratio(&self) -> Result<f64>;
}

/// 基于 /proc/stat 的 CPU 采样器
///
/// 用相邻两次读取之间 busy/total jiffy 的差值计算使用率，
/// 第一次调用没有基线，返回 0。
pub struct ProcStatCpuSampler {
    prev: Mutex<Option<CpuTimes>>,
}

#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

impl ProcStatCpuSampler {
    pub fn new() -> Self {
        Self {
            prev: Mutex::new(None),
        }
    }

    fn read_cpu_times() -> Result<CpuTimes> {
        let content = std::fs::read_to_string("/proc/stat")?;
        let line = content
            .lines()
            .next()
            .ok_or_else(|| Error::Sampler("/proc/stat is empty".to_string()))?;
        parse_cpu_line(line)
    }
}

impl Default for ProcStatCpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析 /proc/stat 的聚合 cpu 行
///
/// 字段顺序：user nice system idle iowait irq softirq steal guest guest_nice，
/// idle + iowait 记为空闲，其余记为 busy。
fn parse_cpu_line(line: &str) -> Result<CpuTimes> {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => {}
        _ => return Err(Error::Sampler(format!("unexpected /proc/stat line: {}", line))),
    }

    let values: Vec<u64> = fields.filter_map(|field| field.parse().ok()).collect();
    if values.len() < 4 {
        return Err(Error::Sampler(format!("truncated /proc/stat line: {}", line)));
    }

    let total: u64 = values.iter().sum();
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        busy: total - idle,
        total,
    })
}

#[async_trait]
impl CpuSampler for ProcStatCpuSampler {
    async fn cpu_ratio(&self) -> Result<f64> {
        let curr = Self::read_cpu_times()?;
        let mut prev = self.prev.lock();

        let ratio = match *prev {
            Some(last) if curr.total > last.total => {
                let delta_total = (curr.total - last.total) as f64;
                let delta_busy = curr.busy.saturating_sub(last.busy) as f64;
                (delta_busy / delta_total).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };

        *prev = Some(curr);
        Ok(ratio)
    }
}

/// 固定值 CPU 采样器，测试与演示用
pub struct FixedCpuSampler {
    ratio_bits: AtomicU64,
}

impl FixedCpuSampler {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio_bits: AtomicU64::new(ratio.to_bits()),
        }
    }

    pub fn set_ratio(&self, ratio: f64) {
        self.ratio_bits.store(ratio.to_bits(), Ordering::Relaxed);
    }
}

#[async_trait]
impl CpuSampler for FixedCpuSampler {
    async fn cpu_ratio(&self) -> Result<f64> {
        Ok(f64::from_bits(self.ratio_bits.load(Ordering::Relaxed)))
    }
}
