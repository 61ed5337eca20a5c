use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

/// 请求延迟采样窗口
///
/// 固定容量环形缓冲，覆盖最旧样本。写入方是任意并发的请求路径，
/// 读取方是调速循环：先整窗拷贝再排序，绝不在共享存储上原地排序。
pub struct LatencyWindow {
    slots: Box<[AtomicI64]>,
    cursor: AtomicUsize,
    /// 累计写入次数，用于判断窗口是否已写满一轮
    total: AtomicU64,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "latency window capacity must be positive");
        let slots = (0..capacity).map(|_| AtomicI64::new(0)).collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            total: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 记录一次请求延迟（微秒）。游标推进是原子的，写入永不越界。
    pub fn record(&self, latency_micros: i64) {
        let pos = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.slots[pos].store(latency_micros, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// 窗口是否已经写满一轮（样本数不足时百分位/均值无意义）
    pub fn is_warm(&self) -> bool {
        self.total.load(Ordering::Relaxed) >= self.slots.len() as u64
    }

    /// 拷贝当前窗口并排序；未写满一轮时返回 `None`
    pub fn sorted_snapshot(&self) -> Option<Vec<i64>> {
        if !self.is_warm() {
            return None;
        }
        let mut snapshot: Vec<i64> = self
            .slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect();
        snapshot.sort_unstable();
        Some(snapshot)
    }

    /// 拷贝当前窗口的均值（微秒）；未写满一轮时返回 `None`
    pub fn mean(&self) -> Option<i64> {
        if !self.is_warm() {
            return None;
        }
        let sum: i64 = self
            .slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .sum();
        Some(sum / self.slots.len() as i64)
    }
}

/// tp99 在排序后窗口中的下标
pub fn tp99_index(capacity: usize) -> usize {
    ((capacity as f64 * 0.99) as usize).min(capacity - 1)
}

/// 高负载 QPS 采样窗口
///
/// 只在 CPU 处于目标区间附近时写入，用窗口最大值估计机器的可持续
/// 峰值吞吐。单写单读（仅调速循环访问），不需要原子。
#[derive(Debug)]
pub struct HighLoadQpsWindow {
    slots: Vec<i64>,
    position: usize,
    /// 自上次清空以来的写入次数
    fresh: usize,
}

impl HighLoadQpsWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "high load qps window capacity must be positive");
        Self {
            slots: vec![0; capacity],
            position: 0,
            fresh: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 在环形游标处写入一个高负载 QPS 样本
    pub fn record(&mut self, qps: i64) {
        self.position %= self.slots.len();
        self.slots[self.position] = qps;
        self.position += 1;
        self.fresh += 1;
    }

    /// 自上次清空后是否已积满一轮新鲜样本
    pub fn is_warm(&self) -> bool {
        self.fresh >= self.slots.len()
    }

    /// 窗口最大值。只有 `is_warm` 后才有意义。
    pub fn max(&self) -> i64 {
        self.slots.iter().copied().max().unwrap_or(0)
    }

    /// 清空：重置游标与新鲜计数。旧槽位在重新积满前不会被读取。
    pub fn clear(&mut self) {
        self.position = 0;
        self.fresh = 0;
    }
}
