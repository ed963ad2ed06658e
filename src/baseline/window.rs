//! 固定容量リングバッファ

use serde::{Deserialize, Serialize};

/// 固定容量のスライディングウィンドウ
///
/// 容量に達した後の挿入は最も古い値を上書きする（FIFO）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingWindow {
    buf: Vec<f64>,
    /// 最も古い要素の位置
    head: usize,
    len: usize,
}

impl RingWindow {
    /// 新しいウィンドウを作成（capacity は 1 以上）
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    /// 値を追加し、追い出された値を返す
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let capacity = self.buf.len();
        if self.len < capacity {
            let idx = (self.head + self.len) % capacity;
            self.buf[idx] = value;
            self.len += 1;
            None
        } else {
            let evicted = self.buf[self.head];
            self.buf[self.head] = value;
            self.head = (self.head + 1) % capacity;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// 充填率（0.0-1.0）
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / self.buf.len() as f64
    }

    /// 古い順に走査
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let capacity = self.buf.len();
        (0..self.len).map(move |i| self.buf[(self.head + i) % capacity])
    }

    /// 最新の値
    pub fn last(&self) -> Option<f64> {
        if self.len == 0 {
            None
        } else {
            Some(self.buf[(self.head + self.len - 1) % self.buf.len()])
        }
    }

    /// 平均値（空なら None）
    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len as f64)
    }

    /// 不偏標準偏差（2件未満なら None）
    pub fn std_dev(&self) -> Option<f64> {
        if self.len < 2 {
            return None;
        }
        let mean = self.mean()?;
        let sum_sq = self.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        Some((sum_sq / (self.len - 1) as f64).sqrt())
    }

    /// 古い順の値をベクタに複製
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}
