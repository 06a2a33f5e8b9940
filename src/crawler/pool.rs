//! Binary min-max heap (min at level 0, max at level 1, alternating) plus a
//! bounded-admission priority worker pool built on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::{mpsc, Notify};

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Item<T> {
    priority: f64,
    value: T,
}

/// A priority double-ended heap: O(log n) access to both the current minimum
/// and maximum priority item.
pub struct MinMaxHeap<T> {
    data: Vec<Item<T>>,
}

impl<T> Default for MinMaxHeap<T> {
    fn default() -> Self {
        MinMaxHeap { data: Vec::new() }
    }
}

fn level(i: usize) -> u32 {
    ((i + 1) as f64).log2().floor() as u32
}

fn is_min_level(i: usize) -> bool {
    level(i) % 2 == 0
}

fn is_grandchild(i: usize, j: usize) -> bool {
    j >= 4 * i + 3
}

impl<T> MinMaxHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn min_priority(&self) -> Option<f64> {
        self.data.first().map(|i| i.priority)
    }

    pub fn insert(&mut self, priority: f64, value: T) {
        self.data.push(Item { priority, value });
        self.bubble_up(self.data.len() - 1);
    }

    pub fn delete_min(&mut self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let last = self.data.len() - 1;
        self.data.swap(0, last);
        let item = self.data.pop().unwrap();
        if !self.data.is_empty() {
            self.trickle_down(0);
        }
        Some(item.value)
    }

    pub fn delete_max(&mut self) -> Option<T> {
        let n = self.data.len();
        if n == 0 {
            return None;
        }
        let idx = self.max_index();
        let last = n - 1;
        self.data.swap(idx, last);
        let item = self.data.pop().unwrap();
        if idx < self.data.len() {
            self.trickle_down(idx);
        }
        Some(item.value)
    }

    fn max_index(&self) -> usize {
        let n = self.data.len();
        if n == 1 {
            0
        } else if n == 2 || self.data[1].priority > self.data[2].priority {
            1
        } else {
            2
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.data.swap(i, j);
    }

    fn bubble_up(&mut self, i: usize) {
        if i == 0 {
            return;
        }
        let p = (i - 1) / 2;
        if is_min_level(i) {
            if self.data[i].priority > self.data[p].priority {
                self.swap(i, p);
                self.bubble_up_max(p);
            } else {
                self.bubble_up_min(i);
            }
        } else if self.data[i].priority < self.data[p].priority {
            self.swap(i, p);
            self.bubble_up_min(p);
        } else {
            self.bubble_up_max(i);
        }
    }

    fn bubble_up_min(&mut self, mut i: usize) {
        while i >= 3 {
            let gp = (i - 3) / 4;
            if self.data[i].priority < self.data[gp].priority {
                self.swap(i, gp);
                i = gp;
            } else {
                break;
            }
        }
    }

    fn bubble_up_max(&mut self, mut i: usize) {
        while i >= 3 {
            let gp = (i - 3) / 4;
            if self.data[i].priority > self.data[gp].priority {
                self.swap(i, gp);
                i = gp;
            } else {
                break;
            }
        }
    }

    fn trickle_down(&mut self, i: usize) {
        if is_min_level(i) {
            self.trickle_down_min(i);
        } else {
            self.trickle_down_max(i);
        }
    }

    fn trickle_down_min(&mut self, mut i: usize) {
        loop {
            let m = match self.extreme_descendant(i, true) {
                Some(m) => m,
                None => return,
            };
            if is_grandchild(i, m) {
                if self.data[m].priority < self.data[i].priority {
                    self.swap(i, m);
                    let p = (m - 1) / 2;
                    if self.data[m].priority > self.data[p].priority {
                        self.swap(m, p);
                    }
                    i = m;
                } else {
                    return;
                }
            } else {
                if self.data[m].priority < self.data[i].priority {
                    self.swap(i, m);
                }
                return;
            }
        }
    }

    fn trickle_down_max(&mut self, mut i: usize) {
        loop {
            let m = match self.extreme_descendant(i, false) {
                Some(m) => m,
                None => return,
            };
            if is_grandchild(i, m) {
                if self.data[m].priority > self.data[i].priority {
                    self.swap(i, m);
                    let p = (m - 1) / 2;
                    if self.data[m].priority < self.data[p].priority {
                        self.swap(m, p);
                    }
                    i = m;
                } else {
                    return;
                }
            } else {
                if self.data[m].priority > self.data[i].priority {
                    self.swap(i, m);
                }
                return;
            }
        }
    }

    fn extreme_descendant(&self, i: usize, want_min: bool) -> Option<usize> {
        let n = self.data.len();
        let candidates = [2 * i + 1, 2 * i + 2, 4 * i + 3, 4 * i + 4, 4 * i + 5, 4 * i + 6];
        let mut best: Option<usize> = None;
        for &idx in &candidates {
            if idx >= n {
                continue;
            }
            best = match best {
                None => Some(idx),
                Some(b) => {
                    if (want_min && self.data[idx].priority < self.data[b].priority)
                        || (!want_min && self.data[idx].priority > self.data[b].priority)
                    {
                        Some(idx)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }
}

/// A bounded-admission priority worker pool: a fixed number of tokio tasks
/// consume futures from a shared min-max heap, gated by a bounded token
/// channel that implements the admission/eviction policy.
pub struct WorkerPool {
    heap: std::sync::Arc<Mutex<MinMaxHeap<BoxFuture>>>,
    buf_tx: mpsc::Sender<()>,
    in_flight: std::sync::Arc<AtomicUsize>,
    done_notify: std::sync::Arc<Notify>,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let heap = std::sync::Arc::new(Mutex::new(MinMaxHeap::new()));
        let (buf_tx, buf_rx) = mpsc::channel(queue_capacity.max(1));
        let in_flight = std::sync::Arc::new(AtomicUsize::new(0));
        let done_notify = std::sync::Arc::new(Notify::new());

        let buf_rx = std::sync::Arc::new(tokio::sync::Mutex::new(buf_rx));
        for _ in 0..workers.max(1) {
            let heap = heap.clone();
            let buf_rx = buf_rx.clone();
            let buf_tx = buf_tx.clone();
            let in_flight = in_flight.clone();
            let done_notify = done_notify.clone();
            tokio::spawn(async move {
                loop {
                    let got = {
                        let mut rx = buf_rx.lock().await;
                        rx.recv().await
                    };
                    if got.is_none() {
                        return;
                    }
                    let task = {
                        let mut guard = heap.lock().unwrap();
                        guard.delete_max()
                    };
                    match task {
                        Some(fut) => {
                            fut.await;
                            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                                done_notify.notify_waiters();
                            }
                        }
                        None => {
                            let _ = buf_tx.try_send(());
                        }
                    }
                }
            });
        }

        WorkerPool {
            heap,
            buf_tx,
            in_flight,
            done_notify,
        }
    }

    /// Admission: reserve a slot if the queue has room; otherwise evict the
    /// current minimum-priority task if the new one beats it, else drop it.
    pub fn submit(&self, priority: f64, fut: BoxFuture) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        match self.buf_tx.try_send(()) {
            Ok(()) => {
                self.heap.lock().unwrap().insert(priority, fut);
            }
            Err(_) => {
                let mut heap = self.heap.lock().unwrap();
                let evict = heap.min_priority().map(|min| priority > min).unwrap_or(false);
                if evict {
                    heap.delete_min();
                    heap.insert(priority, fut);
                } else {
                    drop(heap);
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }

    pub async fn wait(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            self.done_notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_heap_tracks_extremes() {
        let mut h: MinMaxHeap<i32> = MinMaxHeap::new();
        for (p, v) in [(5.0, 5), (1.0, 1), (9.0, 9), (3.0, 3), (7.0, 7)] {
            h.insert(p, v);
        }
        assert_eq!(h.delete_max(), Some(9));
        assert_eq!(h.delete_min(), Some(1));
        assert_eq!(h.delete_max(), Some(7));
        assert_eq!(h.delete_min(), Some(3));
        assert_eq!(h.delete_max(), Some(5));
        assert!(h.is_empty());
    }

    #[tokio::test]
    async fn pool_runs_submitted_tasks_and_wait_completes() {
        let pool = WorkerPool::new(4, 16);
        let counter = std::sync::Arc::new(AtomicUsize::new(0));
        for i in 0..20 {
            let counter = counter.clone();
            pool.submit(i as f64, Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }
}
