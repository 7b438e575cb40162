//! 有界工作池
//!
//! 独立的多线程 tokio 运行时负责派发；每个工作体先获取 Semaphore 许可再进入 spawn_blocking，
//! 超出容量的提交排队等待许可，而不是被拒绝。工作体 panic 由 JoinError 捕获并回传。

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;

use crate::core::error::{CoreError, Result};

pub struct WorkerPool {
    runtime: Option<Runtime>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(capacity)
            .thread_name("pathwise-worker")
            .enable_all()
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build worker pool: {}", e)))?;

        Ok(Self {
            runtime: Some(runtime),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 正在执行的工作体数量
    pub fn busy(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// 提交阻塞工作体；完成（或 panic）后在工作池上调用 then
    pub fn execute<W, T, C>(&self, work: W, then: C)
    where
        W: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(std::result::Result<T, String>) + Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            then(Err("worker pool is shut down".to_string()));
            return;
        };
        let permits = Arc::clone(&self.permits);

        runtime.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    then(Err("worker pool is shut down".to_string()));
                    return;
                }
            };

            let outcome = tokio::task::spawn_blocking(work).await.map_err(|e| {
                if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "worker task cancelled".to_string()
                }
            });
            then(outcome);
        });
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.permits.close();
        // 可能在工作池自身的线程上被释放，不能阻塞等待
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_execute_reports_result() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.execute(|| 21 * 2, move |out| tx.send(out).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(42));
    }

    #[test]
    fn test_panic_is_captured() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.execute(
            || -> u32 { panic!("parse exploded") },
            move |out| tx.send(out).unwrap(),
        );
        let out = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(out, Err("parse exploded".to_string()));
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(3).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..12 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            pool.execute(
                move || {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    current.fetch_sub(1, Ordering::SeqCst);
                },
                move |_| tx.send(()).unwrap(),
            );
        }

        for _ in 0..12 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
