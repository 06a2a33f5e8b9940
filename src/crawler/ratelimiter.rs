//! Per-host token-bucket rate limiter: a background ticker releases one
//! non-accumulating token every `delay` seconds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

pub const DEFAULT_DELAY_SECS: u64 = 3;

pub struct RateLimiter {
    token_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
    quit: Arc<AtomicBool>,
    pub delay_secs: u64,
}

impl RateLimiter {
    pub fn new(delay_secs: u64) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(1);
        let quit = Arc::new(AtomicBool::new(false));
        let limiter = Arc::new(RateLimiter {
            token_rx: tokio::sync::Mutex::new(rx),
            quit: quit.clone(),
            delay_secs,
        });

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(delay_secs.max(1)));
            loop {
                interval.tick().await;
                if quit.load(Ordering::SeqCst) {
                    return;
                }
                let _ = tx.try_send(());
            }
        });

        limiter
    }

    /// Blocks until a token is available, cancellation is requested, or the
    /// limiter is shut down.
    pub async fn get_token(&self, cancelled: &Arc<AtomicBool>) {
        loop {
            if cancelled.load(Ordering::SeqCst) || self.quit.load(Ordering::SeqCst) {
                return;
            }
            let mut rx = self.token_rx.lock().await;
            tokio::select! {
                _ = rx.recv() => return,
                _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
            }
        }
    }

    pub fn shutdown(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_unblocks_waiters() {
        let rl = RateLimiter::new(60);
        rl.shutdown();
        let cancelled = Arc::new(AtomicBool::new(false));
        tokio::time::timeout(Duration::from_secs(1), rl.get_token(&cancelled))
            .await
            .expect("shutdown should unblock get_token promptly");
    }
}
