//! Periodic background autosave

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::StorageError;

/// Something that can capture and persist itself
#[async_trait]
pub trait AutosaveTarget: Send + Sync + 'static {
    async fn autosave(&self) -> Result<(), StorageError>;
}

/// Counters for observing the autosave loop
#[derive(Debug, Default)]
pub struct AutosaveStats {
    saves: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
}

impl AutosaveStats {
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a save was still running
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

enum AutosaveCommand {
    SaveNow,
    Shutdown,
}

/// Re-armable autosave timer.
///
/// Each tick asks the target to save. A tick that fires while the previous
/// save is still running is skipped, not queued.
pub struct AutoSave {
    interval: Duration,
    target: Option<Arc<dyn AutosaveTarget>>,
    cmd_tx: Option<mpsc::UnboundedSender<AutosaveCommand>>,
    stats: Arc<AutosaveStats>,
}

impl AutoSave {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            target: None,
            cmd_tx: None,
            stats: Arc::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> Arc<AutosaveStats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.cmd_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Start ticking for `target`. A running timer is stopped first.
    pub fn start(&mut self, target: Arc<dyn AutosaveTarget>) {
        self.stop();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = AutosaveTask {
            interval: self.interval,
            target: target.clone(),
            cmd_rx,
            in_flight: Arc::new(AtomicBool::new(false)),
            stats: self.stats.clone(),
        };
        tokio::spawn(task.run());
        self.target = Some(target);
        self.cmd_tx = Some(cmd_tx);
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Autosave started");
    }

    /// Change the interval, re-arming the timer if it is running
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        if self.is_running() {
            if let Some(target) = self.target.clone() {
                self.start(target);
            }
        }
    }

    /// Request an immediate save (subject to the in-flight rule)
    pub fn save_now(&self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(AutosaveCommand::SaveNow);
        }
    }

    /// Stop the timer. Calling it when not running is a no-op. A save that
    /// is already running is allowed to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(AutosaveCommand::Shutdown);
            tracing::debug!("Autosave stopped");
        }
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AutosaveTask {
    interval: Duration,
    target: Arc<dyn AutosaveTarget>,
    cmd_rx: mpsc::UnboundedReceiver<AutosaveCommand>,
    in_flight: Arc<AtomicBool>,
    stats: Arc<AutosaveStats>,
}

/// Clears the in-flight flag on every exit path
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AutosaveTask {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(AutosaveCommand::SaveNow) => self.fire(),
                    Some(AutosaveCommand::Shutdown) | None => break,
                },
                _ = ticker.tick() => self.fire(),
            }
        }
    }

    fn fire(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Autosave skipped: previous save still running");
            return;
        }
        let guard = InFlightGuard(self.in_flight.clone());
        let target = self.target.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match target.autosave().await {
                Ok(()) => {
                    stats.saves.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Autosave failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl AutosaveTarget for Counting {
        async fn autosave(&self) -> Result<(), StorageError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(StorageError::QuotaExceeded { needed: 2, quota: 1 })
            } else {
                Ok(())
            }
        }
    }

    fn target(delay_ms: u64, fail: bool) -> Arc<dyn AutosaveTarget> {
        Arc::new(Counting {
            delay: Duration::from_millis(delay_ms),
            fail,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_save() {
        let mut autosave = AutoSave::new(Duration::from_secs(1));
        autosave.start(target(0, false));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let stats = autosave.stats();
        assert!((2..=3).contains(&stats.saves()), "saves = {}", stats.saves());
        assert_eq!(stats.skipped(), 0);
        autosave.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_during_save_is_skipped() {
        let mut autosave = AutoSave::new(Duration::from_secs(1));
        autosave.start(target(2500, false));
        tokio::time::sleep(Duration::from_millis(4200)).await;

        let stats = autosave.stats();
        assert!(stats.skipped() >= 1);
        assert!(stats.saves() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let mut autosave = AutoSave::new(Duration::from_secs(1));
        autosave.stop();
        autosave.start(target(0, false));
        autosave.stop();
        autosave.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(!autosave.is_running());
        assert_eq!(autosave.stats().saves(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_and_failures_counted() {
        let mut autosave = AutoSave::new(Duration::from_secs(60));
        autosave.start(target(0, true));
        autosave.save_now();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(autosave.stats().failures(), 1);
        assert!(autosave.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_rearms() {
        let mut autosave = AutoSave::new(Duration::from_secs(60));
        autosave.start(target(0, false));
        autosave.set_interval(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(autosave.is_running());
        assert_eq!(autosave.stats().saves(), 1);
    }
}
