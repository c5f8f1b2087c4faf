//! Shared run state handed to every thread and task at spawn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    running: AtomicBool,
    voice_active: AtomicBool,
    stopped: Notify,
}

/// Cheap-to-clone handle on the assistant's lifecycle.
///
/// `running` drives the supervisor, the dispatcher and the listeners;
/// clearing it is the only way to stop them. `voice_active` is the logical
/// state reported by the `start` command and does not pause the listener
/// thread.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the assistant as running, with or without a voice source.
    pub fn start(&self, voice: bool) {
        self.inner.voice_active.store(voice, Ordering::SeqCst);
        self.inner.running.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_voice_active(&self) -> bool {
        self.inner.voice_active.load(Ordering::SeqCst)
    }

    /// Turn the voice state on; returns `false` if it already was.
    pub fn activate_voice(&self) -> bool {
        !self.inner.voice_active.swap(true, Ordering::SeqCst)
    }

    /// Stop everything. Idempotent.
    pub fn stop(&self) {
        self.inner.voice_active.store(false, Ordering::SeqCst);
        if self.inner.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("lifecycle stopped");
        }
        self.inner.stopped.notify_waiters();
    }

    /// Resolves once `stop` has been called (immediately if it already was).
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.stopped.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn start_and_stop_flip_both_flags() {
        let lc = Lifecycle::new();
        assert!(!lc.is_running());

        lc.start(true);
        assert!(lc.is_running());
        assert!(lc.is_voice_active());
        assert!(!lc.activate_voice());

        lc.stop();
        assert!(!lc.is_running());
        assert!(!lc.is_voice_active());
    }

    #[test]
    fn activate_voice_reports_transition() {
        let lc = Lifecycle::new();
        lc.start(false);
        assert!(lc.activate_voice());
        assert!(!lc.activate_voice());
    }

    #[tokio::test]
    async fn stopped_wakes_waiters() {
        let lc = Lifecycle::new();
        lc.start(false);

        let waiter = {
            let lc = lc.clone();
            tokio::spawn(async move { lc.stopped().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        lc.stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn stopped_returns_immediately_when_never_started() {
        let lc = Lifecycle::new();
        tokio::time::timeout(Duration::from_millis(100), lc.stopped())
            .await
            .expect("no wait");
    }
}
