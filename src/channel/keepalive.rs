// src/channel/keepalive.rs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks outbound/inbound activity timestamps for the keep-alive loop.
///
/// The tracker answers one question: has the channel been send-idle for a
/// full keep-alive interval? Application traffic counts as liveness, so a
/// busy channel emits no pings at all.
///
/// Timestamps are milliseconds since the tracker's construction, stored in
/// atomics so the send paths, the reader task, and the keep-alive ticker can
/// stamp without locking.
#[derive(Debug)]
pub struct KeepAliveTracker {
    interval: Duration,
    epoch: Instant,
    started: AtomicBool,
    last_sent_ms: AtomicU64,
    last_received_ms: AtomicU64,
}

impl KeepAliveTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            epoch: Instant::now(),
            started: AtomicBool::new(false),
            last_sent_ms: AtomicU64::new(0),
            last_received_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Arms the tracker at session activation. Stamps both directions so the
    /// first interval is measured from the handshake, not from construction.
    pub fn start(&self) {
        self.reset();
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    /// Re-stamps both directions to "now".
    pub fn reset(&self) {
        let now = self.now_ms();
        self.last_sent_ms.store(now, Ordering::SeqCst);
        self.last_received_ms.store(now, Ordering::SeqCst);
    }

    pub fn on_data_sent(&self) {
        self.last_sent_ms.store(self.now_ms(), Ordering::SeqCst);
    }

    pub fn on_data_received(&self) {
        self.last_received_ms.store(self.now_ms(), Ordering::SeqCst);
    }

    /// True when the tracker is started and nothing has been sent for at
    /// least one full interval.
    pub fn should_send_keepalive(&self) -> bool {
        if !self.is_started() {
            return false;
        }
        let idle = self.now_ms().saturating_sub(self.last_sent_ms.load(Ordering::SeqCst));
        idle >= self.interval.as_millis() as u64
    }

    /// Milliseconds since the last inbound data, for diagnostics.
    pub fn receive_idle_ms(&self) -> u64 {
        self.now_ms().saturating_sub(self.last_received_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_before_start_never_signals() {
        let tracker = KeepAliveTracker::new(Duration::ZERO);
        assert!(!tracker.should_send_keepalive());
    }

    #[test]
    fn signals_once_send_idle_for_an_interval() {
        let tracker = KeepAliveTracker::new(Duration::ZERO);
        tracker.start();
        // Zero interval: any elapsed time counts as idle.
        assert!(tracker.should_send_keepalive());
    }

    #[test]
    fn outbound_traffic_defers_the_ping() {
        let tracker = KeepAliveTracker::new(Duration::from_secs(3600));
        tracker.start();
        tracker.on_data_sent();
        assert!(!tracker.should_send_keepalive());
    }

    #[test]
    fn stop_disarms() {
        let tracker = KeepAliveTracker::new(Duration::ZERO);
        tracker.start();
        tracker.stop();
        assert!(!tracker.should_send_keepalive());
    }

    #[test]
    fn elapsed_idle_crosses_a_real_interval() {
        let tracker = KeepAliveTracker::new(Duration::from_millis(30));
        tracker.start();
        assert!(!tracker.should_send_keepalive());
        std::thread::sleep(Duration::from_millis(45));
        assert!(tracker.should_send_keepalive());
        tracker.reset();
        assert!(!tracker.should_send_keepalive());
    }
}
