//! Heartbeat bookkeeping and time sources.

use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;

/// Millisecond time source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        crate::session::now_ms()
    }
}

/// Clock moved by hand, for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What the client must do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Idle,
    /// The outstanding ping went unanswered; tear the connection down.
    Fail,
    SendPing,
}

#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval_ms: Option<u64>,
    last_message_at: u64,
    /// 0 when no ping is outstanding.
    last_heartbeat_at: u64,
    failure_reported: bool,
}

impl Heartbeat {
    pub fn new(interval_ms: Option<u64>) -> Self {
        Self {
            interval_ms,
            last_message_at: 0,
            last_heartbeat_at: 0,
            failure_reported: false,
        }
    }

    pub fn interval_ms(&self) -> Option<u64> {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: Option<u64>) {
        self.interval_ms = interval_ms;
    }

    /// Decide this tick's action. `has_pending` is whether any request awaits a reply.
    pub fn check(
        &mut self,
        now: u64,
        connected: bool,
        want_disconnect: bool,
        has_pending: bool,
    ) -> HeartbeatAction {
        let interval = match self.interval_ms {
            Some(interval) => interval,
            None => return HeartbeatAction::Idle,
        };

        if self.last_heartbeat_at != 0 && self.last_heartbeat_at.saturating_add(interval) < now {
            if self.failure_reported {
                return HeartbeatAction::Idle;
            }
            self.last_heartbeat_at = 0;
            self.failure_reported = true;
            return HeartbeatAction::Fail;
        }

        if want_disconnect || !connected {
            return HeartbeatAction::Idle;
        }

        if has_pending {
            return HeartbeatAction::Idle;
        }

        if self.last_message_at.saturating_add(interval) > now {
            return HeartbeatAction::Idle;
        }

        HeartbeatAction::SendPing
    }

    /// A frame went out or came in.
    pub fn record_activity(&mut self, now: u64) {
        self.last_message_at = now;
    }

    /// A ping went out.
    pub fn record_ping(&mut self, now: u64) {
        self.last_heartbeat_at = now;
    }

    /// The ping was answered.
    pub fn record_pong(&mut self) {
        self.last_heartbeat_at = 0;
    }

    pub fn ping_outstanding(&self) -> bool {
        self.last_heartbeat_at != 0
    }

    /// Start of a new connection attempt.
    pub fn reset(&mut self) {
        self.last_message_at = 0;
        self.last_heartbeat_at = 0;
        self.failure_reported = false;
    }

    /// The connection came up at `now`.
    pub fn on_connected(&mut self, now: u64) {
        self.last_message_at = now;
        self.failure_reported = false;
    }
}
