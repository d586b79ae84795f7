//! Session state machine for one device-to-broker connection.
//!
//! Pure bookkeeping: no I/O, no stored clock. Methods that need time take a
//! `now: Instant` parameter, and the client executes whatever the answer
//! calls for (send a ping, drop the socket).
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ socket  ┌────────────┐ login ack ┌────────────────┐ heartbeat ack ┌───────────────┐
//! │ Disconnected │────────>│ Connecting │──────────>│ Authenticating │──────────────>│ Authenticated │
//! └──────────────┘         └────────────┘           └────────────────┘               └───────────────┘
//!        ^                       │                          │                               │
//!        └───────────────────────┴──────── reset ───────────┴───────────────────────────────┘
//! ```
//!
//! # Liveness
//!
//! With `hb` the heartbeat interval:
//! - **Dead**: nothing received for more than `1.5 * hb`
//! - **PingDue**: last ping older than `hb / 10`, and either nothing sent or
//!   nothing received for more than `hb`
//! - **Alive**: otherwise

use std::time::{Duration, Instant};

use crate::error::{PinwireError, Result};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket.
    Disconnected,
    /// Socket open, login not yet acknowledged.
    Connecting,
    /// Login acknowledged, heartbeat not yet acknowledged.
    Authenticating,
    /// Ready for traffic.
    Authenticated,
}

/// Result of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Nothing to do.
    Alive,
    /// Send a ping and record it.
    PingDue,
    /// Peer considered gone; disconnect.
    Dead,
}

/// Session bookkeeping: state plus activity timestamps.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    heartbeat: Duration,
    max_body: usize,
    last_send: Instant,
    last_receive: Instant,
    last_ping: Instant,
}

impl Session {
    /// Create a disconnected session with all timestamps at `now`.
    pub fn new(now: Instant, heartbeat: Duration, max_body: usize) -> Self {
        Self {
            state: SessionState::Disconnected,
            heartbeat,
            max_body,
            last_send: now,
            last_receive: now,
            last_ping: now,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated heartbeat interval.
    #[must_use]
    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Inbound body limit.
    #[must_use]
    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Start of the most recent send attempt.
    #[must_use]
    pub fn last_send(&self) -> Instant {
        self.last_send
    }

    /// When bytes last arrived.
    #[must_use]
    pub fn last_receive(&self) -> Instant {
        self.last_receive
    }

    /// When the last ping went out.
    #[must_use]
    pub fn last_ping(&self) -> Instant {
        self.last_ping
    }

    /// True once both handshake stages are acknowledged.
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Socket opened: Disconnected → Connecting.
    ///
    /// All timestamps restart at `now` so a new connection is not judged by
    /// the previous one's activity.
    ///
    /// # Errors
    /// Returns `InvalidState` if not Disconnected.
    pub fn start_connecting(&mut self, now: Instant) -> Result<()> {
        self.expect(SessionState::Disconnected, "start_connecting")?;
        self.state = SessionState::Connecting;
        self.last_send = now;
        self.last_receive = now;
        self.last_ping = now;
        Ok(())
    }

    /// Login acknowledged: Connecting → Authenticating.
    ///
    /// # Errors
    /// Returns `InvalidState` if not Connecting.
    pub fn login_accepted(&mut self) -> Result<()> {
        self.expect(SessionState::Connecting, "login_accepted")?;
        self.state = SessionState::Authenticating;
        Ok(())
    }

    /// Heartbeat acknowledged: Authenticating → Authenticated.
    ///
    /// # Errors
    /// Returns `InvalidState` if not Authenticating.
    pub fn heartbeat_accepted(&mut self) -> Result<()> {
        self.expect(SessionState::Authenticating, "heartbeat_accepted")?;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Any state → Disconnected.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// Record the start of the last send attempt.
    pub fn record_send(&mut self, at: Instant) {
        self.last_send = at;
    }

    /// Record that bytes arrived. Empty reads must not be recorded.
    pub fn record_receive(&mut self, at: Instant) {
        self.last_receive = at;
    }

    /// Record that a ping went out.
    pub fn record_ping(&mut self, at: Instant) {
        self.last_ping = at;
    }

    /// Classify the connection at `now`.
    pub fn check_liveness(&self, now: Instant) -> Liveness {
        let hb = self.heartbeat;
        let since_rx = now.saturating_duration_since(self.last_receive);
        let since_tx = now.saturating_duration_since(self.last_send);
        let since_ping = now.saturating_duration_since(self.last_ping);

        if since_rx > hb + hb / 2 {
            return Liveness::Dead;
        }

        if since_ping > hb / 10 && (since_tx > hb || since_rx > hb) {
            return Liveness::PingDue;
        }

        Liveness::Alive
    }

    fn expect(&self, state: SessionState, operation: &'static str) -> Result<()> {
        if self.state != state {
            return Err(PinwireError::InvalidState {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HB: Duration = Duration::from_secs(10);

    fn authenticated(now: Instant) -> Session {
        let mut session = Session::new(now, HB, 1024);
        session.start_connecting(now).unwrap();
        session.login_accepted().unwrap();
        session.heartbeat_accepted().unwrap();
        session
    }

    #[test]
    fn test_happy_path_transitions() {
        let now = Instant::now();
        let mut session = Session::new(now, HB, 1024);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.start_connecting(now).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        session.login_accepted().unwrap();
        assert_eq!(session.state(), SessionState::Authenticating);

        session.heartbeat_accepted().unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_heartbeat_before_login_rejected() {
        let now = Instant::now();
        let mut session = Session::new(now, HB, 1024);
        session.start_connecting(now).unwrap();

        let err = session.heartbeat_accepted().unwrap_err();
        assert!(matches!(
            err,
            PinwireError::InvalidState {
                state: SessionState::Connecting,
                operation: "heartbeat_accepted"
            }
        ));
    }

    #[test]
    fn test_connect_twice_rejected() {
        let now = Instant::now();
        let mut session = authenticated(now);
        assert!(session.start_connecting(now).is_err());

        session.reset();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.start_connecting(now).is_ok());
    }

    #[test]
    fn test_fresh_session_is_alive() {
        let now = Instant::now();
        let session = authenticated(now);
        assert_eq!(session.check_liveness(now), Liveness::Alive);
    }

    #[test]
    fn test_exactly_one_and_a_half_heartbeats_is_alive() {
        let start = Instant::now();
        let mut session = authenticated(start);
        let now = start + HB + HB / 2;
        // keep the ping condition quiet so only the dead check matters
        session.record_ping(now);
        session.record_send(now);

        assert_ne!(session.check_liveness(now), Liveness::Dead);
        assert_eq!(
            session.check_liveness(now + Duration::from_millis(1)),
            Liveness::Dead
        );
    }

    #[test]
    fn test_ping_due_after_idle_send() {
        let start = Instant::now();
        let mut session = authenticated(start);
        session.record_receive(start + HB);

        let now = start + HB + Duration::from_millis(1);
        assert_eq!(session.check_liveness(now), Liveness::PingDue);

        session.record_ping(now);
        assert_eq!(session.check_liveness(now), Liveness::Alive);

        // ping throttle is hb / 10
        let later = now + HB / 10 + Duration::from_millis(1);
        assert_eq!(session.check_liveness(later), Liveness::PingDue);
    }

    #[test]
    fn test_ping_due_after_idle_receive() {
        let start = Instant::now();
        let mut session = authenticated(start);
        let now = start + HB + Duration::from_secs(1);
        session.record_send(now);

        assert_eq!(session.check_liveness(now), Liveness::PingDue);
    }

    #[test]
    fn test_recent_traffic_needs_no_ping() {
        let start = Instant::now();
        let mut session = authenticated(start);
        let now = start + HB * 5;
        session.record_send(now - Duration::from_secs(1));
        session.record_receive(now - Duration::from_secs(1));

        assert_eq!(session.check_liveness(now), Liveness::Alive);
    }

    #[test]
    fn test_start_connecting_restarts_timestamps() {
        let start = Instant::now();
        let mut session = Session::new(start, HB, 1024);
        let later = start + HB * 3;

        session.start_connecting(later).unwrap();

        assert_eq!(session.last_receive(), later);
        assert_eq!(session.check_liveness(later), Liveness::Alive);
    }
}
