use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::user_session::UserSession;
use crate::pool::ReservedIdentity;

/// The four states of a user session.
///
/// Each reservation flows through: IDLE → RESERVING → HELD → RELEASING → IDLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Reserving,
    Held,
    Releasing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "IDLE"),
            SessionState::Reserving => write!(f, "RESERVING"),
            SessionState::Held => write!(f, "HELD"),
            SessionState::Releasing => write!(f, "RELEASING"),
        }
    }
}

/// Inputs that move a session between states.
#[derive(Debug)]
pub enum SessionEvent {
    ReserveStarted,
    Reserved(ReservedIdentity),
    ReserveFailed,
    ReleaseStarted,
    Released,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ReserveStarted => "reserve_started",
            SessionEvent::Reserved(_) => "reserved",
            SessionEvent::ReserveFailed => "reserve_failed",
            SessionEvent::ReleaseStarted => "release_started",
            SessionEvent::Released => "released",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("user {email} is already reserved by this session, release it first")]
    AlreadyHeld { email: String },

    #[error("invalid session transition: {event} while {from}")]
    InvalidTransition {
        from: SessionState,
        event: &'static str,
    },
}

/// Drives a [`UserSession`] through its lifecycle.
pub struct SessionMachine;

impl SessionMachine {
    /// Apply `event` to the session and return the new state.
    ///
    /// - `ReserveStarted` is accepted from `Idle`, and from `Reserving` when a
    ///   previous reservation was abandoned mid-flight. From `Held` or
    ///   `Releasing` it fails with `AlreadyHeld`.
    /// - `ReleaseStarted` is accepted from `Held`, and from `Releasing` when a
    ///   previous release was dropped before the pool answered.
    /// - `Reserved` stores the identity; `Released` drops it.
    /// - Any other combination is an `InvalidTransition` and leaves the
    ///   session untouched.
    pub fn next(session: &mut UserSession, event: SessionEvent) -> Result<SessionState, SessionError> {
        let from = session.state;
        let to = match (from, event) {
            (SessionState::Idle | SessionState::Reserving, SessionEvent::ReserveStarted) => {
                session.attempts = 0;
                SessionState::Reserving
            }
            (SessionState::Held | SessionState::Releasing, SessionEvent::ReserveStarted) => {
                let email = session
                    .identity
                    .as_ref()
                    .map(|identity| identity.email.clone())
                    .unwrap_or_default();
                return Err(SessionError::AlreadyHeld { email });
            }
            (SessionState::Reserving, SessionEvent::Reserved(identity)) => {
                session.identity = Some(identity);
                session.reserved_at = Some(Utc::now());
                SessionState::Held
            }
            (SessionState::Reserving, SessionEvent::ReserveFailed) => SessionState::Idle,
            (SessionState::Held | SessionState::Releasing, SessionEvent::ReleaseStarted) => {
                SessionState::Releasing
            }
            (SessionState::Releasing, SessionEvent::Released) => {
                session.identity = None;
                session.reserved_at = None;
                SessionState::Idle
            }
            (from, event) => {
                return Err(SessionError::InvalidTransition {
                    from,
                    event: event.name(),
                });
            }
        };

        session.history.push(from);
        session.state = to;
        Ok(to)
    }
}
