use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{SessionError, SessionState};
use crate::pool::{Platform, ReservedIdentity};

/// One test session's slot for a reserved user.
///
/// Holds at most one identity. Separate sessions share nothing, so parallel
/// test runners each keep their own.
#[derive(Debug)]
pub struct UserSession {
    pub(super) id: Uuid,
    pub(super) state: SessionState,
    pub(super) identity: Option<ReservedIdentity>,
    pub(super) reserved_at: Option<DateTime<Utc>>,
    pub(super) attempts: u32,
    pub(super) history: Vec<SessionState>,
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UserSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            identity: None,
            reserved_at: None,
            attempts: 0,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The identity this session currently holds, if any.
    pub fn current(&self) -> Option<&ReservedIdentity> {
        self.identity.as_ref()
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    /// Attempts made by the most recent reservation.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// States left behind, oldest first.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// The held identity; only valid right after a `Reserved` transition.
    pub(crate) fn held(&self) -> Result<&ReservedIdentity, SessionError> {
        self.identity
            .as_ref()
            .ok_or(SessionError::InvalidTransition {
                from: self.state,
                event: "reserved",
            })
    }
}

/// Structured audit record produced when a lease is released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub session_id: Uuid,
    pub email: String,
    pub platform: Platform,
    pub attempts: u32,
    pub reserved_at: DateTime<Utc>,
    pub released_at: DateTime<Utc>,
    pub held_ms: i64,
    /// Whether the pool confirmed the release. `false` means the lease is left
    /// for the pool's own expiry to reclaim.
    pub release_acknowledged: bool,
}

impl LeaseRecord {
    /// Build a record for the identity the session holds, if any.
    pub fn from_session(session: &UserSession, release_acknowledged: bool) -> Option<Self> {
        let identity = session.identity.as_ref()?;
        let reserved_at = session.reserved_at?;
        let now = Utc::now();

        Some(Self {
            session_id: session.id,
            email: identity.email.clone(),
            platform: identity.platform,
            attempts: session.attempts,
            reserved_at,
            released_at: now,
            held_ms: (now - reserved_at).num_milliseconds(),
            release_acknowledged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionEvent, SessionMachine};

    fn held_session() -> UserSession {
        let identity: ReservedIdentity = serde_json::from_value(serde_json::json!({
            "email": "lease@b.com",
            "type": "youtube"
        }))
        .unwrap();
        let mut session = UserSession::new();
        SessionMachine::next(&mut session, SessionEvent::ReserveStarted).unwrap();
        session.record_attempt();
        session.record_attempt();
        SessionMachine::next(&mut session, SessionEvent::Reserved(identity)).unwrap();
        session
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = UserSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.current().is_none());
        assert_eq!(session.attempts(), 0);
        assert!(session.history().is_empty());
    }

    #[test]
    fn sessions_have_distinct_ids() {
        assert_ne!(UserSession::new().id(), UserSession::new().id());
    }

    #[test]
    fn lease_record_from_held_session() {
        let session = held_session();
        let record = LeaseRecord::from_session(&session, true).unwrap();

        assert_eq!(record.session_id, session.id());
        assert_eq!(record.email, "lease@b.com");
        assert_eq!(record.platform, Platform::Youtube);
        assert_eq!(record.attempts, 2);
        assert!(record.release_acknowledged);
        assert!(record.held_ms >= 0);
        assert!(record.released_at >= record.reserved_at);
    }

    #[test]
    fn lease_record_needs_an_identity() {
        assert!(LeaseRecord::from_session(&UserSession::new(), true).is_none());
    }

    #[test]
    fn held_fails_without_identity() {
        let session = UserSession::new();
        assert!(session.held().is_err());
        assert_eq!(held_session().held().unwrap().email, "lease@b.com");
    }
}
