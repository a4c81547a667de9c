use std::time::Duration;

use tracing::{debug, info, warn};

use crate::pool::{FeatureFilter, Platform, PoolApi, PoolError, ReserveQuery, ReservedIdentity};
use crate::session::{LeaseRecord, SessionEvent, SessionMachine, UserSession};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(20);

/// Attempt bound and fixed inter-attempt delay for reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Suspends the reserving task between attempts.
///
/// Implementations are awaited on the caller's task; no `Send` bound is
/// promised on the returned future.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What kind of user to ask the pool for.
#[derive(Debug, Clone, Default)]
pub struct ReserveRequest {
    pub platform: Option<Platform>,
    pub features: Option<FeatureFilter>,
    /// Overrides [`RetryPolicy::max_attempts`] for this reservation.
    pub max_attempts: Option<u32>,
}

impl ReserveRequest {
    /// Any user of any platform.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    pub fn with_features(mut self, features: FeatureFilter) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Reserves and releases pool users on behalf of a [`UserSession`].
pub struct UserPool<A, S = TokioSleeper> {
    api: A,
    sleeper: S,
    policy: RetryPolicy,
}

impl<A: PoolApi> UserPool<A, TokioSleeper> {
    pub fn new(api: A, policy: RetryPolicy) -> Self {
        Self::with_sleeper(api, TokioSleeper, policy)
    }
}

impl<A: PoolApi, S: Sleeper> UserPool<A, S> {
    pub fn with_sleeper(api: A, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            api,
            sleeper,
            policy,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Reserve a user into `session`, retrying transient failures.
    ///
    /// Attempts run one after another, `policy.delay` apart. Only the final
    /// attempt carries the last-call marker. Fails immediately, without any
    /// request, if the session already holds a user.
    pub async fn reserve<'s>(
        &self,
        session: &'s mut UserSession,
        request: &ReserveRequest,
    ) -> Result<&'s ReservedIdentity, PoolError> {
        SessionMachine::next(session, SessionEvent::ReserveStarted)?;

        let max_attempts = request
            .max_attempts
            .unwrap_or(self.policy.max_attempts)
            .max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            session.record_attempt();
            let query = ReserveQuery {
                platform: request.platform,
                filter: request.features.clone(),
                is_last_call: attempt == max_attempts,
            };
            debug!(session = %session.id(), attempt, max_attempts, "reserving user");

            match self.attempt(&query).await {
                Ok(identity) => {
                    info!(
                        session = %session.id(),
                        attempt,
                        email = %identity.email,
                        platform = %identity.platform,
                        "user reserved"
                    );
                    SessionMachine::next(session, SessionEvent::Reserved(identity))?;
                    return session.held().map_err(PoolError::from);
                }
                Err(err) if !err.is_retryable() => {
                    SessionMachine::next(session, SessionEvent::ReserveFailed)?;
                    return Err(err);
                }
                Err(err) => {
                    warn!(session = %session.id(), attempt, max_attempts, error = %err, "user reservation failed");
                    if attempt < max_attempts {
                        info!(
                            session = %session.id(),
                            delay_secs = self.policy.delay.as_secs(),
                            "retrying user reservation"
                        );
                        self.sleeper.sleep(self.policy.delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        SessionMachine::next(session, SessionEvent::ReserveFailed)?;
        Err(PoolError::Exhausted {
            attempts: max_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn attempt(&self, query: &ReserveQuery) -> Result<ReservedIdentity, PoolError> {
        let identity = self.api.reserve(query).await?;
        if let Some(requested) = query.platform {
            if identity.platform != requested {
                let err = PoolError::PlatformMismatch {
                    requested,
                    returned: identity.platform,
                    email: identity.email.clone(),
                };
                self.release_identity(Some(identity)).await;
                return Err(err);
            }
        }
        Ok(identity)
    }

    /// Release the session's user, if any, and return the lease record.
    ///
    /// One best-effort request, never retried. The session is back to idle
    /// afterwards even when the pool did not acknowledge the release.
    pub async fn release(&self, session: &mut UserSession) -> Option<LeaseRecord> {
        let (platform, email) = {
            let identity = session.current()?;
            (identity.platform, identity.email.clone())
        };
        if let Err(err) = SessionMachine::next(session, SessionEvent::ReleaseStarted) {
            warn!(session = %session.id(), error = %err, "cannot release user");
            return None;
        }

        let acknowledged = self.release_remote(platform, &email).await;
        let record = LeaseRecord::from_session(session, acknowledged);

        if let Err(err) = SessionMachine::next(session, SessionEvent::Released) {
            warn!(session = %session.id(), error = %err, "session not reset after release");
        }
        record
    }

    /// Release a user that is not tracked by a session. `None` is a no-op.
    pub async fn release_identity(&self, identity: Option<ReservedIdentity>) {
        let Some(identity) = identity else {
            return;
        };
        self.release_remote(identity.platform, &identity.email).await;
    }

    async fn release_remote(&self, platform: Platform, email: &str) -> bool {
        match self.api.release(platform, email).await {
            Ok(()) => {
                info!(%platform, email, "user released");
                true
            }
            Err(err) => {
                warn!(%platform, email, error = %err, "failed to release user, leaving it to the pool's expiry");
                false
            }
        }
    }
}
