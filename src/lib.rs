//! Client for the user-pool service that leases disposable test accounts.
//!
//! A [`UserPool`] reserves a user into a [`UserSession`], retrying transient
//! failures with a fixed delay, and releases it when the test is done.

pub mod config;
pub mod error;
pub mod pool;
pub mod reservation;
pub mod session;

pub use config::PoolConfig;
pub use error::AppError;
pub use pool::{
    Feature, FeatureFilter, Platform, PoolApi, PoolError, PoolHttpClient, ReservedIdentity,
    UserAuth,
};
pub use reservation::{ReserveRequest, RetryPolicy, Sleeper, TokioSleeper, UserPool};
pub use session::{LeaseRecord, SessionError, SessionState, UserSession};
