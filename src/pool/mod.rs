pub mod client;
pub mod error;
pub mod types;

pub use client::{PoolApi, PoolHttpClient};
pub use error::PoolError;
pub use types::{
    Credentials, Feature, FeatureFilter, Platform, PlatformAuth, ReserveQuery, ReservedIdentity,
    UserAuth,
};
