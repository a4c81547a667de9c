mod user_session;
mod state;

pub use user_session::{LeaseRecord, UserSession};
pub use state::{SessionError, SessionEvent, SessionMachine, SessionState};
