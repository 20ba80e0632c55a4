pub mod controller;
pub mod store;

pub use controller::{
    SessionController, SessionHandle, SessionNotice, SessionPhase, SessionRefresher,
    SessionSnapshot, DEFAULT_SESSION_TTL_SECONDS, WARNING_LEAD_SECONDS,
};
pub use store::{SessionStore, SessionUser};
