//! Session token validation against records in the shared store.
//!
//! A session record is a hash at `login:token:{token}` holding the fields of
//! an [`Identity`]. Each successful validation slides the record's expiry
//! forward. The validated identity is attached to the request it belongs to
//! (see [`middleware`]) and disappears with that request.

pub mod middleware;
pub mod validator;

pub use middleware::{CurrentUser, session_middleware};
pub use validator::{Identity, SessionValidator};
