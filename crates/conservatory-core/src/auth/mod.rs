//! Administrator sign-in state.
//!
//! - `Session`: the backend access token, persisted to the cache directory
//!   and dropped once it expires
//! - `CredentialStore`: optional OS keychain storage for the password

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
