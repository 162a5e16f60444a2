//! `labstock-auth`: authentication boundary for the lab services.
//!
//! Decoupled from HTTP and storage: the credential table is built from
//! configuration by the caller.

pub mod credentials;
pub mod principal;
pub mod roles;

pub use credentials::{hash_password, AuthError, Authenticator, CredentialEntry, CredentialTable};
pub use principal::Principal;
pub use roles::Role;
