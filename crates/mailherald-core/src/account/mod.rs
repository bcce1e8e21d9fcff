//! Account management module.
//!
//! Provides account configuration, storage, and credential encryption.

pub mod credentials;
mod model;
mod repository;

pub use credentials::{CredentialCipher, CredentialError, CredentialResult};
pub use model::{Account, AccountId, PushTemplate};
pub use repository::AccountRepository;
