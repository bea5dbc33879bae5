// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Parlance Store
//!
//! Credential and configuration storage for Parlance.
//!
//! Two implementations of the core [`CredentialStore`] seam plus the
//! JSON persistence for provider configurations:
//!
//! - [`KeychainStore`] - platform keychain, for production
//! - [`MemoryStore`] - volatile map, for tests and ephemeral sessions
//! - [`ProviderConfigStore`] - provider list as JSON under the config dir
//!
//! Secrets live exclusively in the credential store; the configuration
//! file never contains them.
//!
//! [`CredentialStore`]: parlance_core::CredentialStore

pub mod keychain;
pub mod memory;
pub mod settings;

pub use keychain::KeychainStore;
pub use memory::MemoryStore;
pub use settings::ProviderConfigStore;
