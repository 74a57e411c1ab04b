//! Credential service access.
//!
//! This module provides:
//! - `CredentialClient`: the async capability the operations call into
//! - `HttpCredentialClient`: REST implementation over `reqwest`
//! - `MemoryCredentialClient`: in-process account table for demos and tests
//! - `SecretDeriver`: per-username Argon2id derivation of the transport secret

pub mod client;
pub mod http;
pub mod memory;
pub mod secret;

pub use client::{CredentialClient, CredentialResult};
pub use http::HttpCredentialClient;
pub use memory::MemoryCredentialClient;
pub use secret::SecretDeriver;
