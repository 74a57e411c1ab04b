//! Outbound notification plumbing.
//!
//! The engine only ever writes to a `NotificationSink`. `AuthStore` is a
//! reference state container that folds notifications into `AuthState`.

pub mod sink;
pub mod store;

pub use sink::{NotificationSink, SharedSink};
pub use store::{AuthState, AuthStore};
