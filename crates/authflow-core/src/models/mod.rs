//! Data model shared by the engine and its collaborators.
//!
//! - `Credentials`: username plus user-supplied secret, redacted in `Debug`
//! - `OperationRequest`: inbound trigger consumed by exactly one routine
//! - `OperationOutcome`, `RaceResult`: normalized results inside the engine
//! - `Notification`, `Destination`, `FormState`: outbound state-change events

pub mod credentials;
pub mod notification;
pub mod outcome;
pub mod request;

pub use credentials::{Credentials, SessionToken};
pub use notification::{Destination, FormState, Notification};
pub use outcome::{AuthMode, OperationOutcome, RaceResult};
pub use request::OperationRequest;
