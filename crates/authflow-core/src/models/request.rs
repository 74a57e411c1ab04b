use serde::{Deserialize, Serialize};

use super::Credentials;

/// Inbound trigger produced by the presentation layer.
///
/// Each request is claimed by exactly one coordination routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum OperationRequest {
    #[serde(rename = "LoginRequested")]
    Login(Credentials),
    #[serde(rename = "RegisterRequested")]
    Register(Credentials),
    #[serde(rename = "LogoutRequested")]
    Logout,
}

impl OperationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationRequest::Login(_) => "login",
            OperationRequest::Register(_) => "register",
            OperationRequest::Logout => "logout",
        }
    }
}
