use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Lifecycle events relayed locally and across contexts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum LifecycleEvent {
    TokenExpired,
    TokenUpdated,
    UserChanged,
}

/// Payload written to the message-bus key to notify other contexts.
///
/// Only the write and its `type` matter: receivers re-read authoritative
/// state instead of trusting the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleMessage {
    #[serde(rename = "type")]
    pub kind: LifecycleEvent,
}

impl LifecycleMessage {
    pub fn new(kind: LifecycleEvent) -> Self {
        Self { kind }
    }
}

impl From<LifecycleEvent> for LifecycleMessage {
    fn from(kind: LifecycleEvent) -> Self {
        Self::new(kind)
    }
}
