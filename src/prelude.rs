//! Convenience re-exports for common use.

pub use crate::app::Application;
pub use crate::auth::{LoginClient, LoginRequest, Token, TokenManager, UserInfo, UserStore};
pub use crate::config::ClientConfig;
pub use crate::error::{Result, SdkError};
pub use crate::events::{Event, EventOrigin, EventRelay, LifecycleEvent};
pub use crate::resources::{CollectionResponse, Resource, ResourceClient};
pub use crate::routes::{FindOptions, GetOptions};
pub use crate::storage::{FileStorage, KeyValueStore, MemoryStorage};
