//! baas-client: client SDK for a multi-tenant backend-as-a-service platform.
//!
//! The core is the session lifecycle: a bearer token persisted in a
//! key-value store, an expiration timer that clears it, and a storage-backed
//! message bus that keeps every context sharing the store in sync. A thin
//! REST layer attaches the token to resource requests.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use baas_client::prelude::*;
//!
//! # async fn example() -> baas_client::error::Result<()> {
//! let storage = FileStorage::new_default();
//! let app = Application::new(ClientConfig::from_env()?, Arc::new(storage.context()))?;
//! app.login()
//!     .login(LoginRequest::builder().username("ana").password("secret").build())
//!     .await?;
//! let articles = app.resource::<serde_json::Value>(Resource::Articles)?;
//! let page = articles.find(&FindOptions::default()).await?;
//! println!("{} articles", page.total_records);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod prelude;
pub mod resources;
pub mod routes;
pub mod storage;

#[cfg(feature = "cli")]
pub mod cli;
