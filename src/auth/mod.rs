//! Token lifecycle, identity cache and login flows.

pub mod login;
pub mod manager;
pub mod token;
pub mod user;

pub use login::{LoginClient, LoginRequest};
pub use manager::TokenManager;
pub use token::{ProviderTokenResponse, Token};
pub use user::{UserInfo, UserStore};
