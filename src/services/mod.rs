//! Authentication and logging services

pub mod auth;
pub mod logging;

pub use auth::{
    AuthService, RegisterInput, TokenIssuer, TokenResponse, UserClaims, bearer_token,
    hash_password, verify_password,
};
