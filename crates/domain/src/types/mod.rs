//! Domain types and models

pub mod account;
pub mod auth;
pub mod user;

pub use account::{
    EmailRequest, MessageResponse, RegisterRequest, RegisterResponse, ResetPasswordRequest,
    UpdateProfileRequest, VerifyEmailRequest, VerifyEmailResponse,
};
pub use auth::{
    Credentials, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse,
    Verify2faRequest,
};
pub use user::{Language, Theme, User, UserSettings};
