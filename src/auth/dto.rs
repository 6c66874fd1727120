use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body returned after login, register or refresh; tokens travel in cookies.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
}
