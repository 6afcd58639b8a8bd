use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A dashboard account. Admins and regular users live in separate
/// collections but share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub name: String,
    pub email: String,
    /// Argon2 hash, never serialized into responses.
    pub password: String,
    pub role: String,
}

/// Account fields safe to return to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: account.username,
            name: account.name,
            email: account.email,
            role: account.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub identifier: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id (hex)
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}
