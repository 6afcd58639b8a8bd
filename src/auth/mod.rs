use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use rand::RngCore;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Account, Claims};
use crate::state::AppState;

/// JWT Authentication Service
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expiry_seconds: config.jwt_expiry_seconds,
        }
    }

    /// Generate a JWT for an authenticated account
    pub fn generate_token(&self, account_id: &str, role: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = now + self.expiry_seconds as i64;

        let claims = Claims {
            sub: account_id.to_string(),
            role: role.to_string(),
            iat: now,
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a JWT and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// The authenticated caller, resolved from the bearer token and looked up
/// in the store. Handlers take this as an explicit parameter.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub username: String,
    pub role: String,
}

impl From<Account> for AuthUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.unwrap_or_else(ObjectId::new),
            username: account.username,
            role: account.role,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let unauthorized = || AppError::Unauthorized("Please authenticate.".to_string());

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| unauthorized())?;

        let claims = state
            .auth
            .validate_token(bearer.token())
            .map_err(|_| unauthorized())?;
        let id = ObjectId::parse_str(&claims.sub).map_err(|_| unauthorized())?;

        // The account must still exist in either collection.
        let account = match state.store.admins().find_one(doc! { "_id": id }).await {
            Ok(Some(admin)) => Some(admin),
            _ => state
                .store
                .users()
                .find_one(doc! { "_id": id })
                .await
                .ok()
                .flatten(),
        };

        account.map(AuthUser::from).ok_or_else(unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server_host: "localhost".to_string(),
            server_port: 5000,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_db: "brightlens-test".to_string(),
            jwt_secret: "test-secret-key".to_string(),
            jwt_expiry_seconds: 3600,
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let auth = AuthService::new(&test_config());
        let id = ObjectId::new().to_hex();

        let token = auth
            .generate_token(&id, "admin")
            .expect("Should generate token");

        let claims = auth.validate_token(&token).expect("Should validate token");

        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn test_invalid_token() {
        let auth = AuthService::new(&test_config());

        let result = auth.validate_token("invalid-token");
        assert!(result.is_err());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2!").expect("Should hash password");

        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("hunter2!", "not-a-phc-string"));
    }
}
