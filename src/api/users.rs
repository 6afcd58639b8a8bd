use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::{self, AuthUser};
use crate::error::{AppError, Result};
use crate::models::{Account, AccountResponse, CreateUserRequest, LoginRequest};
use crate::state::AppState;

/// Account and login routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login_admin))
        .route("/login", post(login_user))
        .route("/admins", get(list_admins))
        .route("/users", get(list_users).post(create_user))
        .route("/admins/{id}", delete(delete_admin))
        .route("/users/{id}", delete(delete_user))
        .route("/admins/count", get(admin_count))
        .route("/users/count", get(user_count))
        .route("/validate-user-id", get(validate_user))
        .route("/users/username", get(current_username))
}

async fn login_against(
    collection: Collection<Account>,
    state: &AppState,
    request: LoginRequest,
) -> Result<(AccountResponse, String)> {
    let identifier = request
        .identifier
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("Identifier and password are required".to_string())
        })?;
    let password = request.password.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| {
        AppError::BadRequest("Identifier and password are required".to_string())
    })?;

    let account = collection
        .find_one(doc! { "$or": [ { "email": identifier }, { "username": identifier } ] })
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid login credentials".to_string()))?;

    if !auth::verify_password(password, &account.password) {
        return Err(AppError::BadRequest("Invalid login credentials".to_string()));
    }

    let id = account
        .id
        .ok_or_else(|| AppError::InternalError("Account without id".to_string()))?;
    let token = state.auth.generate_token(&id.to_hex(), &account.role)?;

    tracing::info!(username = %account.username, role = %account.role, "Login successful");
    Ok((AccountResponse::from(account), token))
}

/// POST /api/admin/login
async fn login_admin(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let (admin, token) = login_against(state.store.admins(), &state, request).await?;
    Ok(Json(json!({ "admin": admin, "token": token })))
}

/// POST /api/login
async fn login_user(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let (user, token) = login_against(state.store.users(), &state, request).await?;
    Ok(Json(json!({ "user": user, "token": token })))
}

/// GET /api/admins - all admins except the caller
async fn list_admins(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountResponse>>> {
    let admins: Vec<Account> = state
        .store
        .admins()
        .find(doc! { "_id": { "$ne": caller.id } })
        .await?
        .try_collect()
        .await?;

    Ok(Json(admins.into_iter().map(AccountResponse::from).collect()))
}

/// GET /api/users
async fn list_users(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountResponse>>> {
    let users: Vec<Account> = state.store.users().find(doc! {}).await?.try_collect().await?;
    Ok(Json(users.into_iter().map(AccountResponse::from).collect()))
}

/// POST /api/users
async fn create_user(
    _caller: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    let (username, password, name, email, role) = match (
        request.username,
        request.password,
        request.name,
        request.email,
        request.role,
    ) {
        (Some(u), Some(p), Some(n), Some(e), Some(r))
            if !u.is_empty() && !p.is_empty() && !n.is_empty() && !e.is_empty() && !r.is_empty() =>
        {
            (u, p, n, e, r)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Username, password, name, email, and role are required".to_string(),
            ))
        }
    };

    let mut account = Account {
        id: None,
        username,
        name,
        email,
        password: auth::hash_password(&password)?,
        role: role.clone(),
    };

    let collection = if role == "admin" {
        state.store.admins()
    } else {
        state.store.users()
    };
    let result = collection.insert_one(&account).await?;
    account.id = result.inserted_id.as_object_id();

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// DELETE /api/admins/:id
async fn delete_admin(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>> {
    let id = parse_object_id(&id)?;
    let admin = state
        .store
        .admins()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    Ok(Json(AccountResponse::from(admin)))
}

/// DELETE /api/users/:id
async fn delete_user(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>> {
    let id = parse_object_id(&id)?;
    let user = state
        .store
        .users()
        .find_one_and_delete(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(AccountResponse::from(user)))
}

/// GET /api/admins/count - admins other than the caller
async fn admin_count(caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state
        .store
        .admins()
        .count_documents(doc! { "_id": { "$ne": caller.id } })
        .await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/users/count - users other than the caller
async fn user_count(caller: AuthUser, State(state): State<AppState>) -> Result<Json<Value>> {
    let count = state
        .store
        .users()
        .count_documents(doc! { "_id": { "$ne": caller.id } })
        .await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/validate-user-id - token sanity check for the dashboard
async fn validate_user(_caller: AuthUser) -> Json<Value> {
    Json(json!({ "valid": true }))
}

/// GET /api/users/username
async fn current_username(caller: AuthUser) -> Json<Value> {
    Json(json!({ "username": caller.username }))
}
