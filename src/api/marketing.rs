use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::Document;
use serde_json::{json, Value};

use super::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::mail::{self, SenderIdentity, TransportSettings};
use crate::models::{
    self, EmailConfig, EmailConfigPatch, EmailConfigResponse, EmailService, EmailTemplate,
    SaveEmailConfigRequest, SendEmailRequest, TemplateRequest, TemplateResponse,
};
use crate::state::AppState;

/// Marketing routes, nested under /api/marketing; everything here is
/// scoped to the authenticated caller.
pub fn marketing_routes() -> Router<AppState> {
    Router::new()
        .route("/send-email", post(send_email))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/test-config", get(test_default_config))
        .route("/test-config/{id}", get(test_config))
        .route(
            "/email-config",
            get(list_configs).post(save_config).delete(delete_first_config),
        )
        .route(
            "/email-config/{id}",
            get(get_config).put(update_config).delete(delete_config),
        )
        .route("/email-config/{id}/default", put(set_default_config))
}

/// Run the transport's own connection check for a configuration. Settings
/// or transport construction problems count as verification failures.
async fn run_preflight(
    state: &AppState,
    config: &EmailConfig,
) -> std::result::Result<(), String> {
    let settings = TransportSettings::from_config(config).map_err(|e| e.to_string())?;
    let transport = state.mailers.build(&settings).map_err(|e| e.to_string())?;
    transport.verify().await
}

fn config_oid(config: &EmailConfig) -> Result<ObjectId> {
    config
        .id
        .ok_or_else(|| AppError::InternalError("Configuration without id".to_string()))
}

// ==================== Sending ====================

/// POST /api/marketing/send-email
async fn send_email(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<Value>> {
    if request.emails.is_empty() {
        return Err(AppError::BadRequest("Emails array is required".to_string()));
    }
    let (subject, message) = match (
        request.subject.as_deref().filter(|s| !s.is_empty()),
        request.message.as_deref().filter(|m| !m.is_empty()),
    ) {
        (Some(subject), Some(message)) => (subject, message),
        _ => {
            return Err(AppError::BadRequest(
                "Subject and message are required".to_string(),
            ))
        }
    };

    let config_id = request
        .config_id
        .as_deref()
        .map(parse_object_id)
        .transpose()?;
    let config = state.marketing.resolve_config(caller.id, config_id).await?;

    let settings = TransportSettings::from_config(&config)?;
    let transport = state.mailers.build(&settings)?;
    let sender = SenderIdentity {
        name: config.sender_name.clone(),
        address: config.sender_email.clone(),
    };

    let count = mail::send_bulk(
        transport.as_ref(),
        &sender,
        &request.emails,
        subject,
        message,
        request.is_html,
    )
    .await?;

    tracing::info!(count, sender = %config.sender_email, "Marketing emails sent");
    Ok(Json(json!({
        "message": format!("Emails sent successfully to {} recipients", count),
        "count": count
    })))
}

// ==================== Verification ====================

/// GET /api/marketing/test-config
async fn test_default_config(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    run_test(caller, state, None).await
}

/// GET /api/marketing/test-config/:id
async fn test_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    run_test(caller, state, Some(id)).await
}

async fn run_test(
    caller: AuthUser,
    state: AppState,
    config_id: Option<ObjectId>,
) -> Result<Json<Value>> {
    let config = state
        .marketing
        .resolve_config(caller.id, config_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unconfigured,
            other => other,
        })?;
    let id = config_oid(&config)?;

    match run_preflight(&state, &config).await {
        Ok(()) => {
            state
                .marketing
                .set_verification(id, true, Some(Utc::now()))
                .await?;
            Ok(Json(json!({ "message": "Email configuration is valid" })))
        }
        Err(details) => {
            state.marketing.set_verification(id, false, None).await?;
            Err(AppError::Mail {
                context: "Email configuration is invalid".to_string(),
                details,
            })
        }
    }
}

// ==================== Configurations ====================

/// GET /api/marketing/email-config
async fn list_configs(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EmailConfigResponse>>> {
    let configs = state.marketing.list_configs(caller.id).await?;
    if configs.is_empty() {
        return Err(AppError::NotFound(
            "No email configurations found".to_string(),
        ));
    }
    Ok(Json(
        configs.into_iter().map(EmailConfigResponse::from).collect(),
    ))
}

/// GET /api/marketing/email-config/:id
async fn get_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmailConfigResponse>> {
    let id = parse_object_id(&id)?;
    let config = state
        .marketing
        .get_config(caller.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email configuration not found".to_string()))?;

    Ok(Json(EmailConfigResponse::from(config)))
}

/// POST /api/marketing/email-config - create, or update when `configId`
/// is present in the body.
async fn save_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<SaveEmailConfigRequest>,
) -> Result<Json<Value>> {
    match request.config_id.clone() {
        Some(id) => {
            let id = parse_object_id(&id)?;
            apply_update(caller, state, id, request.into_patch()).await
        }
        None => create_config(caller, state, request).await,
    }
}

/// PUT /api/marketing/email-config/:id
async fn update_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<EmailConfigPatch>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    apply_update(caller, state, id, patch).await
}

async fn create_config(
    caller: AuthUser,
    state: AppState,
    request: SaveEmailConfigRequest,
) -> Result<Json<Value>> {
    let sender_email = request
        .sender_email
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let sender_password = request.sender_password.clone().filter(|s| !s.is_empty());
    let sender_name = request
        .sender_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let (sender_email, sender_password, sender_name) =
        match (sender_email, sender_password, sender_name) {
            (Some(email), Some(password), Some(name)) => (email, password, name),
            _ => {
                return Err(AppError::BadRequest(
                    "Sender email, password, and name are required".to_string(),
                ))
            }
        };

    let email_service = request.email_service.unwrap_or_default();
    let (custom_host, custom_port) = if email_service == EmailService::Custom {
        match (request.custom_host.clone(), request.custom_port) {
            (Some(host), Some(port)) if !host.is_empty() => (Some(host), Some(port)),
            _ => {
                return Err(AppError::BadRequest(
                    "Custom host and port are required for custom email service".to_string(),
                ))
            }
        }
    } else {
        (None, None)
    };

    if state
        .marketing
        .sender_exists(caller.id, &sender_email)
        .await?
    {
        return Err(AppError::Conflict(
            "An email configuration with this sender email already exists".to_string(),
        ));
    }

    // The first configuration always becomes the default.
    let existing = state.marketing.count_configs(caller.id).await?;
    let is_default = existing == 0 || request.is_default.unwrap_or(false);
    if is_default && existing > 0 {
        state.marketing.clear_defaults(caller.id, None).await?;
    }

    let now = Utc::now();
    let mut config = EmailConfig {
        id: None,
        user_id: caller.id,
        sender_email,
        sender_password,
        sender_name,
        email_service,
        custom_host,
        custom_port,
        is_verified: false,
        last_verified: None,
        is_default,
        created_at: now,
        updated_at: now,
    };
    state.marketing.insert_config(&mut config).await?;

    // Best-effort immediate verification; the create stands either way.
    respond_after_preflight(
        state,
        config,
        "Email configuration saved and verified successfully",
        "Email configuration saved but verification failed",
    )
    .await
}

async fn apply_update(
    caller: AuthUser,
    state: AppState,
    id: ObjectId,
    patch: EmailConfigPatch,
) -> Result<Json<Value>> {
    let not_found = || {
        AppError::NotFound(
            "Email configuration not found or you do not have permission to update it"
                .to_string(),
        )
    };

    state
        .marketing
        .get_config(caller.id, id)
        .await?
        .ok_or_else(not_found)?;

    let connection_change = patch.is_connection_change();
    let updated = state
        .marketing
        .apply_patch(caller.id, id, &patch)
        .await?
        .ok_or_else(not_found)?;

    if connection_change {
        respond_after_preflight(
            state,
            updated,
            "Email configuration updated and verified successfully",
            "Email configuration updated but verification failed",
        )
        .await
    } else {
        Ok(Json(json!({
            "message": "Email configuration updated successfully",
            "config": EmailConfigResponse::from(updated)
        })))
    }
}

/// Verify a freshly written configuration and persist the outcome. A
/// failed check is a soft failure: the record stays, the response carries
/// the error alongside it.
async fn respond_after_preflight(
    state: AppState,
    mut config: EmailConfig,
    verified_message: &str,
    failed_message: &str,
) -> Result<Json<Value>> {
    let id = config_oid(&config)?;

    match run_preflight(&state, &config).await {
        Ok(()) => {
            let now = Utc::now();
            state
                .marketing
                .set_verification(id, true, Some(now))
                .await?;
            config.is_verified = true;
            config.last_verified = Some(now);

            Ok(Json(json!({
                "message": verified_message,
                "config": EmailConfigResponse::from(config)
            })))
        }
        Err(details) => {
            state.marketing.set_verification(id, false, None).await?;
            config.is_verified = false;

            tracing::warn!(error = %details, "Email configuration verification failed");
            Ok(Json(json!({
                "message": failed_message,
                "error": details,
                "config": EmailConfigResponse::from(config)
            })))
        }
    }
}

/// DELETE /api/marketing/email-config/:id
async fn delete_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    state
        .marketing
        .delete_config(caller.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email configuration not found".to_string()))?;

    Ok(Json(json!({
        "message": "Email configuration deleted successfully"
    })))
}

/// DELETE /api/marketing/email-config - legacy single-config delete
async fn delete_first_config(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    state
        .marketing
        .delete_first_config(caller.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email configuration not found".to_string()))?;

    Ok(Json(json!({
        "message": "Email configuration deleted successfully"
    })))
}

/// PUT /api/marketing/email-config/:id/default
async fn set_default_config(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let config = state
        .marketing
        .set_default(caller.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email configuration not found".to_string()))?;

    Ok(Json(json!({
        "message": "Default email configuration updated",
        "config": EmailConfigResponse::from(config)
    })))
}

// ==================== Templates ====================

/// GET /api/marketing/templates
async fn list_templates(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateResponse>>> {
    let templates = state.marketing.list_templates(caller.id).await?;
    Ok(Json(
        templates.into_iter().map(TemplateResponse::from).collect(),
    ))
}

/// GET /api/marketing/templates/:id
async fn get_template(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>> {
    let id = parse_object_id(&id)?;
    let template = state
        .marketing
        .get_template(caller.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))?;

    Ok(Json(TemplateResponse::from(template)))
}

/// POST /api/marketing/templates
async fn create_template(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let (name, subject, content) = match (
        request.name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        request.subject.clone().filter(|s| !s.is_empty()),
        request.content.clone().filter(|c| !c.is_empty()),
    ) {
        (Some(name), Some(subject), Some(content)) => (name.to_string(), subject, content),
        _ => {
            return Err(AppError::BadRequest(
                "Name, subject, and content are required".to_string(),
            ))
        }
    };

    if state
        .marketing
        .template_name_exists(caller.id, &name, None)
        .await?
    {
        return Err(AppError::Conflict("Template name already exists".to_string()));
    }

    let now = Utc::now();
    let mut template = EmailTemplate {
        id: None,
        name,
        subject,
        content,
        is_html: request.is_html.unwrap_or(false),
        created_by: caller.id,
        created_at: now,
        updated_at: now,
    };
    state.marketing.insert_template(&mut template).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Template created successfully",
            "template": {
                "_id": template.id.map(|id| id.to_hex()).unwrap_or_default(),
                "name": template.name,
                "subject": template.subject,
                "isHtml": template.is_html,
                "createdAt": template.created_at
            }
        })),
    ))
}

/// PUT /api/marketing/templates/:id
async fn update_template(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TemplateRequest>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let template = state
        .marketing
        .get_template(caller.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))?;

    if let Some(name) = request.name.as_deref().map(str::trim) {
        if !name.is_empty()
            && name != template.name
            && state
                .marketing
                .template_name_exists(caller.id, name, Some(id))
                .await?
        {
            return Err(AppError::Conflict("Template name already exists".to_string()));
        }
    }

    let mut set = Document::new();
    if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        set.insert("name", name);
    }
    if let Some(subject) = request.subject.filter(|s| !s.is_empty()) {
        set.insert("subject", subject);
    }
    if let Some(content) = request.content.filter(|c| !c.is_empty()) {
        set.insert("content", content);
    }
    if let Some(is_html) = request.is_html {
        set.insert("isHtml", is_html);
    }
    set.insert("updatedAt", models::bson_now());

    let updated = state
        .marketing
        .update_template(caller.id, id, set)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))?;

    Ok(Json(json!({
        "message": "Template updated successfully",
        "template": {
            "_id": updated.id.map(|id| id.to_hex()).unwrap_or_default(),
            "name": updated.name,
            "subject": updated.subject,
            "isHtml": updated.is_html,
            "updatedAt": updated.updated_at
        }
    })))
}

/// DELETE /api/marketing/templates/:id
async fn delete_template(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    if !state.marketing.delete_template(caller.id, id).await? {
        return Err(AppError::NotFound("Template not found".to_string()));
    }

    Ok(Json(json!({ "message": "Template deleted successfully" })))
}
