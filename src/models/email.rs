use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Outbound mail services a sender identity can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailService {
    #[default]
    Gmail,
    Outlook,
    Yahoo,
    Custom,
}

/// A stored sender identity + transport credentials, scoped to one user.
///
/// Per owner: sender addresses are unique, and at most one config carries
/// `is_default` (the first created config becomes default automatically).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub sender_email: String,
    /// Never serialized into responses; read endpoints go through
    /// [`EmailConfigResponse`].
    pub sender_password: String,
    pub sender_name: String,
    #[serde(default)]
    pub email_service: EmailService,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_port: Option<u16>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Configuration fields safe to return to clients (credential excluded).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfigResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub email_service: EmailService,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_port: Option<u16>,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailConfig> for EmailConfigResponse {
    fn from(config: EmailConfig) -> Self {
        Self {
            id: config.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender_email: config.sender_email,
            sender_name: config.sender_name,
            email_service: config.email_service,
            custom_host: config.custom_host,
            custom_port: config.custom_port,
            is_verified: config.is_verified,
            last_verified: config.last_verified,
            is_default: config.is_default,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

/// Create-or-update payload for `POST /email-config`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEmailConfigRequest {
    pub config_id: Option<String>,
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub sender_name: Option<String>,
    pub email_service: Option<EmailService>,
    pub custom_host: Option<String>,
    pub custom_port: Option<u16>,
    pub is_default: Option<bool>,
}

impl SaveEmailConfigRequest {
    pub fn into_patch(self) -> EmailConfigPatch {
        EmailConfigPatch {
            sender_email: self.sender_email,
            sender_password: self.sender_password,
            sender_name: self.sender_name,
            email_service: self.email_service,
            custom_host: self.custom_host,
            custom_port: self.custom_port,
            is_default: self.is_default,
        }
    }
}

/// Partial update of an existing configuration. Only present fields are
/// written; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfigPatch {
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub sender_name: Option<String>,
    pub email_service: Option<EmailService>,
    pub custom_host: Option<String>,
    pub custom_port: Option<u16>,
    pub is_default: Option<bool>,
}

impl EmailConfigPatch {
    /// True when the patch touches a field that affects how the transport
    /// connects. Such a change invalidates any previous verification.
    pub fn is_connection_change(&self) -> bool {
        self.sender_email.is_some()
            || self.sender_password.is_some()
            || self.email_service.is_some()
            || self.custom_host.is_some()
            || self.custom_port.is_some()
    }

    /// Build the `$set` document for this patch. Connection changes also
    /// reset the verified flag; `updatedAt` is always refreshed.
    pub fn set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(sender_email) = &self.sender_email {
            set.insert("senderEmail", sender_email.trim().to_lowercase());
        }
        if let Some(sender_password) = &self.sender_password {
            set.insert("senderPassword", sender_password.as_str());
        }
        if let Some(sender_name) = &self.sender_name {
            set.insert("senderName", sender_name.trim());
        }
        if let Some(email_service) = &self.email_service {
            let value = mongodb::bson::to_bson(email_service)
                .unwrap_or_else(|_| Bson::String("gmail".to_string()));
            set.insert("emailService", value);
        }
        if let Some(custom_host) = &self.custom_host {
            set.insert("customHost", custom_host.as_str());
        }
        if let Some(custom_port) = self.custom_port {
            set.insert("customPort", custom_port as i32);
        }
        if let Some(is_default) = self.is_default {
            set.insert("isDefault", is_default);
        }
        if self.is_connection_change() {
            set.insert("isVerified", false);
        }
        set.insert("updatedAt", super::bson_now());
        set
    }
}

/// A named, reusable (subject, body) pair owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub is_html: bool,
    pub created_by: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub is_html: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailTemplate> for TemplateResponse {
    fn from(template: EmailTemplate) -> Self {
        Self {
            id: template.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: template.name,
            subject: template.subject,
            content: template.content,
            is_html: template.is_html,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub is_html: Option<bool>,
}

/// Transient bulk-send request; nothing here is persisted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default)]
    pub emails: Vec<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    pub config_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn patch_emits_only_present_fields() {
        let patch = EmailConfigPatch {
            sender_name: Some("Studio".to_string()),
            ..Default::default()
        };
        let set = patch.set_document();

        assert_eq!(set.get_str("senderName").unwrap(), "Studio");
        assert!(!set.contains_key("senderEmail"));
        assert!(!set.contains_key("senderPassword"));
        assert!(!set.contains_key("isDefault"));
        assert!(set.contains_key("updatedAt"));
    }

    #[test]
    fn cosmetic_patch_keeps_verification() {
        let patch = EmailConfigPatch {
            sender_name: Some("New Name".to_string()),
            is_default: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_connection_change());
        assert!(!patch.set_document().contains_key("isVerified"));
    }

    #[test]
    fn connection_patch_resets_verification() {
        for patch in [
            EmailConfigPatch {
                sender_email: Some("new@studio.test".to_string()),
                ..Default::default()
            },
            EmailConfigPatch {
                sender_password: Some("app-pass".to_string()),
                ..Default::default()
            },
            EmailConfigPatch {
                email_service: Some(EmailService::Yahoo),
                ..Default::default()
            },
            EmailConfigPatch {
                custom_host: Some("mail.studio.test".to_string()),
                ..Default::default()
            },
            EmailConfigPatch {
                custom_port: Some(2525),
                ..Default::default()
            },
        ] {
            assert!(patch.is_connection_change());
            assert_eq!(patch.set_document().get_bool("isVerified").unwrap(), false);
        }
    }

    #[test]
    fn patch_normalizes_sender_email() {
        let patch = EmailConfigPatch {
            sender_email: Some("  Marco@Studio.TEST ".to_string()),
            ..Default::default()
        };
        let set = patch.set_document();
        assert_eq!(set.get_str("senderEmail").unwrap(), "marco@studio.test");
    }

    #[test]
    fn service_kind_round_trips_as_lowercase() {
        let json = serde_json::to_string(&EmailService::Outlook).unwrap();
        assert_eq!(json, "\"outlook\"");
        let parsed: EmailService = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(parsed, EmailService::Custom);
    }
}
