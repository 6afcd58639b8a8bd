pub mod blocked_date;
pub mod booking;
pub mod card;
pub mod client;
pub mod contact;
pub mod email;
pub mod event;
pub mod report;
pub mod user;

pub use blocked_date::BlockedDate;
pub use booking::Booking;
pub use card::{Card, CardDetail};
pub use client::{Client, ClientStatus};
pub use contact::{Contact, ContactPriority, ContactStatus, CreateContactRequest};
pub use email::{
    EmailConfig, EmailConfigPatch, EmailConfigResponse, EmailService, EmailTemplate,
    SaveEmailConfigRequest, SendEmailRequest, TemplateRequest, TemplateResponse,
};
pub use event::Event;
pub use report::Report;
pub use user::{Account, AccountResponse, Claims, CreateUserRequest, LoginRequest};

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::Bson;
use serde::Serializer;

/// Serialize an optional ObjectId as its 24-char hex form.
///
/// Documents are always inserted with `id: None` (the field is skipped and
/// the store assigns the id), so this serializer only runs on the JSON path.
pub(crate) fn oid_as_hex<S>(id: &Option<ObjectId>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match id {
        Some(oid) => serializer.serialize_str(&oid.to_hex()),
        None => serializer.serialize_none(),
    }
}

/// Current timestamp as the same BSON value the model serde produces,
/// for use in hand-built update documents.
pub(crate) fn bson_now() -> Bson {
    let now: DateTime<Utc> = Utc::now();
    mongodb::bson::to_bson(&now).unwrap_or_else(|_| Bson::String(now.to_rfc3339()))
}
