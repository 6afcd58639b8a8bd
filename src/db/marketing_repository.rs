use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;

use super::Store;
use crate::error::{AppError, Result};
use crate::models::{self, EmailConfig, EmailConfigPatch, EmailTemplate};

/// Store operations for sender configurations and message templates.
///
/// Per-owner invariants live here: unique sender addresses, a single
/// default configuration (self-healed on every write that sets one), the
/// first configuration becoming the default, and default reassignment when
/// the default is deleted. All writes are last-write-wins single-document
/// updates; unset-all-then-set-one is two sequential writes, not atomic.
#[derive(Clone)]
pub struct MarketingRepository {
    configs: Collection<EmailConfig>,
    templates: Collection<EmailTemplate>,
}

impl MarketingRepository {
    pub fn new(store: &Store) -> Self {
        Self {
            configs: store.email_configs(),
            templates: store.email_templates(),
        }
    }

    // ==================== Configurations ====================

    /// Resolve the configuration a send or verify call should use: the
    /// explicitly named one, otherwise the owner's default, otherwise any
    /// configuration the owner has.
    pub async fn resolve_config(
        &self,
        user_id: ObjectId,
        config_id: Option<ObjectId>,
    ) -> Result<EmailConfig> {
        if let Some(id) = config_id {
            return self
                .configs
                .find_one(doc! { "_id": id, "userId": user_id })
                .await?
                .ok_or_else(|| AppError::NotFound("Email configuration not found".to_string()));
        }

        if let Some(config) = self
            .configs
            .find_one(doc! { "userId": user_id, "isDefault": true })
            .await?
        {
            return Ok(config);
        }

        self.configs
            .find_one(doc! { "userId": user_id })
            .await?
            .ok_or(AppError::Unconfigured)
    }

    pub async fn list_configs(&self, user_id: ObjectId) -> Result<Vec<EmailConfig>> {
        let cursor = self.configs.find(doc! { "userId": user_id }).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn get_config(
        &self,
        user_id: ObjectId,
        id: ObjectId,
    ) -> Result<Option<EmailConfig>> {
        Ok(self
            .configs
            .find_one(doc! { "_id": id, "userId": user_id })
            .await?)
    }

    pub async fn count_configs(&self, user_id: ObjectId) -> Result<u64> {
        Ok(self
            .configs
            .count_documents(doc! { "userId": user_id })
            .await?)
    }

    pub async fn sender_exists(&self, user_id: ObjectId, sender_email: &str) -> Result<bool> {
        Ok(self
            .configs
            .find_one(doc! { "userId": user_id, "senderEmail": sender_email })
            .await?
            .is_some())
    }

    pub async fn insert_config(&self, config: &mut EmailConfig) -> Result<()> {
        let result = self.configs.insert_one(&*config).await?;
        config.id = result.inserted_id.as_object_id();
        tracing::info!(
            config = %config.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender = %config.sender_email,
            "Email configuration created"
        );
        Ok(())
    }

    /// Unset the default flag on all of the owner's configurations, except
    /// the one named (when updating that one in place).
    pub async fn clear_defaults(&self, user_id: ObjectId, except: Option<ObjectId>) -> Result<()> {
        let mut filter = doc! { "userId": user_id };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }
        self.configs
            .update_many(
                filter,
                doc! { "$set": { "isDefault": false, "updatedAt": models::bson_now() } },
            )
            .await?;
        Ok(())
    }

    /// Apply a partial update. Setting the default flag first unsets every
    /// other default for the owner; connection changes reset verification
    /// (handled by the patch itself).
    pub async fn apply_patch(
        &self,
        user_id: ObjectId,
        id: ObjectId,
        patch: &EmailConfigPatch,
    ) -> Result<Option<EmailConfig>> {
        if patch.is_default == Some(true) {
            self.clear_defaults(user_id, Some(id)).await?;
        }
        Ok(self
            .configs
            .find_one_and_update(
                doc! { "_id": id, "userId": user_id },
                doc! { "$set": patch.set_document() },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    /// Persist the outcome of a preflight verification attempt.
    pub async fn set_verification(
        &self,
        id: ObjectId,
        verified: bool,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut set = doc! { "isVerified": verified, "updatedAt": models::bson_now() };
        if let Some(at) = at {
            set.insert(
                "lastVerified",
                mongodb::bson::to_bson(&at)
                    .unwrap_or_else(|_| mongodb::bson::Bson::String(at.to_rfc3339())),
            );
        }
        self.configs
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;
        Ok(())
    }

    pub async fn set_default(
        &self,
        user_id: ObjectId,
        id: ObjectId,
    ) -> Result<Option<EmailConfig>> {
        self.clear_defaults(user_id, None).await?;
        Ok(self
            .configs
            .find_one_and_update(
                doc! { "_id": id, "userId": user_id },
                doc! { "$set": { "isDefault": true, "updatedAt": models::bson_now() } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    /// Delete a configuration. When the deleted entry was the default, the
    /// first remaining configuration (if any) is promoted.
    pub async fn delete_config(
        &self,
        user_id: ObjectId,
        id: ObjectId,
    ) -> Result<Option<EmailConfig>> {
        let deleted = self
            .configs
            .find_one_and_delete(doc! { "_id": id, "userId": user_id })
            .await?;

        if let Some(deleted) = &deleted {
            if deleted.is_default {
                self.promote_any_default(user_id).await?;
            }
            tracing::info!(sender = %deleted.sender_email, "Email configuration deleted");
        }

        Ok(deleted)
    }

    /// Legacy single-config delete: removes the first configuration found
    /// for the owner.
    pub async fn delete_first_config(&self, user_id: ObjectId) -> Result<Option<EmailConfig>> {
        let deleted = self
            .configs
            .find_one_and_delete(doc! { "userId": user_id })
            .await?;
        if let Some(deleted) = &deleted {
            if deleted.is_default {
                self.promote_any_default(user_id).await?;
            }
        }
        Ok(deleted)
    }

    async fn promote_any_default(&self, user_id: ObjectId) -> Result<()> {
        if let Some(first) = self.configs.find_one(doc! { "userId": user_id }).await? {
            if let Some(first_id) = first.id {
                self.configs
                    .update_one(
                        doc! { "_id": first_id },
                        doc! { "$set": { "isDefault": true, "updatedAt": models::bson_now() } },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    // ==================== Templates ====================

    pub async fn list_templates(&self, user_id: ObjectId) -> Result<Vec<EmailTemplate>> {
        let cursor = self
            .templates
            .find(doc! { "createdBy": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn get_template(
        &self,
        user_id: ObjectId,
        id: ObjectId,
    ) -> Result<Option<EmailTemplate>> {
        Ok(self
            .templates
            .find_one(doc! { "_id": id, "createdBy": user_id })
            .await?)
    }

    /// Name uniqueness is enforced per owner with a read-before-write check.
    pub async fn template_name_exists(
        &self,
        user_id: ObjectId,
        name: &str,
        exclude: Option<ObjectId>,
    ) -> Result<bool> {
        let mut filter = doc! { "createdBy": user_id, "name": name };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id });
        }
        Ok(self.templates.find_one(filter).await?.is_some())
    }

    pub async fn insert_template(&self, template: &mut EmailTemplate) -> Result<()> {
        let result = self.templates.insert_one(&*template).await?;
        template.id = result.inserted_id.as_object_id();
        Ok(())
    }

    pub async fn update_template(
        &self,
        user_id: ObjectId,
        id: ObjectId,
        set: Document,
    ) -> Result<Option<EmailTemplate>> {
        Ok(self
            .templates
            .find_one_and_update(
                doc! { "_id": id, "createdBy": user_id },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn delete_template(&self, user_id: ObjectId, id: ObjectId) -> Result<bool> {
        let result = self
            .templates
            .delete_one(doc! { "_id": id, "createdBy": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
