pub mod marketing_repository;

pub use marketing_repository::MarketingRepository;

use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Collection, Database, IndexModel};

use crate::config::Config;
use crate::error::Result;
use crate::models::{
    Account, BlockedDate, Booking, Card, Client, Contact, EmailConfig, EmailTemplate, Event,
    Report,
};

/// Typed handles over the document store.
#[derive(Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = MongoClient::with_uri_str(&config.mongo_uri).await?;
        Ok(Self {
            db: client.database(&config.mongo_db),
        })
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(true)
    }

    /// One config per (owner, sender address); duplicates are also checked
    /// read-before-write, the index backstops racing writers.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "userId": 1, "senderEmail": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("userId_senderEmail_unique".to_string())
                    .build(),
            )
            .build();
        self.email_configs().create_index(index).await?;
        Ok(())
    }

    pub fn admins(&self) -> Collection<Account> {
        self.db.collection("admins")
    }

    pub fn users(&self) -> Collection<Account> {
        self.db.collection("users")
    }

    pub fn bookings(&self) -> Collection<Booking> {
        self.db.collection("bookings")
    }

    pub fn reports(&self) -> Collection<Report> {
        self.db.collection("reports")
    }

    pub fn blocked_dates(&self) -> Collection<BlockedDate> {
        self.db.collection("blockeddates")
    }

    pub fn events(&self) -> Collection<Event> {
        self.db.collection("events")
    }

    pub fn cards(&self) -> Collection<Card> {
        self.db.collection("cards")
    }

    pub fn clients(&self) -> Collection<Client> {
        self.db.collection("clients")
    }

    pub fn contacts(&self) -> Collection<Contact> {
        self.db.collection("contacts")
    }

    pub fn email_configs(&self) -> Collection<EmailConfig> {
        self.db.collection("emailconfigs")
    }

    pub fn email_templates(&self) -> Collection<EmailTemplate> {
        self.db.collection("emailtemplates")
    }
}
