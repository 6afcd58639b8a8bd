use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{MarketingRepository, Store};
use crate::mail::{MailerFactory, SmtpMailerFactory};
use crate::media::ImageStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthService>,
    pub store: Arc<Store>,
    pub marketing: Arc<MarketingRepository>,
    pub images: Arc<ImageStore>,
    pub mailers: Arc<dyn MailerFactory>,
}

impl AppState {
    pub fn new(
        config: Config,
        auth: AuthService,
        store: Store,
        marketing: MarketingRepository,
        images: ImageStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            store: Arc::new(store),
            marketing: Arc::new(marketing),
            images: Arc::new(images),
            mailers: Arc::new(SmtpMailerFactory),
        }
    }
}
