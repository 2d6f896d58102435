// src/state.rs

use std::sync::Arc;

use mongodb::{Collection, Database};

use crate::config::{AuthConfig, Config};
use crate::models::token::TokenRecord;
use crate::models::user::UserModel;
use crate::services::mail_service::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub users_collection: Collection<UserModel>,
    pub tokens_collection: Collection<TokenRecord>,
    pub auth: Arc<AuthConfig>,
    /// Base URL used when building links in outgoing mail.
    pub app_url: String,
    /// Mount point of the user routes, e.g. `/api/users`.
    pub api_prefix: String,
    pub frontend_url: String,
    pub trust_proxy: bool,
    /// `None` when SMTP is not configured.
    pub mailer: Option<Arc<Mailer>>,
}

impl AppState {
    pub fn new(db: &Database, config: &Config, mailer: Option<Mailer>) -> Self {
        Self {
            users_collection: db.collection::<UserModel>("users"),
            tokens_collection: db.collection::<TokenRecord>("tokens"),
            auth: Arc::new(config.auth.clone()),
            app_url: config.app_url.clone(),
            api_prefix: config.api_prefix.clone(),
            frontend_url: config.frontend_url.clone(),
            trust_proxy: config.trust_proxy,
            mailer: mailer.map(Arc::new),
        }
    }

    /// Absolute URL of a route under the API prefix.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.app_url, self.api_prefix, path)
    }

    /// Absolute URL of a page in the web client. The reset page collects the
    /// new password and posts it to `/reset-password/:token`.
    pub fn frontend_page(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url, path)
    }
}
