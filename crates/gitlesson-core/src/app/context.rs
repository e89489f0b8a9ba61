//! ServiceContext - shared collaborators handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::domain::{Hook, User};
use crate::ports::{Clock, Credentials, DocumentError, DocumentStore, HostApi};
use crate::queue::TaskStore;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// URL our webhooks point at.
    pub callback_url: String,
    /// Delay before a user's repositories are scanned again.
    pub refresh_interval: Duration,
    pub commit_page_size: u32,
    /// Client credentials for calls not made on behalf of a user.
    pub app_credentials: Option<Credentials>,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        let app_credentials = (!config.github.client_id.is_empty()).then(|| Credentials::App {
            client_id: config.github.client_id.clone(),
            client_secret: config.github.client_secret.clone(),
        });
        Self {
            callback_url: config.server.callback_url.clone(),
            refresh_interval: Duration::from_secs(config.scheduler.refresh_interval_secs),
            commit_page_size: config.scan.commit_page_size,
            app_credentials,
        }
    }
}

pub struct ServiceContext {
    pub tasks: Arc<TaskStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub host: Arc<dyn HostApi>,
    pub clock: Arc<dyn Clock>,
    pub settings: ServiceSettings,
}

impl ServiceContext {
    pub fn new(
        tasks: Arc<TaskStore>,
        documents: Arc<dyn DocumentStore>,
        host: Arc<dyn HostApi>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            tasks,
            documents,
            host,
            clock,
            settings,
        }
    }

    pub fn now_epoch(&self) -> i64 {
        self.clock.now().timestamp()
    }

    pub fn user_credentials(user: &User) -> Credentials {
        Credentials::token(&user.token)
    }

    /// `user`'s token, else the application's client credentials.
    pub fn credentials_for(&self, user: Option<&User>) -> Option<Credentials> {
        user.map(Self::user_credentials)
            .or_else(|| self.settings.app_credentials.clone())
    }

    /// The user who can act on `hook`'s repository: the linked user, else the owner.
    pub async fn hook_user(&self, hook: &Hook) -> Result<Option<User>, DocumentError> {
        if let Some(user) = self.documents.find_user(hook.linked_user_id).await? {
            return Ok(Some(user));
        }
        self.documents.find_user(hook.owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHost, TestEnv, user};

    #[test]
    fn app_credentials_only_from_configured_client() {
        let mut config = Config::default();
        assert_eq!(ServiceSettings::from_config(&config).app_credentials, None);

        config.github.client_id = "id".into();
        config.github.client_secret = "secret".into();
        assert_eq!(
            ServiceSettings::from_config(&config).app_credentials,
            Some(Credentials::App {
                client_id: "id".into(),
                client_secret: "secret".into(),
            })
        );
    }

    #[test]
    fn user_token_wins_over_app_credentials() {
        let env = TestEnv::with_app_credentials(FakeHost::new());
        let octo = user(1, "octo");
        assert_eq!(
            env.ctx.credentials_for(Some(&octo)),
            Some(Credentials::token("token-octo"))
        );
        assert!(matches!(
            env.ctx.credentials_for(None),
            Some(Credentials::App { .. })
        ));
        assert_eq!(TestEnv::new(FakeHost::new()).ctx.credentials_for(None), None);
    }
}
