#![allow(dead_code)]

use actix_web::{web, App};
use async_trait::async_trait;
use catalog_service::{
    api,
    config::Config,
    db::{self, DbPool},
    entities::user,
    models::RegisterRequest,
    services::{
        accounts,
        mailer::{Notification, Notifier},
    },
};
use std::sync::{Arc, Mutex};

/// Keeps every notification so tests can read codes and tokens back.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl CapturingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn activation_code(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::ActivationRequested { email: to, code } if to == email => Some(code),
            _ => None,
        })
    }

    pub fn reset_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::PasswordResetRequested { email: to, token } if to == email => {
                Some(token)
            }
            _ => None,
        })
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), anyhow::Error> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// In-memory SQLite on a single connection, cheap password hashing.
pub fn test_config() -> Config {
    let mut config = Config::from_env().expect("Failed to load configuration");
    config.database.url = Some("sqlite::memory:".to_string());
    config.database.max_connections = 1;
    config.accounts.bcrypt_cost = 4;
    config.accounts.password_reset_hide_unknown_email = false;
    config.jwt.secret = "test-secret".to_string();
    config
}

pub struct TestContext {
    pub config: Config,
    pub pool: DbPool,
    pub notifier: Arc<CapturingNotifier>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let pool = db::create_pool(&config)
            .await
            .expect("Failed to create database pool");
        TestContext {
            config,
            pool,
            notifier: Arc::new(CapturingNotifier::default()),
        }
    }

    pub fn app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        App::new()
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.pool.clone()))
            .app_data(web::Data::from(notifier))
            .configure(api::configure)
    }

    /// Registered and activated account.
    pub async fn active_user(&self, email: &str, password: &str) -> user::Model {
        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: None,
            name: None,
            last_name: None,
        };
        accounts::register(&self.pool, &self.config, self.notifier.as_ref(), &req)
            .await
            .expect("register");
        let code = self
            .notifier
            .activation_code(email)
            .expect("activation code mailed");
        accounts::activate(&self.pool, &code, None)
            .await
            .expect("activate")
    }

    pub async fn admin(&self, email: &str, password: &str) -> user::Model {
        accounts::ensure_superuser(&self.pool, &self.config, email, password)
            .await
            .expect("superuser")
    }

    pub async fn token(&self, email: &str, password: &str) -> String {
        let (token, _) = accounts::login(&self.pool, &self.config, email, password)
            .await
            .expect("login");
        token
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
