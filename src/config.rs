use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    pub accounts: AccountsConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base used for links placed in outgoing mail.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; overrides the MySQL parts below when present.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    pub bcrypt_cost: u32,
    pub activation_code_attempts: u32,
    pub password_reset_expiry_hours: i64,
    pub password_reset_hide_unknown_email: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub site_title: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: var_or("SERVER_HOST", "0.0.0.0"),
                port: parsed_or("SERVER_PORT", 8080),
                public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:8080"),
            },
            jwt: JwtConfig {
                secret: var_or("JWT_SECRET", "your-secret-key-change-this"),
                expiration_hours: parsed_or("JWT_EXPIRATION_HOURS", 24),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok(),
                host: var_or("MYSQL_HOST", "localhost"),
                port: parsed_or("MYSQL_PORT", 3306),
                user: var_or("MYSQL_USER", "root"),
                password: var_or("MYSQL_PASSWORD", "password"),
                database: var_or("MYSQL_DATABASE", "catalog_db"),
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10),
            },
            accounts: AccountsConfig {
                bcrypt_cost: parsed_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
                activation_code_attempts: parsed_or("ACTIVATION_CODE_ATTEMPTS", 10),
                password_reset_expiry_hours: parsed_or("PASSWORD_RESET_EXPIRY_HOURS", 24),
                password_reset_hide_unknown_email: parsed_or(
                    "PASSWORD_RESET_HIDE_UNKNOWN_EMAIL",
                    false,
                ),
                admin_email: env::var("ADMIN_EMAIL").ok(),
                admin_password: env::var("ADMIN_PASSWORD").ok(),
            },
            mail: MailConfig {
                from: var_or("MAIL_FROM", "noreply@somehost.local"),
                site_title: var_or("MAIL_SITE_TITLE", "Some website title"),
            },
        })
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database.url {
            return url.clone();
        }
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_prefers_explicit_url() {
        let mut config = Config::from_env().unwrap();
        config.database.url = Some("sqlite::memory:".to_string());
        assert_eq!(config.database_url(), "sqlite::memory:");

        config.database.url = None;
        config.database.user = "app".to_string();
        config.database.password = "secret".to_string();
        config.database.host = "db".to_string();
        config.database.port = 3307;
        config.database.database = "shop".to_string();
        assert_eq!(config.database_url(), "mysql://app:secret@db:3307/shop");
    }
}
