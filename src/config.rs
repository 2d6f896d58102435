use std::env;

/// Fallback signing key so a developer can boot the server without a `.env`.
const DEV_SECRET_KEY: &str = "development-secret-change-me";

/// SMTP settings. Mail is disabled when the server or sender is missing.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Token signing and lifetime settings shared by the auth collaborators.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub api_prefix: String,
    pub app_url: String,
    /// Base URL of the web client; password reset mails link to its reset page.
    pub frontend_url: String,
    pub enable_test_email: bool,
    /// Take the client address from `Forwarded` / `X-Forwarded-For`. Only
    /// safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
    pub auth: AuthConfig,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            log::warn!("SECRET_KEY is not set; using the development key");
            DEV_SECRET_KEY.to_string()
        });

        let app_url = env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 8080),
            mongo_uri: env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "user_api".to_string()),
            api_prefix: normalize_prefix(&env::var("API_PREFIX").unwrap_or_else(|_| "/api/users".to_string())),
            frontend_url: env::var("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| app_url.clone()),
            app_url,
            enable_test_email: parse_bool("ENABLE_TEST_EMAIL", true),
            trust_proxy: parse_bool("TRUST_PROXY", false),
            auth: AuthConfig {
                secret_key,
                access_token_minutes: parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", 1440),
                refresh_token_days: parse_var("REFRESH_TOKEN_EXPIRE_DAYS", 7),
            },
            smtp: smtp_from_env(),
        }
    }

    /// Settings for tests: MongoDB points at a closed port with a short server
    /// selection timeout, so any database call fails fast instead of hanging.
    pub fn for_tests() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            mongo_uri: "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200&directConnection=true"
                .to_string(),
            mongo_db_name: "user_api_test".to_string(),
            api_prefix: "/api/users".to_string(),
            app_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            enable_test_email: true,
            trust_proxy: false,
            auth: AuthConfig {
                secret_key: "test-secret".to_string(),
                access_token_minutes: 15,
                refresh_token_days: 7,
            },
            smtp: None,
        }
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let server = env::var("SMTP_SERVER").ok()?;
    let from = env::var("EMAIL_FROM").ok()?;
    Some(SmtpConfig {
        server,
        port: parse_var("SMTP_PORT", 587),
        username: env::var("SMTP_USERNAME").ok(),
        password: env::var("SMTP_PASSWORD").ok(),
        from,
    })
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Ensures a leading slash and strips trailing ones, so `api/users/` becomes `/api/users`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
