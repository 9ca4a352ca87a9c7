//! Application configuration, read once from the environment at startup.

use std::path::PathBuf;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Sender used when neither `MAIL_FROM` nor `SMTP_USER` is configured.
pub const FALLBACK_FROM_ADDRESS: &str = "no-reply@localhost";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL of this service, used for upload links.
    pub public_url: String,
    pub database_url: String,
    pub db_pool_max: u32,
    pub auth: AuthConfig,
    pub site: SiteConfig,
    pub mail: MailConfig,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub admin_email: String,
    /// Already-hashed password, from `ADMIN_HASH_PASSWORD`.
    pub admin_password_hash: Option<String>,
    /// Plain password, hashed at bootstrap when no hash is given.
    pub admin_password: String,
    pub bcrypt_cost: u32,
    /// Login attempts allowed per client IP within `login_window_secs`.
    pub login_max_attempts: u32,
    pub login_window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Email provider settings. A provider is only enabled when its
/// credentials are present.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let host = env_or("HOST", "127.0.0.1");
        let port = env_parse("PORT", 3001);
        Self {
            environment: env_or("ENVIRONMENT", "development"),
            public_url: env_or("PUBLIC_URL", &format!("http://{host}:{port}"))
                .trim_end_matches('/')
                .to_string(),
            host,
            port,
            database_url: env_or("DATABASE_URL", "sqlite://blog.db?mode=rwc"),
            db_pool_max: env_parse("DB_POOL_MAX", 5),
            auth: AuthConfig {
                jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
                token_expiry_hours: env_parse("TOKEN_EXPIRY_HOURS", 12),
                admin_email: env_or("ADMIN_EMAIL", DEFAULT_ADMIN_EMAIL),
                admin_password_hash: env_opt("ADMIN_HASH_PASSWORD"),
                admin_password: env_or("ADMIN_PASSWORD", DEFAULT_ADMIN_PASSWORD),
                bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
                login_max_attempts: env_parse("LOGIN_MAX_ATTEMPTS", 5),
                login_window_secs: env_parse("LOGIN_WINDOW_SECS", 60),
            },
            site: SiteConfig {
                url: env_or("SITE_URL", "http://localhost:3000")
                    .trim_end_matches('/')
                    .to_string(),
                title: env_or("SITE_TITLE", "My Blog"),
                description: env_or("SITE_DESCRIPTION", "Latest posts"),
            },
            mail: MailConfig::from_env(),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration suitable for tests: in-memory database, no mail
    /// providers, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            public_url: "http://api.blog.test".to_string(),
            database_url: "sqlite::memory:".to_string(),
            db_pool_max: 1,
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_expiry_hours: 1,
                admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
                admin_password_hash: None,
                admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
                bcrypt_cost: 4,
                login_max_attempts: 5,
                login_window_secs: 60,
            },
            site: SiteConfig {
                url: "http://blog.test".to_string(),
                title: "Test Blog".to_string(),
                description: "Test posts".to_string(),
            },
            mail: MailConfig {
                api_url: DEFAULT_EMAIL_API_URL.to_string(),
                smtp_port: DEFAULT_SMTP_PORT,
                ..MailConfig::default()
            },
            upload_dir: std::env::temp_dir().join("blog-backend-test-uploads"),
        }
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("EMAIL_API_KEY"),
            api_url: env_or("EMAIL_API_URL", DEFAULT_EMAIL_API_URL),
            smtp_host: env_opt("SMTP_HOST"),
            smtp_port: env_parse("SMTP_PORT", DEFAULT_SMTP_PORT),
            smtp_user: env_opt("SMTP_USER"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            from: env_opt("MAIL_FROM"),
        }
    }

    /// Resolve the sender: `MAIL_FROM`, then the SMTP username, then a fixed
    /// fallback. The bool is false when the fallback was used.
    pub fn resolve_from(&self) -> (String, bool) {
        match self.from.as_ref().or(self.smtp_user.as_ref()) {
            Some(addr) => (addr.clone(), true),
            None => (FALLBACK_FROM_ADDRESS.to_string(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_prefers_explicit_address() {
        let mail = MailConfig {
            from: Some("blog@example.com".to_string()),
            smtp_user: Some("smtp@example.com".to_string()),
            ..MailConfig::default()
        };
        assert_eq!(mail.resolve_from(), ("blog@example.com".to_string(), true));
    }

    #[test]
    fn test_resolve_from_falls_back_to_smtp_user() {
        let mail = MailConfig {
            smtp_user: Some("smtp@example.com".to_string()),
            ..MailConfig::default()
        };
        assert_eq!(mail.resolve_from(), ("smtp@example.com".to_string(), true));
    }

    #[test]
    fn test_resolve_from_uses_fixed_fallback() {
        let (addr, configured) = MailConfig::default().resolve_from();
        assert_eq!(addr, FALLBACK_FROM_ADDRESS);
        assert!(!configured);
    }

    #[test]
    fn test_config_for_tests_uses_memory_database() {
        let config = AppConfig::for_tests();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(!config.is_production());
    }
}
