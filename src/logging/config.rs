use std::path::PathBuf;

/// Logging settings, read from the environment before anything else starts.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub environment: String,
    pub level: String,
    pub dir: PathBuf,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if environment == "production" {
                "info".to_string()
            } else {
                "debug".to_string()
            }
        });
        let dir = PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()));

        Self {
            environment,
            level,
            dir,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Default filter when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!(
            "blog_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_uses_level() {
        let config = LogConfig {
            environment: "production".to_string(),
            level: "warn".to_string(),
            dir: PathBuf::from("logs"),
        };
        assert!(config.is_production());
        assert!(config.filter_directive().starts_with("blog_backend=warn,"));
    }
}
