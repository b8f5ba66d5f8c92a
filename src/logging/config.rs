use std::path::PathBuf;

/// Where log output goes and how verbose it is.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub environment: String,
    pub level: String,
    pub directory: PathBuf,
    /// Rotated files kept per log (daily rotation).
    pub max_files: usize,
    /// Management commands log to the console only.
    pub console_only: bool,
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

        Self {
            environment,
            level,
            directory: PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())),
            max_files: std::env::var("LOG_MAX_FILES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            console_only: false,
        }
    }

    /// Configuration for one-off commands: console output, no log files.
    pub fn console() -> Self {
        Self {
            console_only: true,
            ..Self::from_env()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is not set.
    pub fn filter_directives(&self) -> String {
        let http_level = if self.is_production() { "info" } else { "debug" };
        format!(
            "arc_cms={level},manage={level},tower_http={http},axum={http},sqlx=warn",
            level = self.level,
            http = http_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str, level: &str) -> LogConfig {
        LogConfig {
            environment: environment.to_string(),
            level: level.to_string(),
            directory: PathBuf::from("logs"),
            max_files: 5,
            console_only: false,
        }
    }

    #[test]
    fn test_filter_directives_development() {
        let directives = config("development", "debug").filter_directives();
        assert!(directives.starts_with("arc_cms=debug"));
        assert!(directives.contains("tower_http=debug"));
    }

    #[test]
    fn test_filter_directives_production_quiets_http_layers() {
        let directives = config("production", "warn").filter_directives();
        assert!(directives.contains("arc_cms=warn"));
        assert!(directives.contains("tower_http=info"));
        assert!(directives.contains("sqlx=warn"));
    }
}
