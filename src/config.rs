use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared webhook secret. When unset the webhook endpoint is open
    /// and startup logs a warning.
    pub webhook_secret: Option<String>,
    /// Default country calling code prefixed onto national numbers.
    pub default_country_code: String,
    /// Requests per second per client IP; 0 disables rate limiting.
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_country_code: {
                let cc = std::env::var("DEFAULT_COUNTRY_CODE").unwrap_or_else(|_| "55".to_string());
                if cc.is_empty() || !cc.chars().all(|c| c.is_ascii_digit()) {
                    anyhow::bail!("DEFAULT_COUNTRY_CODE must contain digits only");
                }
                cc
            },
            rate_limit_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a number"))?,
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_BURST must be a number"))?,
        };

        if config.rate_limit_per_second > 0 && config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_BURST must be at least 1 when rate limiting is enabled");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Default country code: {}", config.default_country_code);
        if config.webhook_secret.is_none() {
            tracing::warn!("⚠️ WEBHOOK_SECRET not set, webhook endpoint accepts any caller");
        }
        if config.rate_limit_per_second == 0 {
            tracing::warn!("Rate limiting disabled (RATE_LIMIT_PER_SECOND=0)");
        }

        Ok(config)
    }

    /// Configuration for in-process tests: no rate limiting, no
    /// webhook secret, and a database URL nothing connects to.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgresql://localhost/imob_lead_test".to_string(),
            port: 0,
            webhook_secret: None,
            default_country_code: "55".to_string(),
            rate_limit_per_second: 0,
            rate_limit_burst: 0,
        }
    }
}
