use serde::Deserialize;

/// Default model used when the catalog cannot be queried or no model is requested.
pub const DEFAULT_MODEL: &str = "gpt-oss:20b";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Bearer token accepted on protected routes.
    pub api_token: String,
    pub ollama_base_url: String,
    pub ollama_default_model: String,
    /// Overall timeout for a streamed generation.
    pub ollama_timeout_secs: u64,
    /// Timeout for the model catalog lookup.
    pub ollama_models_timeout_secs: u64,
    /// Allowed CORS origins. Empty means permissive.
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_token: std::env::var("API_TOKEN")
                .map_err(|_| anyhow::anyhow!("API_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("API_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            ollama_base_url: validate_http_url(
                "OLLAMA_BASE_URL",
                std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            )?,
            ollama_default_model: std::env::var("OLLAMA_DEFAULT_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ollama_timeout_secs: parse_secs("OLLAMA_TIMEOUT_SECS", 120)?,
            ollama_models_timeout_secs: parse_secs("OLLAMA_MODELS_TIMEOUT_SECS", 5)?,
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database: {}", database_target(&config.database_url));
        tracing::debug!("Ollama Base URL: {}", config.ollama_base_url);
        tracing::debug!("Default model: {}", config.ollama_default_model);
        tracing::debug!("Server Port: {}", config.port);
        if !config.cors_allowed_origins.is_empty() {
            tracing::info!("CORS origins: {:?}", config.cors_allowed_origins);
        }

        Ok(config)
    }
}

/// `host[:port]/dbname` of a database URL, without credentials.
fn database_target(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("localhost");
            match parsed.port() {
                Some(port) => format!("{}:{}{}", host, port, parsed.path()),
                None => format!("{}{}", host, parsed.path()),
            }
        }
        Err(_) => "<unparseable>".to_string(),
    }
}

fn validate_http_url(name: &str, raw: String) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn parse_secs(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", name))?;
            if secs == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
            Ok(secs)
        }
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
