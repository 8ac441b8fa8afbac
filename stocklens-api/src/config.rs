/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `JWT_SECRET`: Secret key for JWT signing (required, >= 32 chars)
/// - `RECOGNITION_API_KEY`: API key for the vision model endpoint (required)
/// - `RECOGNITION_MODEL`: Model name (default: gemini-2.0-flash)
/// - `RECOGNITION_BASE_URL`: Vision API base URL (default: Google endpoint)
/// - `STORAGE_URL`: Object storage base URL (optional; photo uploads are
///   disabled when unset)
/// - `STORAGE_BUCKET`: Bucket for inventory photos (default: inventory-photos)
/// - `STORAGE_SERVICE_KEY`: Bearer key for storage uploads
/// - `RUST_LOG`: Log level (default: info)
///
/// # Example
///
/// ```no_run
/// use stocklens_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Vision model endpoint configuration
    pub recognition: RecognitionConfig,

    /// Object storage configuration (None = photo uploads disabled)
    pub storage: Option<StorageConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins ("*" = permissive)
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be kept secret and at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Vision model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// API key sent with every generateContent request
    pub api_key: String,

    /// Model name (e.g. "gemini-2.0-flash")
    pub model: String,

    /// Base URL of the generative API
    pub base_url: String,
}

/// Object storage configuration (Supabase-storage-compatible HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage base URL (e.g. "https://xyz.supabase.co")
    pub url: String,

    /// Bucket that holds inventory photos
    pub bucket: String,

    /// Bearer key authorizing uploads
    pub service_key: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let recognition_api_key = env::var("RECOGNITION_API_KEY")
            .map_err(|_| anyhow::anyhow!("RECOGNITION_API_KEY environment variable is required"))?;

        let recognition_model =
            env::var("RECOGNITION_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());

        let recognition_base_url = env::var("RECOGNITION_BASE_URL").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });

        let storage = match env::var("STORAGE_URL") {
            Ok(url) => {
                let bucket = env::var("STORAGE_BUCKET")
                    .unwrap_or_else(|_| "inventory-photos".to_string());
                let service_key = env::var("STORAGE_SERVICE_KEY").map_err(|_| {
                    anyhow::anyhow!("STORAGE_SERVICE_KEY is required when STORAGE_URL is set")
                })?;
                Some(StorageConfig {
                    url,
                    bucket,
                    service_key,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            recognition: RecognitionConfig {
                api_key: recognition_api_key,
                model: recognition_model,
                base_url: recognition_base_url,
            },
            storage,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
