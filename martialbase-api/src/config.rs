/// Configuration management for the API server
///
/// Configuration comes from environment variables, optionally seeded from a
/// `.env` file in development.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma separated allowed origins, `*` for any (default: *)
/// - `APP_ENV`: `production` enables strict CORS and HSTS (default: development)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `IDENTITY_TOKEN_SECRET`: HS256 secret of the identity provider (required, >= 32 chars)
/// - `IDENTITY_TOKEN_ISSUER`: Expected `iss` claim (default: martialbase)
/// - `RUN_MIGRATIONS`: Apply migrations at start-up (default: true)
/// - `RUST_LOG` / `LOG_FORMAT`: read by the binary's tracing setup
///
/// # Example
///
/// ```no_run
/// use martialbase_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,

    /// Apply embedded migrations before serving
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Identity token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Shared with the identity provider. Never logged.
    #[serde(skip_serializing)]
    pub secret: String,

    pub issuer: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the identity secret is too short.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins =
            parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = env::var("APP_ENV")
            .map(|value| value.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let secret = env::var("IDENTITY_TOKEN_SECRET").map_err(|_| {
            anyhow::anyhow!("IDENTITY_TOKEN_SECRET environment variable is required")
        })?;
        if secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!(
                "IDENTITY_TOKEN_SECRET must be at least {} characters long",
                MIN_SECRET_LENGTH
            );
        }
        let issuer =
            env::var("IDENTITY_TOKEN_ISSUER").unwrap_or_else(|_| "martialbase".to_string());

        let run_migrations = match env::var("RUN_MIGRATIONS") {
            Ok(value) => parse_flag(&value)
                .ok_or_else(|| anyhow::anyhow!("RUN_MIGRATIONS must be true or false"))?,
            Err(_) => true,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            identity: IdentityConfig { secret, issuer },
            run_migrations,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
