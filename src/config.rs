use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub database_directory: PathBuf,
    pub database_directory_file: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: u64,
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// A `.env` file is honored outside production.
    pub fn from_env() -> Result<Self, String> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        if environment != "production" {
            dotenvy::dotenv().ok();
        }

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET environment variable must be set")?;
        if jwt_secret.is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }

        let jwt_expiration_hours = match env::var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
        {
            Ok(hours) if hours > 0 => hours,
            _ => {
                tracing::warn!("Invalid JWT_EXPIRATION_HOURS, falling back to 24h");
                24
            }
        };

        let database_directory =
            PathBuf::from(env::var("DATABASE_DIRECTORY").unwrap_or_else(|_| "data".to_string()));

        let database_directory_file =
            env::var("DATABASE_DIRECTORY_FILE").unwrap_or_else(|_| "metadata.db".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        let rate_limit_requests = env::var("RATE_LIMIT_REQUESTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| "Invalid RATE_LIMIT_REQUESTS")?;

        let rate_limit_window_secs = env::var("RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| "Invalid RATE_LIMIT_WINDOW_SECS")?;

        Ok(Config {
            server_port,
            jwt_secret,
            jwt_expiration_hours,
            database_directory,
            database_directory_file,
            allowed_origins,
            rate_limit_requests,
            rate_limit_window_secs,
            environment,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("0.0.0.0:{}", self.server_port)
    }

    /// Location of the metadata store file
    pub fn metadata_path(&self) -> PathBuf {
        self.database_directory.join(&self.database_directory_file)
    }

    /// Bearer token lifetime
    pub fn jwt_expiration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt_expiration_hours)
    }
}
