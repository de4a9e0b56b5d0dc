use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig {
                filename: env::var("DATABASE_FILENAME")
                    .unwrap_or_else(|_| "circulation.db".into()),
            },
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8080),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}
