use pocketlegal_common::{DatabaseConfig, JwtConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    /// Every charge succeeds.
    Demo,
    /// Charges succeed with probability `success_rate`.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub gateway: GatewayKind,
    pub success_rate: f64,
    pub default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store_backend: StoreBackend,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env_or("APP_ENV", "development").as_str() {
            "development" | "dev" | "test" => Environment::Development,
            "production" | "prod" => Environment::Production,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let store_backend = match env_or("STORE_BACKEND", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let gateway = match env_or("PAYMENT_GATEWAY", "demo").as_str() {
            "demo" => GatewayKind::Demo,
            "simulated" => GatewayKind::Simulated,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "PAYMENT_GATEWAY",
                    value: other.to_string(),
                })
            }
        };

        let success_rate: f64 = env_or("PAYMENT_SUCCESS_RATE", "0.95")
            .parse()
            .ok()
            .filter(|rate| (0.0..=1.0).contains(rate))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "PAYMENT_SUCCESS_RATE",
                value: env_or("PAYMENT_SUCCESS_RATE", ""),
            })?;

        Ok(Self {
            environment,
            store_backend,
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            payment: PaymentConfig {
                gateway,
                success_rate,
                default_currency: env_or("DEFAULT_CURRENCY", "USD"),
            },
            notifications: NotificationConfig {
                queue_capacity: env_or("NOTIFICATION_QUEUE_CAPACITY", "1024")
                    .parse()
                    .unwrap_or(1024)
                    .max(1),
            },
        })
    }

    /// In-memory store with the deterministic gateway. Used by tests and
    /// local demos.
    pub fn in_memory() -> Self {
        Self {
            environment: Environment::Development,
            store_backend: StoreBackend::Memory,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiration_hours: 1,
                issuer: "pocketlegal".to_string(),
            },
            payment: PaymentConfig {
                gateway: GatewayKind::Demo,
                success_rate: 1.0,
                default_currency: "USD".to_string(),
            },
            notifications: NotificationConfig { queue_capacity: 64 },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

