//! Configuration module
//!
//! Environment driven configuration for the API server, the managed document store,
//! the shared scan folder and the scanning device.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::models::{DeviceEndpoint, DocumentType};

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const STABILITY_WINDOW_MS: u64 = 2_000;
const SCAN_POLL_INTERVAL_MS: u64 = 500;
const SCAN_QUEUE_CAPACITY: usize = 64;
const SCAN_TARGET_TTL_SECS: u64 = 300;
const DEVICE_TIMEOUT_MS: u64 = 3_000;
const DEVICE_RETRY_DELAY_MS: u64 = 500;
const DEVICE_POLL_INTERVAL_SECS: u64 = 5;

/// Backing store for document records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStore {
    Postgres,
    Memory,
}

impl FromStr for DocumentStore {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DocumentStore::Postgres),
            "memory" => Ok(DocumentStore::Memory),
            _ => Err(anyhow::anyhow!("Invalid document store: {}", s)),
        }
    }
}

impl Display for DocumentStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DocumentStore::Postgres => write!(f, "postgres"),
            DocumentStore::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub document_store: DocumentStore,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub max_upload_size_bytes: usize,
}

/// Managed storage area owned by this service.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub managed_storage_path: String,
    pub storage_base_url: String,
}

/// Shared drop folder the scanner writes into.
#[derive(Clone, Debug)]
pub struct ScanFolderConfig {
    pub scan_folder: String,
    pub quarantine_path: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub stability_window_ms: u64,
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
    pub ingest_existing: bool,
    pub target_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub endpoint: DeviceEndpoint,
    pub timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub poll_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ScandeskConfig {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub scan: ScanFolderConfig,
    pub device: DeviceConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ScandeskConfig>);

impl Config {
    fn inner(&self) -> &ScandeskConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ScandeskConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        let environment = self.inner().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn document_store(&self) -> DocumentStore {
        self.inner().base.document_store
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().base.database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().base.max_upload_size_bytes
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.inner().storage
    }

    pub fn scan(&self) -> &ScanFolderConfig {
        &self.inner().scan
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.inner().device
    }
}

/// Every extension accepted by at least one document type.
fn default_scan_extensions() -> String {
    let mut extensions: Vec<&str> = DocumentType::ALL
        .iter()
        .flat_map(|t| t.profile().allowed_extensions.iter().copied())
        .collect();
    extensions.sort_unstable();
    extensions.dedup();
    extensions.join(",")
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl ScandeskConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let document_store = env::var("DOCUMENT_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<DocumentStore>()?;

        let max_upload_size_mb = env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            document_store,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
        };

        let storage = StorageConfig {
            managed_storage_path: env::var("MANAGED_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/documents".to_string()),
            storage_base_url: env::var("STORAGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000/files".to_string()),
        };

        let scan = ScanFolderConfig {
            scan_folder: env::var("SCAN_FOLDER").unwrap_or_else(|_| "./data/scans".to_string()),
            quarantine_path: env::var("SCAN_QUARANTINE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            allowed_extensions: env::var("SCAN_ALLOWED_EXTENSIONS")
                .unwrap_or_else(|_| default_scan_extensions())
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            stability_window_ms: env_or("SCAN_STABILITY_WINDOW_MS", STABILITY_WINDOW_MS),
            poll_interval_ms: env_or("SCAN_POLL_INTERVAL_MS", SCAN_POLL_INTERVAL_MS),
            queue_capacity: env_or("SCAN_QUEUE_CAPACITY", SCAN_QUEUE_CAPACITY),
            ingest_existing: env_or("SCAN_INGEST_EXISTING", false),
            target_ttl_secs: env_or("SCAN_TARGET_TTL_SECS", SCAN_TARGET_TTL_SECS),
        };

        let mut endpoint =
            DeviceEndpoint::new(env::var("DEVICE_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()));
        if let Ok(username) = env::var("DEVICE_USERNAME") {
            endpoint = endpoint.with_credentials(
                username,
                env::var("DEVICE_PASSWORD").unwrap_or_default(),
            );
        }

        let device = DeviceConfig {
            endpoint,
            timeout_ms: env_or("DEVICE_TIMEOUT_MS", DEVICE_TIMEOUT_MS),
            retry_delay_ms: env_or("DEVICE_RETRY_DELAY_MS", DEVICE_RETRY_DELAY_MS),
            poll_interval_secs: env_or("DEVICE_POLL_INTERVAL_SECS", DEVICE_POLL_INTERVAL_SECS),
        };

        let config = Self {
            base,
            storage,
            scan,
            device,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.document_store == DocumentStore::Postgres {
            match self.base.database_url.as_deref() {
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when DOCUMENT_STORE=postgres"
                    ))
                }
                Some(url)
                    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") =>
                {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                _ => {}
            }
        }

        if self.storage.managed_storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("MANAGED_STORAGE_PATH must not be empty"));
        }

        if self.scan.scan_folder.trim().is_empty() {
            return Err(anyhow::anyhow!("SCAN_FOLDER must not be empty"));
        }

        if self.scan.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "SCAN_ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        if self.scan.queue_capacity == 0 {
            return Err(anyhow::anyhow!("SCAN_QUEUE_CAPACITY must be greater than 0"));
        }

        if self.scan.poll_interval_ms == 0 || self.device.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "SCAN_POLL_INTERVAL_MS and DEVICE_POLL_INTERVAL_SECS must be greater than 0"
            ));
        }

        if self.device.endpoint.address.trim().is_empty() {
            return Err(anyhow::anyhow!("DEVICE_ADDRESS must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScandeskConfig {
        ScandeskConfig {
            base: BaseConfig {
                server_port: 4000,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                document_store: DocumentStore::Memory,
                database_url: None,
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            },
            storage: StorageConfig {
                managed_storage_path: "/tmp/docs".to_string(),
                storage_base_url: "http://localhost/files".to_string(),
            },
            scan: ScanFolderConfig {
                scan_folder: "/tmp/scans".to_string(),
                quarantine_path: None,
                allowed_extensions: vec!["pdf".to_string()],
                stability_window_ms: STABILITY_WINDOW_MS,
                poll_interval_ms: SCAN_POLL_INTERVAL_MS,
                queue_capacity: SCAN_QUEUE_CAPACITY,
                ingest_existing: false,
                target_ttl_secs: SCAN_TARGET_TTL_SECS,
            },
            device: DeviceConfig {
                endpoint: DeviceEndpoint::new("10.0.0.9"),
                timeout_ms: DEVICE_TIMEOUT_MS,
                retry_delay_ms: DEVICE_RETRY_DELAY_MS,
                poll_interval_secs: DEVICE_POLL_INTERVAL_SECS,
            },
        }
    }

    #[test]
    fn test_memory_store_needs_no_database() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_postgres_store_requires_url() {
        let mut config = sample();
        config.base.document_store = DocumentStore::Postgres;
        assert!(config.validate().is_err());

        config.base.database_url = Some("mysql://nope".to_string());
        assert!(config.validate().is_err());

        config.base.database_url = Some("postgresql://localhost/scandesk".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_extension_list_rejected() {
        let mut config = sample();
        config.scan.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_scan_extensions_cover_catalog() {
        let defaults = default_scan_extensions();
        assert!(defaults.split(',').any(|e| e == "pdf"));
        assert!(defaults.split(',').any(|e| e == "tiff"));
        assert!(!defaults.split(',').any(|e| e == "exe"));
    }

    #[test]
    fn test_document_store_parse() {
        assert_eq!("Memory".parse::<DocumentStore>().unwrap(), DocumentStore::Memory);
        assert!("sqlite".parse::<DocumentStore>().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut inner = sample();
        inner.base.environment = "PROD".to_string();
        assert!(Config(Box::new(inner)).is_production());
    }
}
