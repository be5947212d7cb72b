//! Configuration types for memc-load

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Store client settings shared by every endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Time allowed to establish a TCP connection (default: 3 seconds)
    #[serde(default = "default_store_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Time allowed for one write and its reply (default: 3 seconds)
    #[serde(default = "default_store_timeout", with = "duration_serde")]
    pub io_timeout: Duration,

    /// Idle connections kept per endpoint between writes (default: 8)
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_store_timeout(),
            io_timeout: default_store_timeout(),
            max_idle_connections: default_max_idle_connections(),
        }
    }
}

/// Main configuration for a load run
///
/// The core pipeline only reads `workers`, `dry_run`, `max_error_rate`,
/// `queue_capacity`, `routes` and `store`. `pattern` and `log_file` are used by
/// the discovery step and the binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Glob selecting input files (default: "/data/appsinstalled/*.tsv.gz")
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Number of concurrent workers per file (default: 8)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Log intended writes instead of performing them
    #[serde(default)]
    pub dry_run: bool,

    /// Error rate below which a file counts as a successful load (default: 0.01)
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,

    /// Capacity of the line queue between the reader and the workers (default: 10000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Device type -> store endpoint ("host:port")
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, String>,

    /// Store client settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Log destination (stderr when None)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            workers: default_workers(),
            dry_run: false,
            max_error_rate: default_max_error_rate(),
            queue_capacity: default_queue_capacity(),
            routes: default_routes(),
            store: StoreConfig::default(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Check that the configuration can drive a pipeline
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity", "must be at least 1"));
        }
        // errors / processed can exceed 1, so large values are allowed
        if !self.max_error_rate.is_finite() || self.max_error_rate <= 0.0 {
            return Err(Error::config(
                "max_error_rate",
                format!("must be a positive number, got {}", self.max_error_rate),
            ));
        }
        if self.routes.is_empty() {
            return Err(Error::config("routes", "at least one device type is required"));
        }
        for (device_type, address) in &self.routes {
            if device_type.is_empty() {
                return Err(Error::config("routes", "device type must not be empty"));
            }
            if address.trim().is_empty() {
                return Err(Error::config(
                    "routes",
                    format!("endpoint for `{device_type}` must not be empty"),
                ));
            }
        }
        Ok(())
    }
}

fn default_pattern() -> String {
    "/data/appsinstalled/*.tsv.gz".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_max_error_rate() -> f64 {
    0.01
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_routes() -> BTreeMap<String, String> {
    [
        ("idfa", "127.0.0.1:33013"),
        ("gaid", "127.0.0.1:33014"),
        ("adid", "127.0.0.1:33015"),
        ("dvid", "127.0.0.1:33016"),
    ]
    .into_iter()
    .map(|(device, addr)| (device.to_string(), addr.to_string()))
    .collect()
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_max_idle_connections() -> usize {
    8
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_legacy_loader() {
        let config = Config::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.max_error_rate, 0.01);
        assert_eq!(config.queue_capacity, 10_000);
        assert!(!config.dry_run);
        assert_eq!(config.routes.len(), 4);
        assert_eq!(config.routes["idfa"], "127.0.0.1:33013");
        assert_eq!(config.routes["dvid"], "127.0.0.1:33016");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.workers, 8);
        assert_eq!(config.store.io_timeout, Duration::from_secs(3));
        assert_eq!(config.pattern, "/data/appsinstalled/*.tsv.gz");
    }

    #[test]
    fn json_overrides_routes_and_timeouts() {
        let json = r#"{
            "workers": 2,
            "routes": {"idfa": "10.0.0.1:11211", "tablet": "10.0.0.2:11211"},
            "store": {"io_timeout": 10}
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");
        assert_eq!(config.workers, 2);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes["tablet"], "10.0.0.2:11211");
        assert_eq!(config.store.io_timeout, Duration::from_secs(10));
        assert_eq!(config.store.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn from_json_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memc.json");
        std::fs::write(&path, r#"{"dry_run": true, "max_error_rate": 0.05}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.max_error_rate, 0.05);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "workers"));
    }

    #[test]
    fn validate_rejects_out_of_range_error_rate() {
        for rate in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let config = Config {
                max_error_rate: rate,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "rate {rate} should be rejected");
        }
    }

    #[test]
    fn validate_accepts_error_rate_above_one() {
        let config = Config {
            max_error_rate: 5.0,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        // Three errors for every processed line still passes a threshold of 5
        let tally = crate::types::TallySnapshot {
            processed: 1,
            errors: 3,
        };
        assert!(crate::types::Verdict::evaluate(tally, config.max_error_rate).is_success());
    }

    #[test]
    fn validate_rejects_missing_or_blank_routes() {
        let config = Config {
            routes: BTreeMap::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut routes = BTreeMap::new();
        routes.insert("idfa".to_string(), "  ".to_string());
        let config = Config {
            routes,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
