use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::naming::ResourceNameGenerator;
use crate::types::{
    AccountSpec, CollectionSpec, ConsistencyLevel, ConsistencyPolicy, DatabaseSpec, PolicyError,
    ReplicaLocation, ResourceNames,
};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cosmos-provision.toml";

/// Minimum throughput the provider accepts for a dedicated collection
const MIN_THROUGHPUT: u32 = 400;

/// Shortest random suffix that still keeps repeated runs from colliding
const MIN_SUFFIX_LENGTH: usize = 5;

/// Main configuration structure for cosmos-provision
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisionConfig {
    /// Management plane settings
    pub azure: AzureConfig,
    /// Database account shape
    pub account: AccountConfig,
    /// Database and collection created inside the account
    pub data: DataConfig,
    /// Resource naming
    pub naming: NamingConfig,
    /// Long-running operation polling
    pub polling: PollingConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AzureConfig {
    /// Region the resource group and account are created in
    pub location: String,
    /// OAuth2 authority used for the client-credentials grant
    pub authority_host: String,
    /// Resource Manager base URL
    pub management_endpoint: String,
    /// api-version for resource group calls
    pub resources_api_version: String,
    /// api-version for Microsoft.DocumentDB calls
    pub cosmos_api_version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsistencyConfig {
    pub level: ConsistencyLevel,
    pub max_staleness_prefix: u64,
    pub max_interval_in_seconds: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Account kind, e.g. GlobalDocumentDB or MongoDB
    pub kind: String,
    pub consistency: ConsistencyConfig,
    /// IP addresses or CIDR ranges allowed through the account firewall
    #[serde(default)]
    pub ip_rules: Vec<String>,
    pub virtual_network_filter_enabled: bool,
    pub automatic_failover_enabled: bool,
    pub multiple_write_locations_enabled: bool,
    /// Replica regions; priority 0 is the write region
    pub locations: Vec<ReplicaLocation>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    pub database_id: String,
    pub collection_id: String,
    /// Provisioned throughput in request units
    pub throughput: u32,
    pub partition_key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamingConfig {
    pub resource_group_prefix: String,
    pub account_prefix: String,
    pub suffix_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// Upper bound on waiting for a single long-running operation
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid consistency policy: {0}")]
    Consistency(#[from] PolicyError),
    #[error("throughput must be at least 400 RU, got {0}")]
    ThroughputTooLow(u32),
    #[error("at least one replica location is required")]
    NoLocations,
    #[error("exactly one replica location must have failover priority 0, found {0}")]
    WriteRegionCount(usize),
    #[error("duplicate failover priority {0}")]
    DuplicatePriority(u32),
    #[error("polling interval must be at least one second")]
    ZeroPollInterval,
    #[error("name suffix must be at least 5 characters, got {0}")]
    SuffixTooShort(usize),
    #[error("write region '{write_region}' (failover priority 0) does not match azure.location '{location}'")]
    WriteRegionMismatch { location: String, write_region: String },
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        let consistency = ConsistencyPolicy::default();
        Self {
            azure: AzureConfig {
                location: "westus".to_string(),
                authority_host: "https://login.microsoftonline.com".to_string(),
                management_endpoint: "https://management.azure.com".to_string(),
                resources_api_version: "2021-04-01".to_string(),
                cosmos_api_version: "2023-04-15".to_string(),
            },
            account: AccountConfig {
                kind: "GlobalDocumentDB".to_string(),
                consistency: ConsistencyConfig {
                    level: consistency.level(),
                    max_staleness_prefix: consistency.max_staleness_prefix(),
                    max_interval_in_seconds: consistency.max_interval_in_seconds(),
                },
                ip_rules: Vec::new(),
                virtual_network_filter_enabled: false,
                automatic_failover_enabled: false,
                multiple_write_locations_enabled: true,
                locations: vec![
                    ReplicaLocation::new("westus", 0),
                    ReplicaLocation::new("eastus", 1),
                ],
            },
            data: DataConfig {
                database_id: "sampledb".to_string(),
                collection_id: "samplecoll".to_string(),
                throughput: 4000,
                partition_key_path: "/id".to_string(),
            },
            naming: NamingConfig {
                resource_group_prefix: "rg-cosmos-".to_string(),
                account_prefix: "docdb".to_string(),
                suffix_length: 10,
            },
            polling: PollingConfig {
                interval_seconds: 10,
                timeout_seconds: 1800, // 30 minutes, account creation is slow
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (explicit path, or cosmos-provision.toml if present)
    /// 3. Environment variables (prefixed with COSMOS_PROVISION__)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&ProvisionConfig::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("COSMOS_PROVISION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("account.ip_rules"),
        );

        let config: ProvisionConfig = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists. Returns whether one was loaded.
    pub fn load_env_file() -> Result<bool> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.consistency_policy()?;

        if self.data.throughput < MIN_THROUGHPUT {
            return Err(ConfigError::ThroughputTooLow(self.data.throughput));
        }

        let locations = &self.account.locations;
        if locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }
        let write_regions: Vec<&ReplicaLocation> =
            locations.iter().filter(|l| l.failover_priority == 0).collect();
        if write_regions.len() != 1 {
            return Err(ConfigError::WriteRegionCount(write_regions.len()));
        }
        if write_regions[0].name != self.azure.location {
            return Err(ConfigError::WriteRegionMismatch {
                location: self.azure.location.clone(),
                write_region: write_regions[0].name.clone(),
            });
        }
        let mut priorities: Vec<u32> = locations.iter().map(|l| l.failover_priority).collect();
        priorities.sort_unstable();
        if let Some(pair) = priorities.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicatePriority(pair[0]));
        }

        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.naming.suffix_length < MIN_SUFFIX_LENGTH {
            return Err(ConfigError::SuffixTooShort(self.naming.suffix_length));
        }
        Ok(())
    }

    /// Move the resource group and the write region to `location`.
    /// A read replica already in that region is dropped.
    pub fn set_location(&mut self, location: &str) {
        self.azure.location = location.to_string();
        self.account
            .locations
            .retain(|l| l.failover_priority == 0 || l.name != location);
        if let Some(write) = self.account.locations.iter_mut().find(|l| l.failover_priority == 0) {
            write.name = location.to_string();
        }
    }

    pub fn consistency_policy(&self) -> Result<ConsistencyPolicy, PolicyError> {
        let c = &self.account.consistency;
        ConsistencyPolicy::new(c.level, c.max_staleness_prefix, c.max_interval_in_seconds)
    }

    pub fn account_spec(&self, names: &ResourceNames) -> Result<AccountSpec, ConfigError> {
        Ok(AccountSpec {
            name: names.account.clone(),
            location: self.azure.location.clone(),
            kind: self.account.kind.clone(),
            consistency: self.consistency_policy()?,
            ip_rules: self.account.ip_rules.clone(),
            virtual_network_filter_enabled: self.account.virtual_network_filter_enabled,
            automatic_failover_enabled: self.account.automatic_failover_enabled,
            multiple_write_locations_enabled: self.account.multiple_write_locations_enabled,
            locations: self.account.locations.clone(),
        })
    }

    pub fn database_spec(&self) -> DatabaseSpec {
        DatabaseSpec::new(&self.data.database_id)
    }

    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            id: self.data.collection_id.clone(),
            throughput: self.data.throughput,
            partition_key_path: self.data.partition_key_path.clone(),
        }
    }

    pub fn name_generator(&self) -> ResourceNameGenerator {
        ResourceNameGenerator::new(
            &self.naming.resource_group_prefix,
            &self.naming.account_prefix,
            self.naming.suffix_length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProvisionConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.data.throughput, 4000);
        assert!(!config.account.automatic_failover_enabled);
        assert!(config.account.multiple_write_locations_enabled);
    }

    #[test]
    fn test_rejects_low_throughput() {
        let mut config = ProvisionConfig::default();
        config.data.throughput = 100;
        assert_eq!(config.validate(), Err(ConfigError::ThroughputTooLow(100)));
    }

    #[test]
    fn test_requires_single_write_region() {
        let mut config = ProvisionConfig::default();
        config.account.locations = vec![
            ReplicaLocation::new("westus", 1),
            ReplicaLocation::new("eastus", 2),
        ];
        assert_eq!(config.validate(), Err(ConfigError::WriteRegionCount(0)));

        config.account.locations = vec![
            ReplicaLocation::new("westus", 0),
            ReplicaLocation::new("eastus", 1),
            ReplicaLocation::new("northeurope", 1),
        ];
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePriority(1)));

        config.account.locations.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoLocations));
    }

    #[test]
    fn test_rejects_zero_staleness_prefix() {
        let mut config = ProvisionConfig::default();
        config.account.consistency.max_staleness_prefix = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Consistency(PolicyError::StalenessPrefixTooSmall(0)))
        );
    }

    #[test]
    fn test_account_spec_carries_configured_shape() {
        let config = ProvisionConfig::default();
        let names = ResourceNames {
            resource_group: "rg-cosmos-abc".to_string(),
            account: "docdbabc".to_string(),
        };
        let spec = config.account_spec(&names).unwrap();
        assert_eq!(spec.name, "docdbabc");
        assert_eq!(spec.location, "westus");
        assert_eq!(spec.consistency.max_staleness_prefix(), 100_000);
        assert_eq!(spec.consistency.max_interval_in_seconds(), 300);
        assert_eq!(spec.locations.len(), 2);
    }

    #[test]
    fn test_load_overrides_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"[data]
throughput = 1000
collection_id = "orders"

[azure]
location = "eastus2"

[[account.locations]]
name = "eastus2"
failover_priority = 0

[[account.locations]]
name = "centralus"
failover_priority = 1"#
        )
        .unwrap();

        let config = ProvisionConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.data.throughput, 1000);
        assert_eq!(config.data.collection_id, "orders");
        assert_eq!(config.azure.location, "eastus2");
        assert_eq!(config.account.locations[0].name, "eastus2");
        // Untouched sections keep their defaults
        assert_eq!(config.data.database_id, "sampledb");
        assert_eq!(config.polling.interval_seconds, 10);
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ProvisionConfig::default();
        config.naming.account_prefix = "saved".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = ProvisionConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.naming.account_prefix, "saved");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        // The crate root carries no cosmos-provision.toml
        let config = ProvisionConfig::load(None).unwrap();
        assert!(config.account.ip_rules.is_empty());
        assert_eq!(config.naming.suffix_length, 10);
    }

    #[test]
    fn test_partial_file_keeps_empty_ip_rules() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[naming]\nsuffix_length = 8").unwrap();

        let config = ProvisionConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.naming.suffix_length, 8);
        assert!(config.account.ip_rules.is_empty());
    }

    #[test]
    fn test_rejects_short_name_suffix() {
        let mut config = ProvisionConfig::default();
        config.naming.suffix_length = 0;
        assert_eq!(config.validate(), Err(ConfigError::SuffixTooShort(0)));

        config.naming.suffix_length = 4;
        assert_eq!(config.validate(), Err(ConfigError::SuffixTooShort(4)));

        config.naming.suffix_length = MIN_SUFFIX_LENGTH;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_location_must_match_write_region() {
        let mut config = ProvisionConfig::default();
        config.azure.location = "eastus2".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::WriteRegionMismatch {
                location: "eastus2".to_string(),
                write_region: "westus".to_string(),
            })
        );

        config.set_location("eastus2");
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.account.locations[0].name, "eastus2");
    }
}
