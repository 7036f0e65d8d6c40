use std::collections::HashSet;

use clap::{Parser, Subcommand, ValueEnum};
use pricebook_core::StoreTable;
use serde::Deserialize;
use thiserror::Error;

use crate::aggregator::ComparisonOptions;

#[derive(Parser, Debug)]
#[command(name = "pricebook", about = "Pricebook - compare grocery prices across stores")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "pricebook.toml")]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Storage backend (overrides config file)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Data directory or database file (overrides config file)
    #[arg(short, long)]
    pub data: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Print every table with totals, cheapest store and basket savings
    Show,
    /// Record a price in a table
    Add {
        /// Table id or label
        #[arg(short, long)]
        table: String,
        product: String,
        store: String,
        price: String,
    },
    /// Remove the first matching product/store entry from a table
    Delete {
        /// Table id or label
        #[arg(short, long)]
        table: String,
        product: String,
        store: String,
    },
    /// Remove every entry from every table
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default)]
    pub comparison: ComparisonOptions,

    #[serde(default = "default_tables")]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Directory for the file backend, database path for SQLite.
    #[serde(default = "default_data_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TableConfig {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one table must be configured")]
    NoTables,
    #[error("duplicate table id: {0}")]
    DuplicateTable(String),
    #[error("table id must be non-empty ASCII letters, digits, '-' or '_': {0:?}")]
    InvalidTableId(String),
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        backend: default_backend(),
        path: default_data_path(),
    }
}

fn default_tables() -> Vec<TableConfig> {
    (1..=4)
        .map(|i| TableConfig {
            id: format!("table{}", i),
            label: format!("Store {}", i),
        })
        .collect()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::File
}

fn default_data_path() -> String {
    "pricebook-data".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: default_logging(),
            storage: default_storage(),
            comparison: ComparisonOptions::default(),
            tables: default_tables(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }
        if let Some(ref data) = cli.data {
            config.storage.path = data.clone();
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tables.is_empty() {
            return Err(ConfigError::NoTables);
        }
        let mut seen = HashSet::new();
        for table in &self.tables {
            let valid = !table.id.is_empty()
                && table.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(ConfigError::InvalidTableId(table.id.clone()));
            }
            if !seen.insert(table.id.as_str()) {
                return Err(ConfigError::DuplicateTable(table.id.clone()));
            }
        }
        Ok(())
    }

    /// Tables in canonical enumeration order.
    pub fn store_tables(&self) -> Vec<StoreTable> {
        self.tables.iter()
            .map(|t| StoreTable::new(&t.id, &t.label))
            .collect()
    }
}
