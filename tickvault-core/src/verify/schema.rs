//! Expected column counts per data type.
//!
//! The upstream CSV layouts are hand-maintained constants that drift when the
//! provider adds a column, so the built-in table can be overridden by a TOML
//! file (`schema_table` in the acquisition config):
//!
//! ```toml
//! [aggTrades]
//! spot = 8
//! derivative = 7
//! ```
//!
//! Entries in the file replace the built-in entry of the same data type;
//! every other built-in entry is kept. Option data uses the `derivative` count.

use crate::config::{AcquisitionConfig, AssetClass, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCounts {
    pub spot: usize,
    pub derivative: usize,
}

impl ColumnCounts {
    pub const fn uniform(columns: usize) -> Self {
        Self {
            spot: columns,
            derivative: columns,
        }
    }

    pub fn for_asset_class(&self, asset_class: AssetClass) -> usize {
        if asset_class.is_derivative() {
            self.derivative
        } else {
            self.spot
        }
    }
}

const BUILTIN: &[(&str, ColumnCounts)] = &[
    ("klines", ColumnCounts::uniform(12)),
    ("aggTrades", ColumnCounts { spot: 8, derivative: 7 }),
    ("trades", ColumnCounts { spot: 7, derivative: 6 }),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaTable {
    entries: BTreeMap<String, ColumnCounts>,
}

impl Default for SchemaTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(data_type, counts)| (data_type.to_string(), *counts))
                .collect(),
        }
    }

    /// Built-in table with the entries of `content` laid over it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let overrides: BTreeMap<String, ColumnCounts> =
            toml::from_str(content).map_err(|e| ConfigError::Parse(format!("schema table: {e}")))?;
        let mut table = Self::builtin();
        table.entries.extend(overrides);
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// The table a config asks for: its override file, or the built-in one.
    pub fn for_config(config: &AcquisitionConfig) -> Result<Self, ConfigError> {
        match &config.schema_table {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// `None` for a data type the table knows nothing about.
    pub fn expected_columns(&self, data_type: &str, asset_class: AssetClass) -> Option<usize> {
        self.entries
            .get(data_type)
            .map(|counts| counts.for_asset_class(asset_class))
    }
}
