use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Max number of sources one catalogue may declare.
pub const MAX_SOURCES: usize = 3;

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Declared field set per source category.
///
/// Source order is the reconciliation priority order: the first source wins
/// whenever two sources report a non-empty value for the same field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldCatalogue {
    pub name: String,
    #[serde(default = "default_entity_key_column")]
    pub entity_key_column: String,
    /// Command run before and after the data commands.
    #[serde(default = "default_timing_probe")]
    pub timing_probe: String,
    pub sources: Vec<SourceCatalogue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceCatalogue {
    pub tag: String,
    pub command: String,
    pub fields: Vec<String>,
}

fn default_entity_key_column() -> String {
    "ap_name".into()
}

fn default_timing_probe() -> String {
    "show clock".into()
}

impl FieldCatalogue {
    /// Built-in catalogue for IOS-XE wireless controllers.
    pub fn wireless_default() -> Self {
        fn source(tag: &str, command: &str, fields: &[&str]) -> SourceCatalogue {
            SourceCatalogue {
                tag: tag.into(),
                command: command.into(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            }
        }

        Self {
            name: "wireless-controller".into(),
            entity_key_column: default_entity_key_column(),
            timing_probe: default_timing_probe(),
            sources: vec![
                source(
                    "ap_summary",
                    "show ap summary",
                    &[
                        "slots",
                        "ap_model",
                        "mac_address",
                        "radio_mac",
                        "location",
                        "country",
                        "regulatory_domain",
                        "ip_address",
                        "state",
                    ],
                ),
                source(
                    "cdp_neighbors",
                    "show ap cdp neighbors",
                    &["neighbor_name", "neighbor_ip", "neighbor_port"],
                ),
                source(
                    "meraki_monitoring",
                    "show ap meraki monitoring summary",
                    &[
                        "ap_model",
                        "radio_mac",
                        "mac_address",
                        "serial_number",
                        "cloud_id",
                        "meraki_status",
                    ],
                ),
            ],
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let catalogue: FieldCatalogue =
            toml::from_str(input).map_err(|e| ReconError::CatalogueParse(e.to_string()))?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.entity_key_column.trim().is_empty() {
            return Err(ReconError::CatalogueValidation(
                "entity_key_column must not be empty".into(),
            ));
        }

        if self.timing_probe.trim().is_empty() {
            return Err(ReconError::CatalogueValidation(
                "timing_probe must not be empty".into(),
            ));
        }

        if self.sources.is_empty() || self.sources.len() > MAX_SOURCES {
            return Err(ReconError::CatalogueValidation(format!(
                "expected 1 to {MAX_SOURCES} sources, found {}",
                self.sources.len()
            )));
        }

        let mut tags = HashSet::new();
        for source in &self.sources {
            if source.tag.trim().is_empty() {
                return Err(ReconError::CatalogueValidation(
                    "source tag must not be empty".into(),
                ));
            }
            if !tags.insert(source.tag.as_str()) {
                return Err(ReconError::CatalogueValidation(format!(
                    "duplicate source tag '{}'",
                    source.tag
                )));
            }
            if source.command.trim().is_empty() {
                return Err(ReconError::CatalogueValidation(format!(
                    "source '{}': command must not be empty",
                    source.tag
                )));
            }

            let mut fields = HashSet::new();
            for field in &source.fields {
                if field.trim().is_empty() {
                    return Err(ReconError::CatalogueValidation(format!(
                        "source '{}': empty field name",
                        source.tag
                    )));
                }
                if *field == self.entity_key_column {
                    return Err(ReconError::CatalogueValidation(format!(
                        "source '{}': field '{field}' collides with the entity key column",
                        source.tag
                    )));
                }
                if !fields.insert(field.as_str()) {
                    return Err(ReconError::CatalogueValidation(format!(
                        "source '{}': duplicate field '{field}'",
                        source.tag
                    )));
                }
            }
        }

        Ok(())
    }

    /// Data commands in priority order.
    pub fn commands(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.command.as_str()).collect()
    }

    /// Column order for every export made with this catalogue.
    ///
    /// A field shared by several sources sits in the group of the first
    /// source that declares it.
    pub fn schema(&self) -> ColumnSchema {
        ColumnSchema::new(
            &self.entity_key_column,
            self.sources.iter().flat_map(|s| s.fields.iter().cloned()),
        )
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    entity_key_column: String,
    columns: Vec<String>,
}

impl ColumnSchema {
    /// Duplicate columns keep their first position.
    pub fn new(entity_key_column: &str, columns: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let columns = columns
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Self {
            entity_key_column: entity_key_column.to_string(),
            columns,
        }
    }

    pub fn entity_key_column(&self) -> &str {
        &self.entity_key_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.iter().any(|c| c == field)
    }

    /// Entity key column followed by the declared columns.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once(self.entity_key_column.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }
}
