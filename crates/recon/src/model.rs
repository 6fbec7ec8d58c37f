use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One entity as reported by one command's parsed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    pub source_tag: String,
    pub entity_key: String,
    pub fields: BTreeMap<String, String>,
}

impl StructuredRecord {
    pub fn new(source_tag: impl Into<String>, entity_key: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            entity_key: entity_key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }
}

/// All records produced for one source, in parser order.
#[derive(Debug, Clone, Default)]
pub struct SourceRecords {
    pub tag: String,
    pub records: Vec<StructuredRecord>,
}

impl SourceRecords {
    pub fn new(tag: impl Into<String>, records: Vec<StructuredRecord>) -> Self {
        Self {
            tag: tag.into(),
            records,
        }
    }

    /// A source that contributed nothing (parse failure, command not run).
    pub fn empty(tag: impl Into<String>) -> Self {
        Self::new(tag, Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The merged row for one entity. Holds a value for every schema column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedRecord {
    pub entity_key: String,
    pub fields: BTreeMap<String, String>,
    /// Tags of the sources that reported this entity, in priority order.
    pub sources: Vec<String>,
}

impl UnifiedRecord {
    /// Field value, or `""` when the field was never resolved.
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// Re-express this row as a record of a single source.
    pub fn to_structured(&self, source_tag: &str) -> StructuredRecord {
        StructuredRecord {
            source_tag: source_tag.to_string(),
            entity_key: self.entity_key.clone(),
            fields: self.fields.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub tag: String,
    pub records: usize,
}

/// Result of [`crate::reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// One row per distinct entity key, in first-seen order.
    pub records: Vec<UnifiedRecord>,
    /// Records dropped because their entity key was empty.
    pub malformed: usize,
    /// Accepted records per source, in priority order.
    pub source_counts: Vec<SourceCount>,
    /// Field names seen in the input but not declared in the schema.
    pub undeclared_fields: Vec<String>,
}

impl Reconciliation {
    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    /// The reconciled rows as a single source, e.g. to reconcile them again.
    pub fn as_source(&self, tag: &str) -> SourceRecords {
        SourceRecords::new(
            tag,
            self.records.iter().map(|r| r.to_structured(tag)).collect(),
        )
    }
}
