use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::catalogue::ColumnSchema;
use crate::model::{Reconciliation, SourceCount, SourceRecords, StructuredRecord, UnifiedRecord};

/// Merge per-source records into one row per entity.
///
/// `sources` must be in priority order. For every schema column the first
/// non-empty value found scanning sources in that order wins; a column no
/// source fills stays `""`. Rows come out in first-seen key order. Records
/// whose entity key is blank are dropped and counted in `malformed`.
pub fn reconcile(sources: &[SourceRecords], schema: &ColumnSchema) -> Reconciliation {
    let mut order: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut indexed: Vec<HashMap<&str, Vec<&StructuredRecord>>> = Vec::with_capacity(sources.len());
    let mut source_counts = Vec::with_capacity(sources.len());
    let mut undeclared: BTreeSet<&str> = BTreeSet::new();
    let mut malformed = 0;

    for source in sources {
        let mut by_key: HashMap<&str, Vec<&StructuredRecord>> = HashMap::new();
        let mut accepted = 0;

        for record in &source.records {
            let key = record.entity_key.trim();
            if key.is_empty() {
                log::warn!("source '{}': dropping record with empty entity key", source.tag);
                malformed += 1;
                continue;
            }
            accepted += 1;

            for name in record.fields.keys() {
                if !schema.contains(name) && name != schema.entity_key_column() {
                    undeclared.insert(name);
                }
            }

            if seen.insert(key) {
                order.push(key);
            }
            by_key.entry(key).or_default().push(record);
        }

        source_counts.push(SourceCount {
            tag: source.tag.clone(),
            records: accepted,
        });
        indexed.push(by_key);
    }

    if !undeclared.is_empty() {
        log::debug!("ignoring undeclared fields: {:?}", undeclared);
    }

    let records = order
        .iter()
        .map(|key| {
            let fields: BTreeMap<String, String> = schema
                .columns()
                .iter()
                .map(|column| (column.clone(), resolve(&indexed, key, column)))
                .collect();
            let contributors = sources
                .iter()
                .zip(&indexed)
                .filter(|(_, by_key)| by_key.contains_key(key))
                .map(|(source, _)| source.tag.clone())
                .collect();
            UnifiedRecord {
                entity_key: key.to_string(),
                fields,
                sources: contributors,
            }
        })
        .collect();

    Reconciliation {
        records,
        malformed,
        source_counts,
        undeclared_fields: undeclared.into_iter().map(String::from).collect(),
    }
}

/// First non-empty value for (key, column), scanning sources in priority
/// order and, within one source, records in input order.
fn resolve(indexed: &[HashMap<&str, Vec<&StructuredRecord>>], key: &str, column: &str) -> String {
    indexed
        .iter()
        .filter_map(|by_key| by_key.get(key))
        .flatten()
        .filter_map(|record| record.fields.get(column))
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(columns: &[&str]) -> ColumnSchema {
        ColumnSchema::new("ap_name", columns.iter().map(|c| c.to_string()))
    }

    fn rec(tag: &str, key: &str, fields: &[(&str, &str)]) -> StructuredRecord {
        fields
            .iter()
            .fold(StructuredRecord::new(tag, key), |r, (k, v)| r.with_field(*k, *v))
    }

    #[test]
    fn merges_across_sources() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap1", &[("x", "1")])]),
            SourceRecords::new(
                "b",
                vec![
                    rec("b", "ap1", &[("x", ""), ("y", "2")]),
                    rec("b", "ap2", &[("x", "3")]),
                ],
            ),
            SourceRecords::empty("c"),
        ];
        let out = reconcile(&sources, &schema(&["x", "y"]));

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].entity_key, "ap1");
        assert_eq!(out.records[0].get("x"), "1");
        assert_eq!(out.records[0].get("y"), "2");
        assert_eq!(out.records[1].entity_key, "ap2");
        assert_eq!(out.records[1].get("x"), "3");
        assert_eq!(out.records[1].get("y"), "");
        assert_eq!(out.malformed, 0);
    }

    #[test]
    fn later_blank_never_overwrites_populated_value() {
        let sources = vec![
            SourceRecords::new("summary", vec![rec("summary", "ap1", &[("radio_mac", "0c75.bd11.2200")])]),
            SourceRecords::new("meraki", vec![rec("meraki", "ap1", &[("radio_mac", "")])]),
        ];
        let out = reconcile(&sources, &schema(&["radio_mac"]));
        assert_eq!(out.records[0].get("radio_mac"), "0c75.bd11.2200");
    }

    #[test]
    fn lower_priority_fills_gap() {
        let sources = vec![
            SourceRecords::new("summary", vec![rec("summary", "ap1", &[("mac_address", "")])]),
            SourceRecords::new("meraki", vec![rec("meraki", "ap1", &[("mac_address", "a4b2.3c4d.5e6f")])]),
        ];
        let out = reconcile(&sources, &schema(&["mac_address"]));
        assert_eq!(out.records[0].get("mac_address"), "a4b2.3c4d.5e6f");
    }

    #[test]
    fn first_seen_order_follows_priority() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap3", &[]), rec("a", "ap1", &[])]),
            SourceRecords::new("b", vec![rec("b", "ap2", &[]), rec("b", "ap3", &[])]),
            SourceRecords::new("c", vec![rec("c", "ap4", &[])]),
        ];
        let out = reconcile(&sources, &schema(&["x"]));
        let keys: Vec<&str> = out.records.iter().map(|r| r.entity_key.as_str()).collect();
        assert_eq!(keys, vec!["ap3", "ap1", "ap2", "ap4"]);
    }

    #[test]
    fn entity_only_in_last_source_kept() {
        let sources = vec![
            SourceRecords::empty("a"),
            SourceRecords::empty("b"),
            SourceRecords::new("c", vec![rec("c", "lonely", &[("serial_number", "FGL1")])]),
        ];
        let out = reconcile(&sources, &schema(&["ap_model", "serial_number"]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].get("ap_model"), "");
        assert_eq!(out.records[0].get("serial_number"), "FGL1");
    }

    #[test]
    fn empty_keys_dropped_and_counted() {
        let sources = vec![SourceRecords::new(
            "a",
            vec![rec("a", "", &[("x", "1")]), rec("a", "   ", &[]), rec("a", "ap1", &[])],
        )];
        let out = reconcile(&sources, &schema(&["x"]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.malformed, 2);
        assert_eq!(out.source_counts[0].records, 1);
    }

    #[test]
    fn keys_compared_trimmed() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap1 ", &[("x", "1")])]),
            SourceRecords::new("b", vec![rec("b", "ap1", &[("y", "2")])]),
        ];
        let out = reconcile(&sources, &schema(&["x", "y"]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].entity_key, "ap1");
        assert_eq!(out.records[0].get("y"), "2");
    }

    #[test]
    fn duplicate_rows_within_source_scanned_in_order() {
        let sources = vec![SourceRecords::new(
            "cdp",
            vec![
                rec("cdp", "ap1", &[("neighbor_name", "sw1"), ("neighbor_ip", "")]),
                rec("cdp", "ap1", &[("neighbor_name", "sw2"), ("neighbor_ip", "10.0.0.2")]),
            ],
        )];
        let out = reconcile(&sources, &schema(&["neighbor_name", "neighbor_ip"]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].get("neighbor_name"), "sw1");
        assert_eq!(out.records[0].get("neighbor_ip"), "10.0.0.2");
    }

    #[test]
    fn undeclared_fields_reported_not_exported() {
        let sources = vec![SourceRecords::new(
            "a",
            vec![rec("a", "ap1", &[("x", "1"), ("debug_blob", "zzz")])],
        )];
        let out = reconcile(&sources, &schema(&["x"]));
        assert_eq!(out.undeclared_fields, vec!["debug_blob".to_string()]);
        assert!(!out.records[0].fields.contains_key("debug_blob"));
    }

    #[test]
    fn every_record_carries_every_column() {
        let sources = vec![SourceRecords::new("a", vec![rec("a", "ap1", &[])])];
        let out = reconcile(&sources, &schema(&["x", "y", "z"]));
        assert_eq!(out.records[0].fields.len(), 3);
    }

    #[test]
    fn idempotent_on_own_output() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap1", &[("x", "1")])]),
            SourceRecords::new("b", vec![rec("b", "ap2", &[("y", "2")])]),
        ];
        let s = schema(&["x", "y"]);
        let first = reconcile(&sources, &s);
        let again = reconcile(&[first.as_source("merged"), first.as_source("merged")], &s);
        for (a, b) in first.records.iter().zip(&again.records) {
            assert_eq!(a.entity_key, b.entity_key);
            assert_eq!(a.fields, b.fields);
        }
        assert_eq!(first.records.len(), again.records.len());
    }

    #[test]
    fn sources_list_contributors_in_priority_order() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap1", &[("x", "1")]), rec("a", "ap2", &[])]),
            SourceRecords::new("b", vec![rec("b", "ap2", &[("x", "")])]),
            SourceRecords::new("c", vec![rec("c", "ap1", &[("y", "2")])]),
        ];
        let out = reconcile(&sources, &schema(&["x", "y"]));
        assert_eq!(out.records[0].sources, vec!["a", "c"]);
        assert_eq!(out.records[1].sources, vec!["a", "b"]);
    }

    #[test]
    fn blank_key_records_do_not_count_as_contributors() {
        let sources = vec![
            SourceRecords::new("a", vec![rec("a", "ap1", &[])]),
            SourceRecords::new("b", vec![rec("b", " ", &[("x", "1")])]),
        ];
        let out = reconcile(&sources, &schema(&["x"]));
        assert_eq!(out.records[0].sources, vec!["a"]);
    }
}
