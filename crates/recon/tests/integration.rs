use std::fs;

use apfleet_recon::{
    export_table, reconcile, table_file_name, ColumnSchema, ExportOptions, FieldCatalogue,
    SourceRecords, StructuredRecord,
};

fn rec(tag: &str, key: &str, fields: &[(&str, &str)]) -> StructuredRecord {
    fields
        .iter()
        .fold(StructuredRecord::new(tag, key), |r, (k, v)| r.with_field(*k, *v))
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn three_source_scenario() {
    let schema = ColumnSchema::new("ap_name", ["x", "y"].iter().map(|s| s.to_string()));
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

    let out = reconcile(&sources, &schema);

    assert_eq!(out.records.len(), 2);
    assert_eq!(out.records[0].entity_key, "ap1");
    assert_eq!(out.records[0].get("x"), "1");
    assert_eq!(out.records[0].get("y"), "2");
    assert_eq!(out.records[1].entity_key, "ap2");
    assert_eq!(out.records[1].get("x"), "3");
    assert_eq!(out.records[1].get("y"), "");
}

#[test]
fn wireless_catalogue_resolves_shared_mac_fields() {
    let catalogue = FieldCatalogue::wireless_default();
    let schema = catalogue.schema();
    let sources = vec![
        SourceRecords::new(
            "ap_summary",
            vec![rec(
                "ap_summary",
                "AP-Lobby-01",
                &[
                    ("ap_model", "C9120AXI-B"),
                    ("mac_address", "a4b2.3c4d.5e6f"),
                    ("radio_mac", "0c75.bd11.2200"),
                ],
            )],
        ),
        SourceRecords::new(
            "cdp_neighbors",
            vec![rec(
                "cdp_neighbors",
                "AP-Lobby-01",
                &[("neighbor_name", "sw-access-01"), ("neighbor_port", "Gi1/0/12")],
            )],
        ),
        SourceRecords::new(
            "meraki_monitoring",
            vec![
                rec(
                    "meraki_monitoring",
                    "AP-Lobby-01",
                    &[("radio_mac", ""), ("serial_number", "FGL2231A0BC")],
                ),
                rec(
                    "meraki_monitoring",
                    "AP-Dock-07",
                    &[("mac_address", "a4b2.3c4d.9999"), ("meraki_status", "Not Registered")],
                ),
            ],
        ),
    ];

    let out = reconcile(&sources, &schema);

    assert_eq!(out.records.len(), 2);
    let lobby = &out.records[0];
    assert_eq!(lobby.get("radio_mac"), "0c75.bd11.2200");
    assert_eq!(lobby.get("neighbor_name"), "sw-access-01");
    assert_eq!(lobby.get("serial_number"), "FGL2231A0BC");
    let dock = &out.records[1];
    assert_eq!(dock.entity_key, "AP-Dock-07");
    assert_eq!(dock.get("mac_address"), "a4b2.3c4d.9999");
    assert_eq!(dock.get("ap_model"), "");
}

#[test]
fn column_order_stable_across_data_completeness() {
    let catalogue = FieldCatalogue::wireless_default();
    let schema = catalogue.schema();
    let dir = tempfile::tempdir().unwrap();

    let full = vec![
        SourceRecords::new("ap_summary", vec![rec("ap_summary", "ap1", &[("state", "Registered")])]),
        SourceRecords::new("cdp_neighbors", vec![rec("cdp_neighbors", "ap1", &[("neighbor_ip", "10.0.0.1")])]),
        SourceRecords::new("meraki_monitoring", vec![rec("meraki_monitoring", "ap1", &[("cloud_id", "Q2XX")])]),
    ];
    let sparse = vec![
        SourceRecords::empty("ap_summary"),
        SourceRecords::empty("cdp_neighbors"),
        SourceRecords::new("meraki_monitoring", vec![rec("meraki_monitoring", "ap9", &[])]),
    ];

    let full_path = dir.path().join(table_file_name("20260106-170010", "wlc-a", "csv"));
    let sparse_path = dir.path().join(table_file_name("20260106-170011", "wlc-a", "csv"));
    export_table(&full_path, &reconcile(&full, &schema).records, &schema, &ExportOptions::default()).unwrap();
    export_table(&sparse_path, &reconcile(&sparse, &schema).records, &schema, &ExportOptions::default()).unwrap();

    let full_text = fs::read_to_string(&full_path).unwrap();
    let sparse_text = fs::read_to_string(&sparse_path).unwrap();
    assert_eq!(full_text.lines().next(), sparse_text.lines().next());
    assert_eq!(full_text.lines().count(), 2);
    assert_eq!(sparse_text.lines().nth(1), Some("ap9,,,,,,,,,,,,,,,"));
}

#[test]
fn custom_catalogue_drives_export() {
    let catalogue = FieldCatalogue::from_toml(
        r#"
name = "minimal"
entity_key_column = "name"
timing_probe = "show clock"

[[sources]]
tag = "summary"
command = "show ap summary"
fields = ["ip_address"]
"#,
    )
    .unwrap();
    let schema = catalogue.schema();
    let out = reconcile(
        &[SourceRecords::new(
            "summary",
            vec![rec("summary", "ap1", &[("ip_address", "10.1.1.1"), ("state", "Registered")])],
        )],
        &schema,
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    export_table(&path, &out.records, &schema, &ExportOptions::default()).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "name,ip_address\nap1,10.1.1.1\n");
    assert_eq!(out.undeclared_fields, vec!["state".to_string()]);
}
