//! `show ap meraki monitoring summary`.

use std::sync::LazyLock;

use apfleet_recon::StructuredRecord;
use regex::Regex;

use super::{table_body, MAC};

// Status is free text ("Not Registered", "Registered").
static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<ap_name>\S+)\s+(?P<ap_model>\S+)\s+(?P<radio_mac>{MAC})\s+(?P<mac_address>{MAC})\s+(?P<serial_number>\S+)\s+(?P<cloud_id>\S+)\s+(?P<status>\S.*?)\s*$"
    ))
    .unwrap()
});

pub(super) fn parse(source_tag: &str, output: &str) -> Option<Vec<StructuredRecord>> {
    let table = table_body(output, |l| l.starts_with("AP Name") && l.contains("Serial"));
    let has_header = table.is_some();
    let body: Vec<&str> = match table {
        Some((_, body)) => body,
        None => output.lines().collect(),
    };

    let records: Vec<StructuredRecord> = body
        .iter()
        .filter_map(|line| ROW.captures(line.trim()))
        .map(|caps| {
            StructuredRecord::new(source_tag, &caps["ap_name"])
                .with_field("ap_model", &caps["ap_model"])
                .with_field("radio_mac", &caps["radio_mac"])
                .with_field("mac_address", &caps["mac_address"])
                .with_field("serial_number", &caps["serial_number"])
                .with_field("cloud_id", &caps["cloud_id"])
                .with_field("meraki_status", &caps["status"])
        })
        .collect();

    if !has_header && records.is_empty() {
        return None;
    }
    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> String {
        [
            "Meraki Monitoring                : Enabled",
            "Number of Supported APs          : 2",
            "",
            "AP Name                          AP Model             Radio MAC      MAC Address    AP Serial Number      Cloud ID            Status",
            "-----------------------------------------------------------------------------------------------------------------------------------------",
            "ogd-ap-101                       C9136I-B             0c75.bd11.2200 a4b2.3c4d.5e6f FJC2533L0XY           Q5AB-CDEF-GHJK      Registered",
            "ogd-ap-102                       C9120AXI-B           0c75.bd11.3300 a4b2.3c4d.6f70 FGL2345A1BC           N/A                 Not Registered",
        ]
        .join("\n")
    }

    #[test]
    fn parses_rows() {
        let records = parse("meraki_monitoring", &sample_output()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.entity_key, "ogd-ap-101");
        assert_eq!(first.fields["ap_model"], "C9136I-B");
        assert_eq!(first.fields["radio_mac"], "0c75.bd11.2200");
        assert_eq!(first.fields["mac_address"], "a4b2.3c4d.5e6f");
        assert_eq!(first.fields["serial_number"], "FJC2533L0XY");
        assert_eq!(first.fields["cloud_id"], "Q5AB-CDEF-GHJK");
        assert_eq!(first.fields["meraki_status"], "Registered");
    }

    #[test]
    fn status_with_spaces() {
        let records = parse("meraki_monitoring", &sample_output()).unwrap();
        assert_eq!(records[1].fields["cloud_id"], "N/A");
        assert_eq!(records[1].fields["meraki_status"], "Not Registered");
    }

    #[test]
    fn summary_lines_are_not_rows() {
        let output = "Meraki Monitoring                : Disabled\nNumber of Supported APs          : 0\n";
        assert!(parse("meraki_monitoring", output).is_none());
    }
}
