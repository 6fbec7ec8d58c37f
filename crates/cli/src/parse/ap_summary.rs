//! `show ap summary`.
//!
//! Two layouts are in the field. Current releases print CC/RD columns and
//! put Location last; older ones print Location and Country between the
//! radio MAC and the IP address. The header line tells them apart.

use std::sync::LazyLock;

use apfleet_recon::StructuredRecord;
use regex::Regex;

use super::{table_body, MAC};

static CURRENT_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<ap_name>\S+)\s+(?P<slots>\d+)\s+(?P<ap_model>\S+)\s+(?P<mac_address>{MAC})\s+(?P<radio_mac>{MAC})\s+(?P<country>\S+)\s+(?P<regulatory_domain>\S+)\s+(?P<ip_address>[0-9a-fA-F.:]+)\s+(?P<state>\S+)(?:\s+(?P<location>.*?))?\s*$"
    ))
    .unwrap()
});

static LEGACY_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<ap_name>\S+)\s+(?P<slots>\d+)\s+(?P<ap_model>\S+)\s+(?P<mac_address>{MAC})\s+(?P<radio_mac>{MAC})\s+(?P<location>.*?)\s+(?P<country>\S+)\s+(?P<ip_address>\d{{1,3}}(?:\.\d{{1,3}}){{3}}|[0-9a-fA-F]*:[0-9a-fA-F:]+)\s+(?P<state>\S+)\s*$"
    ))
    .unwrap()
});

const FIELDS: [&str; 9] = [
    "slots",
    "ap_model",
    "mac_address",
    "radio_mac",
    "location",
    "country",
    "regulatory_domain",
    "ip_address",
    "state",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Current,
    Legacy,
}

fn detect_layout(header: &str) -> Layout {
    let columns: Vec<&str> = header.split_whitespace().collect();
    if columns.contains(&"CC") || columns.contains(&"RD") {
        Layout::Current
    } else {
        Layout::Legacy
    }
}

pub(super) fn parse(source_tag: &str, output: &str) -> Option<Vec<StructuredRecord>> {
    let table = table_body(output, |l| l.starts_with("AP Name") && l.contains("Slots"));
    let has_header = table.is_some();
    let (layouts, body): (Vec<Layout>, Vec<&str>) = match table {
        Some((header, body)) => (vec![detect_layout(header)], body),
        None => (vec![Layout::Current, Layout::Legacy], output.lines().collect()),
    };

    let records: Vec<StructuredRecord> = body
        .iter()
        .filter_map(|line| {
            layouts
                .iter()
                .find_map(|layout| parse_row(source_tag, line.trim_end(), *layout))
        })
        .collect();

    if !has_header && records.is_empty() {
        return None;
    }
    Some(records)
}

fn parse_row(source_tag: &str, line: &str, layout: Layout) -> Option<StructuredRecord> {
    let re = match layout {
        Layout::Current => &*CURRENT_ROW,
        Layout::Legacy => &*LEGACY_ROW,
    };
    let caps = re.captures(line)?;

    let mut record = StructuredRecord::new(source_tag, &caps["ap_name"]);
    for field in FIELDS {
        let value = caps.name(field).map(|m| m.as_str().trim()).unwrap_or("");
        record.set(field, value);
    }
    Some(record)
}
