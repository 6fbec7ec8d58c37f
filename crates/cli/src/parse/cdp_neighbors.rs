//! `show ap cdp neighbors`.
//!
//! One row per AP with its neighbor switch and port. Some releases follow a
//! row with `Neighbor IP Count: N` and N indented address lines; the first
//! of those becomes `neighbor_ip`.

use std::sync::LazyLock;

use apfleet_recon::StructuredRecord;
use regex::Regex;

use super::table_body;

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ap_name>\S+)\s+(?P<ap_ip>\d{1,3}(?:\.\d{1,3}){3})\s+(?P<neighbor_name>\S+)\s+(?P<neighbor_port>\S+)(?:\s+(?P<neighbor_ip>\d{1,3}(?:\.\d{1,3}){3}))?$",
    )
    .unwrap()
});

static NEIGHBOR_IP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(?P<ip>\d{1,3}(?:\.\d{1,3}){3}|[0-9a-fA-F]*:[0-9a-fA-F:]+)\s*$").unwrap());

pub(super) fn parse(source_tag: &str, output: &str) -> Option<Vec<StructuredRecord>> {
    let table = table_body(output, |l| l.starts_with("AP Name") && l.contains("Neighbor"));
    let has_header = table.is_some();
    let body: Vec<&str> = match table {
        Some((_, body)) => body,
        None => output.lines().collect(),
    };

    let mut records: Vec<StructuredRecord> = Vec::new();
    for line in body {
        if let Some(caps) = ROW.captures(line.trim()) {
            let neighbor_ip = caps.name("neighbor_ip").map(|m| m.as_str()).unwrap_or("");
            records.push(
                StructuredRecord::new(source_tag, &caps["ap_name"])
                    .with_field("neighbor_name", &caps["neighbor_name"])
                    .with_field("neighbor_ip", neighbor_ip)
                    .with_field("neighbor_port", &caps["neighbor_port"]),
            );
            continue;
        }

        // Indented address under the last row; only the first one is kept.
        if let (Some(caps), Some(last)) = (NEIGHBOR_IP_LINE.captures(line), records.last_mut()) {
            if last.fields.get("neighbor_ip").is_some_and(|ip| ip.is_empty()) {
                last.set("neighbor_ip", &caps["ip"]);
            }
        }
    }

    if !has_header && records.is_empty() {
        return None;
    }
    Some(records)
}
