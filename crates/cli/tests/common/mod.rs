// Scripted session transport and canned controller output for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use apfleet_cli::session::{Connector, SessionClient, SessionError};

pub const STAMP: &str = "20260106-170010";

pub fn fixed_stamp() -> String {
    STAMP.to_string()
}

// ---------------------------------------------------------------------------
// Fake transport
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Script {
    pub outputs: HashMap<String, String>,
    /// Command that fails with an execution error.
    pub fail_on: Option<String>,
    /// Refuse the connection outright.
    pub connect_error: Option<SessionError>,
}

impl Script {
    pub fn controller(outputs: Vec<(&str, String)>) -> Self {
        Self {
            outputs: outputs
                .into_iter()
                .map(|(c, o)| (c.to_string(), o))
                .collect(),
            ..Self::default()
        }
    }

    pub fn unreachable(error: SessionError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, command: &str) -> Self {
        self.fail_on = Some(command.to_string());
        self
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub scripts: HashMap<String, Script>,
}

impl FakeConnector {
    pub fn with(mut self, device_id: &str, script: Script) -> Self {
        self.scripts.insert(device_id.to_string(), script);
        self
    }
}

impl Connector for FakeConnector {
    type Client = FakeClient;

    fn connect(&self, device_id: &str) -> Result<FakeClient, SessionError> {
        let script = self
            .scripts
            .get(device_id)
            .cloned()
            .ok_or_else(|| SessionError::ConnectionFailed(format!("unknown host {device_id}")))?;
        if let Some(err) = script.connect_error {
            return Err(err);
        }
        Ok(FakeClient {
            prompt: format!("{device_id}#"),
            script,
            closed: false,
        })
    }
}

pub struct FakeClient {
    prompt: String,
    script: Script,
    closed: bool,
}

impl SessionClient for FakeClient {
    fn execute(&mut self, command: &str) -> Result<String, SessionError> {
        if self.closed {
            return Err(SessionError::ConnectionClosed);
        }
        if self.script.fail_on.as_deref() == Some(command) {
            return Err(SessionError::Execution {
                command: command.to_string(),
                message: "no prompt within 120s".into(),
            });
        }
        Ok(self.script.outputs.get(command).cloned().unwrap_or_default())
    }

    fn prompt(&self) -> Option<&str> {
        Some(&self.prompt)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ---------------------------------------------------------------------------
// Canned output
// ---------------------------------------------------------------------------

pub fn clock(time: &str) -> String {
    format!("*{time}.123 UTC Tue Jan 6 2026")
}

pub fn ap_summary(rows: &[&str]) -> String {
    let mut lines = vec![
        format!("Number of APs: {}", rows.len()),
        String::new(),
        "CC = Country Code".into(),
        "RD = Regulatory Domain".into(),
        String::new(),
        "AP Name                          Slots AP Model             Ethernet MAC   Radio MAC      CC   RD   IP Address                                State        Location".into(),
        "-".repeat(168),
    ];
    lines.extend(rows.iter().map(|r| r.to_string()));
    lines.join("\n")
}

pub fn cdp_neighbors(rows: &[&str]) -> String {
    let mut lines = vec![
        format!("Number of neighbors: {}", rows.len()),
        String::new(),
        "AP Name                          AP IP                                     Neighbor Name      Neighbor Port".into(),
        "-".repeat(109),
    ];
    lines.extend(rows.iter().map(|r| r.to_string()));
    lines.join("\n")
}

pub fn meraki_monitoring(rows: &[&str]) -> String {
    let mut lines = vec![
        "Meraki Monitoring                : Enabled".to_string(),
        format!("Number of Supported APs          : {}", rows.len()),
        String::new(),
        "AP Name                          AP Model             Radio MAC      MAC Address    AP Serial Number      Cloud ID            Status".into(),
        "-".repeat(137),
    ];
    lines.extend(rows.iter().map(|r| r.to_string()));
    lines.join("\n")
}

/// Controller with two APs seen by all three sources and one only by Meraki.
pub fn ogden_controller() -> Script {
    Script::controller(vec![
        ("show clock", clock("17:00:10")),
        (
            "show ap summary",
            ap_summary(&[
                "ogd-ap-101                       3     C9136I-B             a4b2.3c4d.5e6f 0c75.bd11.2200 US   -B   10.20.30.41                               Registered   Bldg 4 Floor 2",
                "ogd-ap-102                       2     C9120AXI-B           a4b2.3c4d.6f70 0c75.bd11.3300 US   -B   10.20.30.42                               Registered   Lobby",
            ]),
        ),
        (
            "show ap cdp neighbors",
            cdp_neighbors(&[
                "ogd-ap-101                       10.20.30.41                               ogd-sw-01          TenGigabitEthernet1/0/1",
                "ogd-ap-102                       10.20.30.42                               ogd-sw-01          TenGigabitEthernet1/0/2",
            ]),
        ),
        (
            "show ap meraki monitoring summary",
            meraki_monitoring(&[
                "ogd-ap-101                       C9136I-B             0c75.bd11.2200 a4b2.3c4d.5e6f FJC2533L0XY           Q5AB-CDEF-GHJK      Registered",
                "ogd-ap-199                       C9120AXI-B           0c75.bd11.9900 a4b2.3c4d.9a99 FGL2345A1BC           N/A                 Not Registered",
            ]),
        ),
    ])
}

/// Smaller controller with a single AP.
pub fn provo_controller() -> Script {
    Script::controller(vec![
        ("show clock", clock("17:01:00")),
        (
            "show ap summary",
            ap_summary(&[
                "prv-ap-001                       2     C9130AXI-B           b4b2.3c4d.0001 1c75.bd11.0001 US   -B   10.40.0.11                                Registered   Lab",
            ]),
        ),
        ("show ap cdp neighbors", cdp_neighbors(&[])),
        ("show ap meraki monitoring summary", meraki_monitoring(&[])),
    ])
}
