//! Fleet loop: one device at a time, every failure recorded, never aborted.
//!
//! Per device: connect, run the bookended session, archive the transcript,
//! parse each source, reconcile and export one table. The outcome lands in a
//! [`RunSummary`]; the loop then moves on regardless of what happened.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use apfleet_recon::{
    export_table, reconcile, table_file_name, FieldCatalogue, ReconError, Reconciliation,
    SourceRecords,
};
use chrono::Local;
use serde::Serialize;

use crate::config::RunConfig;
use crate::parse::StructuredParser;
use crate::session::{Connector, Session, SessionClient, SessionRunner};
use crate::transcript::{self, TranscriptBlock};

/// Run timestamp format shared by transcript and table file names.
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn local_stamp() -> String {
    Local::now().format(STAMP_FORMAT).to_string()
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStage {
    Connect,
    Session,
    Export,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStage::Connect => "connect",
            DeviceStage::Session => "session",
            DeviceStage::Export => "export",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceError {
    pub stage: DeviceStage,
    pub message: String,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub device_id: String,
    pub success: bool,
    pub entity_count: usize,
    /// Records dropped for an empty entity key.
    pub malformed: usize,
    pub error: Option<DeviceError>,
    pub duration_secs: f64,
    pub table_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
}

impl RunSummary {
    fn failed(device_id: &str, stage: DeviceStage, message: String) -> Self {
        Self {
            device_id: device_id.to_string(),
            success: false,
            entity_count: 0,
            malformed: 0,
            error: Some(DeviceError { stage, message }),
            duration_secs: 0.0,
            table_path: None,
            transcript_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub devices: Vec<RunSummary>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_entities: usize,
    pub malformed: usize,
}

impl RunReport {
    pub fn from_summaries(devices: Vec<RunSummary>) -> Self {
        let succeeded = devices.iter().filter(|d| d.success).count();
        Self {
            succeeded,
            failed: devices.len() - succeeded,
            total_entities: devices.iter().map(|d| d.entity_count).sum(),
            malformed: devices.iter().map(|d| d.malformed).sum(),
            devices,
        }
    }

    pub fn all_failed(&self) -> bool {
        !self.devices.is_empty() && self.succeeded == 0
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator<C: Connector, P: StructuredParser> {
    connector: C,
    parser: P,
    catalogue: FieldCatalogue,
    config: RunConfig,
    stamp: fn() -> String,
    show_progress: bool,
}

impl<C: Connector, P: StructuredParser> Orchestrator<C, P> {
    pub fn new(connector: C, parser: P, catalogue: FieldCatalogue, config: RunConfig) -> Self {
        Self {
            connector,
            parser,
            catalogue,
            config,
            stamp: local_stamp,
            show_progress: false,
        }
    }

    /// Replace the clock used for file-name stamps.
    pub fn with_stamp(mut self, stamp: fn() -> String) -> Self {
        self.stamp = stamp;
        self
    }

    /// Print one progress line per device to stderr.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn process_all(&self, device_ids: &[String]) -> RunReport {
        let total = device_ids.len();
        let mut summaries = Vec::with_capacity(total);

        for (i, device_id) in device_ids.iter().enumerate() {
            if self.show_progress {
                eprintln!("[{}/{}] {}: collecting...", i + 1, total, device_id);
            }

            let summary = self.process_device(device_id);

            match &summary.error {
                None => {
                    log::info!(
                        "{device_id}: {} APs exported in {:.1}s",
                        summary.entity_count,
                        summary.duration_secs
                    );
                    if self.show_progress {
                        eprintln!(
                            "[{}/{}] {}: {} APs -> {}",
                            i + 1,
                            total,
                            device_id,
                            summary.entity_count,
                            summary
                                .table_path
                                .as_deref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default()
                        );
                    }
                }
                Some(err) => {
                    log::error!("{device_id}: {err}");
                    if self.show_progress {
                        eprintln!("[{}/{}] {}: {}", i + 1, total, device_id, err);
                    }
                }
            }

            summaries.push(summary);
        }

        RunReport::from_summaries(summaries)
    }

    fn process_device(&self, device_id: &str) -> RunSummary {
        let started = Instant::now();
        let stamp = (self.stamp)();

        let mut client = match self.connector.connect(device_id) {
            Ok(client) => client,
            Err(e) => {
                let mut summary = RunSummary::failed(device_id, DeviceStage::Connect, e.to_string());
                summary.duration_secs = started.elapsed().as_secs_f64();
                return summary;
            }
        };
        log::info!("{device_id}: connected");

        let commands = self.catalogue.commands();
        let outcome = SessionRunner::new(self.catalogue.timing_probe.as_str()).run(
            &mut client,
            device_id,
            &commands,
        );
        client.close();

        let (session, failure) = match outcome {
            Ok(session) => (session, None),
            Err(failure) => (failure.partial, Some(failure.error)),
        };

        let transcript_path = self
            .config
            .log_dir
            .join(table_file_name(&stamp, device_id, "log"));
        let transcript_path = match transcript::write_transcript(&transcript_path, &session.transcript)
        {
            Ok(()) => Some(transcript_path),
            Err(e) => {
                log::warn!(
                    "{device_id}: could not write transcript {}: {e}",
                    transcript_path.display()
                );
                None
            }
        };

        let duration_secs = session_duration(&session, started);

        if let Some(error) = failure {
            let mut summary = RunSummary::failed(device_id, DeviceStage::Session, error.to_string());
            summary.duration_secs = duration_secs;
            summary.transcript_path = transcript_path;
            return summary;
        }

        let reconciliation =
            reconcile_outputs(&self.parser, &self.catalogue, device_id, |command| {
                session.output_for(command)
            });

        let table_path = self
            .config
            .output_dir
            .join(table_file_name(&stamp, device_id, self.config.export.extension()));
        let exported = export_device(&table_path, &reconciliation, &self.catalogue, &self.config);

        let mut summary = match exported {
            Ok(()) => RunSummary {
                device_id: device_id.to_string(),
                success: true,
                entity_count: reconciliation.entity_count(),
                malformed: reconciliation.malformed,
                error: None,
                duration_secs,
                table_path: Some(table_path),
                transcript_path: None,
            },
            Err(e) => {
                let mut summary = RunSummary::failed(device_id, DeviceStage::Export, e.to_string());
                summary.malformed = reconciliation.malformed;
                summary.duration_secs = duration_secs;
                summary
            }
        };
        summary.transcript_path = transcript_path;
        summary
    }
}

/// Probe bookends when the session completed, otherwise wall time.
fn session_duration(session: &Session, started: Instant) -> f64 {
    session
        .elapsed()
        .and_then(|d| d.to_std().ok())
        .unwrap_or_else(|| started.elapsed())
        .as_secs_f64()
}

// ============================================================================
// Parse + reconcile + export
// ============================================================================

/// Parse each catalogue source from its command output and reconcile.
///
/// A source with no output or unparseable output contributes zero records.
pub fn reconcile_outputs<'a, P: StructuredParser + ?Sized>(
    parser: &P,
    catalogue: &FieldCatalogue,
    device_id: &str,
    output_for: impl Fn(&str) -> Option<&'a str>,
) -> Reconciliation {
    let sources: Vec<SourceRecords> = catalogue
        .sources
        .iter()
        .map(|source| {
            let Some(output) = output_for(&source.command) else {
                log::warn!("{device_id}: no output for '{}'", source.command);
                return SourceRecords::empty(&source.tag);
            };
            match parser.parse(&source.tag, &source.command, output) {
                Ok(records) => {
                    log::debug!(
                        "{device_id}: '{}' gave {} records",
                        source.command,
                        records.len()
                    );
                    SourceRecords::new(&source.tag, records)
                }
                Err(e) => {
                    log::warn!("{device_id}: {e}; treating '{}' as empty", source.tag);
                    SourceRecords::empty(&source.tag)
                }
            }
        })
        .collect();

    let reconciliation = reconcile(&sources, &catalogue.schema());
    if reconciliation.malformed > 0 {
        log::warn!(
            "{device_id}: dropped {} records without an AP name",
            reconciliation.malformed
        );
    }
    reconciliation
}

fn export_device(
    path: &Path,
    reconciliation: &Reconciliation,
    catalogue: &FieldCatalogue,
    config: &RunConfig,
) -> Result<(), ReconError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| ReconError::Io(format!("create {}: {e}", parent.display())))?;
        }
    }
    export_table(path, &reconciliation.records, &catalogue.schema(), &config.export)?;
    Ok(())
}

/// Rebuild a device table from an archived transcript without connecting.
pub fn replay_transcript<P: StructuredParser + ?Sized>(
    parser: &P,
    catalogue: &FieldCatalogue,
    config: &RunConfig,
    device_id: &str,
    stamp: &str,
    text: &str,
) -> RunSummary {
    let mut commands = catalogue.commands();
    commands.push(&catalogue.timing_probe);
    let blocks: Vec<TranscriptBlock> = transcript::split_transcript(text, &commands);

    let reconciliation = reconcile_outputs(parser, catalogue, device_id, |command| {
        transcript::find_output(&blocks, command)
    });

    let table_path = config
        .output_dir
        .join(table_file_name(stamp, device_id, config.export.extension()));

    match export_device(&table_path, &reconciliation, catalogue, config) {
        Ok(()) => RunSummary {
            device_id: device_id.to_string(),
            success: true,
            entity_count: reconciliation.entity_count(),
            malformed: reconciliation.malformed,
            error: None,
            duration_secs: 0.0,
            table_path: Some(table_path),
            transcript_path: None,
        },
        Err(e) => RunSummary::failed(device_id, DeviceStage::Export, e.to_string()),
    }
}

/// `(stamp, device)` from a transcript file stem like `20260106-170010-ogden-wlc4`.
pub fn split_log_stem(stem: &str) -> Option<(&str, &str)> {
    if stem.len() <= 16 || !stem.is_char_boundary(15) {
        return None;
    }
    let (stamp, rest) = stem.split_at(15);
    let device = rest.strip_prefix('-')?;
    chrono::NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some((stamp, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_log_stem() {
        assert_eq!(
            split_log_stem("20260106-170010-ogden-wlc4"),
            Some(("20260106-170010", "ogden-wlc4"))
        );
        assert_eq!(split_log_stem("ogden-wlc4"), None);
        assert_eq!(split_log_stem("20261399-170010-x"), None);
        assert_eq!(split_log_stem("20260106-170010-"), None);
    }

    #[test]
    fn report_totals() {
        let ok = RunSummary {
            device_id: "a".into(),
            success: true,
            entity_count: 4,
            malformed: 1,
            error: None,
            duration_secs: 1.0,
            table_path: None,
            transcript_path: None,
        };
        let bad = RunSummary::failed("b", DeviceStage::Connect, "refused".into());
        let report = RunReport::from_summaries(vec![ok, bad]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total_entities, 4);
        assert_eq!(report.malformed, 1);
        assert!(!report.all_failed());
        assert!(!RunReport::default().all_failed());
    }

    #[test]
    fn device_error_display() {
        let err = DeviceError {
            stage: DeviceStage::Session,
            message: "Connection closed by device".into(),
        };
        assert_eq!(err.to_string(), "session failed: Connection closed by device");
    }

    #[test]
    fn stamp_format() {
        let stamp = local_stamp();
        assert_eq!(stamp.len(), 15);
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, STAMP_FORMAT).is_ok());
    }

    #[test]
    fn summary_serializes_stage_lowercase() {
        let summary = RunSummary::failed("wlc-1", DeviceStage::Export, "exists".into());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["error"]["stage"], "export");
        assert_eq!(json["success"], false);
    }
}
