//! `apfleet-cli`: fleet collection pipeline.
//!
//! Drives one remote session per controller, parses the command output into
//! structured records, reconciles them with `apfleet-recon` and exports one
//! table per controller.

pub mod config;
pub mod hosts;
pub mod orchestrator;
pub mod parse;
pub mod session;
pub mod ssh;
pub mod transcript;

pub use config::{ConnectionConfig, Credentials, HostKeyPolicy, RunConfig};
pub use orchestrator::{DeviceError, DeviceStage, Orchestrator, RunReport, RunSummary};
pub use parse::{CommandParser, ParseError, StructuredParser};
pub use session::{Connector, Session, SessionClient, SessionError, SessionFailure, SessionRunner};
