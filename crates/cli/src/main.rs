// apfleet - collect, reconcile and export AP inventories from wireless controllers

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use apfleet_cli::config::{self, ConfigError};
use apfleet_cli::hosts;
use apfleet_cli::orchestrator::{self, RunReport, RunSummary};
use apfleet_cli::parse::CommandParser;
use apfleet_cli::ssh::SshConnector;
use apfleet_cli::{ConnectionConfig, Credentials, HostKeyPolicy, Orchestrator, RunConfig};
use apfleet_recon::{ExportOptions, FieldCatalogue};
use clap::{Args, Parser, Subcommand, ValueEnum};

use exit_codes::{
    run_exit_code, EXIT_CATALOGUE, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "apfleet")]
#[command(about = "Collect, reconcile and export access point inventories from wireless controllers")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect from every controller in the hosts file, one table per controller
    #[command(after_help = "\
Credentials come from flags, the environment (SSH_USERNAME, SSH_PASSWORD,
SSH_ENABLE_SECRET) or a .env file; missing ones are prompted for.

Exit codes: 0 all exported, 3 some controllers failed, 4 all failed.

Examples:
  apfleet run
  apfleet run --hosts lab.txt -o exports --log-dir logs
  apfleet run --known-hosts ~/.ssh/known_hosts --trust-on-first-use
  apfleet run --json --quiet | jq '.devices[] | select(.success | not)'")]
    Run(RunArgs),

    /// Print the export columns and the per-source command catalogue
    #[command(after_help = "\
Examples:
  apfleet schema
  apfleet schema --catalogue site.toml
  apfleet schema --json")]
    Schema {
        /// Field catalogue TOML (default: built-in wireless catalogue)
        #[arg(long, value_name = "FILE")]
        catalogue: Option<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rebuild a controller's table from an archived session transcript
    #[command(after_help = "\
The controller name and run stamp are taken from the transcript file name
(<stamp>-<device>.log) unless --device is given.

Examples:
  apfleet replay logs/20260106-170010-ogden-wlc4.log
  apfleet replay saved.log --device ogden-wlc4 -o /tmp")]
    Replay {
        /// Transcript written by `apfleet run`
        transcript: PathBuf,

        /// Controller name (default: from the file name)
        #[arg(long)]
        device: Option<String>,

        #[command(flatten)]
        output: OutputArgs,

        /// Emit the summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Suppress progress on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Device list, one host per line (default: wlc.txt, then aps.txt)
    #[arg(long, value_name = "FILE")]
    hosts: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,

    /// Directory for session transcripts
    #[arg(long, env = "LOG_DIR", default_value = config::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Emit the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress progress on stderr
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Directory for exported tables
    #[arg(long, short = 'o', env = "OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Field catalogue TOML (default: built-in wireless catalogue)
    #[arg(long, value_name = "FILE")]
    catalogue: Option<PathBuf>,

    /// Table delimiter
    #[arg(long, value_enum, default_value_t = Delimiter::Comma)]
    delimiter: Delimiter,
}

#[derive(Args)]
struct ConnectionArgs {
    #[arg(long, short = 'u', env = "SSH_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "SSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Enable secret (omit to stay in user exec mode)
    #[arg(long, env = "SSH_ENABLE_SECRET", hide_env_values = true)]
    enable_secret: Option<String>,

    #[arg(long, short = 'p', env = "SSH_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Connect timeout in seconds
    #[arg(long, env = "SSH_TIMEOUT", default_value_t = config::DEFAULT_CONNECT_TIMEOUT_SECS)]
    timeout: u64,

    /// Max seconds to wait for one command's output
    #[arg(long, env = "SSH_READ_TIMEOUT", default_value_t = config::DEFAULT_READ_TIMEOUT_SECS)]
    read_timeout: u64,

    /// OpenSSH known_hosts file to verify controller keys against
    #[arg(long, env = "APFLEET_KNOWN_HOSTS", value_name = "FILE")]
    known_hosts: Option<String>,

    /// Add unknown host keys to --known-hosts instead of refusing them
    #[arg(long, requires = "known_hosts")]
    trust_on_first_use: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    fn byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Run finished; code only, the summary was already printed.
    fn exit(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::Catalogue(_) => Self {
                code: EXIT_CATALOGUE,
                message: err.to_string(),
                hint: Some("run `apfleet schema --catalogue <FILE>` to validate it".into()),
            },
            ConfigError::NoHostsFile(_) => CliError::usage(err.to_string())
                .with_hint("pass --hosts FILE or create wlc.txt with one controller per line"),
            ConfigError::EmptyDeviceList(_) | ConfigError::MissingCredential(_) => {
                CliError::usage(err.to_string())
            }
            ConfigError::Read { .. } => CliError::io(err.to_string()),
        }
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        Self { code: EXIT_ERROR, message: format!("prompt failed: {}", e), hint: None }
    }
}

// ============================================================================
// main
// ============================================================================

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("APFLEET_GIT_HASH"), ")",
        "\nrecon:   apfleet-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("APFLEET_TARGET"),
    )
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Also installs the bridge that routes `log` records through the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Schema { catalogue, json } => cmd_schema(catalogue, json),
        Commands::Replay { transcript, device, output, json, quiet } => {
            cmd_replay(transcript, device, output, json, quiet)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let show_progress = !args.quiet && atty::is(atty::Stream::Stderr);

    let catalogue = config::load_catalogue(args.output.catalogue.as_deref())?;
    let hosts_file = hosts::resolve_hosts_file(args.hosts.as_deref(), Path::new("."))?;
    let devices = hosts::read_device_list(&hosts_file)?;
    log::info!("{} controllers from {}", devices.len(), hosts_file.display());

    let connection = connection_config(args.connection)?;
    let run_config = RunConfig {
        output_dir: args.output.output_dir,
        log_dir: args.log_dir,
        export: ExportOptions { delimiter: args.output.delimiter.byte() },
    };

    if show_progress {
        eprintln!(
            "Collecting from {} controller(s) listed in {}",
            devices.len(),
            hosts_file.display()
        );
    }

    let orchestrator = Orchestrator::new(
        SshConnector::new(connection),
        CommandParser,
        catalogue,
        run_config,
    )
    .with_progress(show_progress);

    let report = orchestrator.process_all(&devices);

    if args.json {
        print_json(&report)?;
    }
    if !args.quiet {
        print_report(&report);
    }

    match run_exit_code(&report) {
        EXIT_SUCCESS => Ok(()),
        code => Err(CliError::exit(code)),
    }
}

fn connection_config(args: ConnectionArgs) -> Result<ConnectionConfig, CliError> {
    let username = match args.username.filter(|u| !u.trim().is_empty()) {
        Some(u) => u,
        None => {
            require_terminal("username")?;
            dialoguer::Input::<String>::new()
                .with_prompt("SSH username")
                .validate_with(|s: &String| -> Result<(), &str> {
                    if s.trim().is_empty() {
                        Err("username must not be empty")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?
        }
    };

    let password = match args.password.filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => {
            require_terminal("password")?;
            dialoguer::Password::new()
                .with_prompt(format!("SSH password for {}", username))
                .interact()?
        }
    };

    let credentials = Credentials::new(username, password, args.enable_secret)?;

    let mut connection = ConnectionConfig::new(credentials);
    connection.port = args.port;
    connection.connect_timeout = Duration::from_secs(args.timeout);
    connection.read_timeout = Duration::from_secs(args.read_timeout);
    if let Some(path) = args.known_hosts {
        connection.host_key = HostKeyPolicy::known_hosts(&path, args.trust_on_first_use);
    }
    Ok(connection)
}

fn require_terminal(what: &str) -> Result<(), CliError> {
    if atty::is(atty::Stream::Stdin) {
        Ok(())
    } else {
        Err(CliError::usage(format!("no SSH {} given and stdin is not a terminal", what))
            .with_hint(format!("set SSH_{} in the environment or .env", what.to_uppercase())))
    }
}

fn print_report(report: &RunReport) {
    eprintln!(
        "Run complete: {} succeeded, {} failed, {} APs exported",
        report.succeeded, report.failed, report.total_entities
    );
    if report.malformed > 0 {
        eprintln!("  {} records dropped for a missing AP name", report.malformed);
    }
    for device in report.devices.iter().filter(|d| !d.success) {
        print_failure(device);
    }
}

fn print_failure(device: &RunSummary) {
    let reason = device
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_default();
    eprintln!("  FAILED {}: {}", device.device_id, reason);
    if let Some(path) = &device.transcript_path {
        eprintln!("         transcript: {}", path.display());
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError { code: EXIT_ERROR, message: e.to_string(), hint: None })?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// schema
// ============================================================================

fn cmd_schema(catalogue_path: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let catalogue = config::load_catalogue(catalogue_path.as_deref())?;
    let schema = catalogue.schema();

    if json {
        #[derive(serde::Serialize)]
        struct SchemaOutput<'a> {
            header: Vec<&'a str>,
            catalogue: &'a FieldCatalogue,
        }
        return print_json(&SchemaOutput { header: schema.header(), catalogue: &catalogue });
    }

    println!("catalogue:    {}", catalogue.name);
    println!("timing probe: {}", catalogue.timing_probe);
    println!("columns:      {}", schema.header().join(","));
    for (priority, source) in catalogue.sources.iter().enumerate() {
        println!();
        println!("[{}] {} ({})", priority + 1, source.tag, source.command);
        for field in &source.fields {
            println!("    {}", field);
        }
    }
    Ok(())
}

// ============================================================================
// replay
// ============================================================================

fn cmd_replay(
    transcript: PathBuf,
    device: Option<String>,
    output: OutputArgs,
    json: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let show_progress = !quiet && atty::is(atty::Stream::Stderr);
    let catalogue = config::load_catalogue(output.catalogue.as_deref())?;

    let text = std::fs::read_to_string(&transcript)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", transcript.display(), e)))?;

    let stem = transcript
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parsed_stem = orchestrator::split_log_stem(&stem);

    let device_id = match (device, parsed_stem) {
        (Some(d), _) => d,
        (None, Some((_, d))) => d.to_string(),
        (None, None) => {
            return Err(CliError::usage(format!(
                "cannot tell the controller from '{}'",
                transcript.display()
            ))
            .with_hint("pass --device NAME"))
        }
    };
    let stamp = parsed_stem
        .map(|(s, _)| s.to_string())
        .unwrap_or_else(orchestrator::local_stamp);

    let run_config = RunConfig {
        output_dir: output.output_dir,
        export: ExportOptions { delimiter: output.delimiter.byte() },
        ..RunConfig::default()
    };

    if show_progress {
        eprintln!("Replaying {} as {}", transcript.display(), device_id);
    }

    let summary = orchestrator::replay_transcript(
        &CommandParser,
        &catalogue,
        &run_config,
        &device_id,
        &stamp,
        &text,
    );

    if json {
        print_json(&summary)?;
    }

    match &summary.error {
        None => {
            if !quiet {
                let path = summary
                    .table_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                eprintln!("{}: {} APs -> {}", device_id, summary.entity_count, path);
            }
            Ok(())
        }
        Some(err) => {
            let hint = err
                .message
                .contains("refusing to overwrite")
                .then(|| "exports are never overwritten; pick another -o directory".to_string());
            Err(CliError { code: EXIT_IO, message: err.to_string(), hint })
        }
    }
}
