use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alarmtopo::config::{default_config_path, Config};
use alarmtopo::expand::TimeWindow;
use alarmtopo::ingest::{ingest, IngestOptions, RawTable};
use alarmtopo::review::{self, ConfirmRequest};
use alarmtopo::scoring::{self, Score};
use alarmtopo::store::{SessionId, SessionStore};
use alarmtopo::types::time_point_from_unix_seconds;

#[derive(Parser)]
#[command(
    name = "alarmtopo",
    about = "Group alarms by network topology and review the groups",
    version
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the upload folder from the config.
    #[arg(long)]
    upload_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session from two alarm exports (CSV).
    Upload { file1: PathBuf, file2: PathBuf },

    /// List groups with alarms inside a time interval.
    Interval {
        #[arg(long)]
        session: SessionId,
        /// Start of the interval, unix seconds.
        #[arg(long)]
        start: i64,
        /// End of the interval, unix seconds.
        #[arg(long)]
        end: i64,
    },

    /// Show the topology tree and alarms of one group.
    Analyze {
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        group: String,
    },

    /// Widen a group's time window and look for related unassigned alarms.
    Expand {
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        group: String,
        /// Minutes added on both sides of the group's time span.
        #[arg(long)]
        add_time: u32,
    },

    /// Apply operator edits from a JSON file with `row`, `columns` and `values` lists.
    Confirm {
        #[arg(long)]
        session: SessionId,
        edits: PathBuf,
    },

    /// List confirmed and unconfirmed groups.
    Detail {
        #[arg(long)]
        session: SessionId,
    },

    /// Print review statistics.
    Score {
        #[arg(long)]
        session: SessionId,
    },

    /// Copy the verified table into a directory.
    Export {
        #[arg(long)]
        session: SessionId,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Remove expired sessions.
    Clean,
}

#[derive(serde::Serialize)]
struct UploadResponse {
    client_id: SessionId,
    #[serde(flatten)]
    score: Score,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_upload(path: &Path) -> Result<RawTable> {
    RawTable::from_path(path).with_context(|| format!("failed to read upload {}", path.display()))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    if let Some(upload_folder) = cli.upload_folder {
        config.upload_folder = upload_folder;
    }
    let store: SessionStore = config.session_store();
    let resolver = config.resolver();

    match cli.command {
        Commands::Upload { file1, file2 } => {
            let first = read_upload(&file1)?;
            let second = read_upload(&file2)?;
            let options = IngestOptions {
                resolver,
                time_format: config.time_format.clone(),
                group_seed: config.group_seed,
            };
            let table = ingest(&first, &second, &options)?;
            let session = store.create()?;
            store.save_table(session, &table)?;
            print_json(&UploadResponse {
                client_id: session,
                score: scoring::score(&table),
            })?;
        }
        Commands::Interval {
            session,
            start,
            end,
        } => {
            let table = store.load_table(session)?;
            let window = TimeWindow {
                start: time_point_from_unix_seconds(start),
                end: time_point_from_unix_seconds(end),
            };
            print_json(&serde_json::json!({
                "group_id": review::interval(&table, window),
            }))?;
        }
        Commands::Analyze { session, group } => {
            let table = store.load_table(session)?;
            print_json(&review::analyze(&table, &group, &resolver)?)?;
        }
        Commands::Expand {
            session,
            group,
            add_time,
        } => {
            let table = store.load_table(session)?;
            print_json(&review::expand(&table, &group, add_time, &resolver)?)?;
        }
        Commands::Confirm { session, edits } => {
            let file = std::fs::File::open(&edits)
                .with_context(|| format!("failed to open edits {}", edits.display()))?;
            let request: ConfirmRequest = serde_json::from_reader(file)
                .with_context(|| format!("failed to parse edits {}", edits.display()))?;
            let table = store.load_table(session)?;
            let table = review::confirm(&table, &request.into_edits()?)?;
            store.save_table(session, &table)?;
            print_json(&scoring::score(&table))?;
        }
        Commands::Detail { session } => {
            let table = store.load_table(session)?;
            print_json(&scoring::group_confirmation(&table))?;
        }
        Commands::Score { session } => {
            let table = store.load_table(session)?;
            print_json(&scoring::score(&table))?;
        }
        Commands::Export { session, out } => {
            let path = store.export(session, &out)?;
            print_json(&serde_json::json!({ "path": path }))?;
        }
        Commands::Clean => {
            let removed = store.clean(config.max_session_age())?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}
