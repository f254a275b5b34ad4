use std::fmt;

use chrono::Utc;
use readltr_core::model::ContentId;
use services::{Clock, TrackerConfig, TrackingServices};
use storage::repository::ReadingSessionRepository;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod trace;

const DEFAULT_DB_URL: &str = "sqlite://readltr.sqlite3";
const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidContentId { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidContentId { raw } => write!(f, "invalid --content-id value: {raw:?}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  readltr replay   --trace <file.json> [--db <sqlite_url>] [--content-id <id>]");
    eprintln!("  readltr sessions --content-id <id> [--db <sqlite_url>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --content-id replay (replay only)");
    eprintln!("  --limit {DEFAULT_LIST_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  READLTR_DB_URL, READLTR_SAMPLE_INTERVAL_SECS, READLTR_SYNC_INTERVAL_SECS,");
    eprintln!("  READLTR_FINISH_THRESHOLD, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Replay,
    Sessions,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "replay" => Some(Self::Replay),
            "sessions" => Some(Self::Sessions),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db_url: String,
    content_id: Option<ContentId>,
    trace_path: Option<String>,
    limit: u32,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: env_db_url.map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            content_id: None,
            trace_path: None,
            limit: DEFAULT_LIST_LIMIT,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--content-id" => {
                    let value = require_value(args, "--content-id")?;
                    let id = ContentId::new(value.clone())
                        .map_err(|_| ArgsError::InvalidContentId { raw: value })?;
                    parsed.content_id = Some(id);
                }
                "--trace" => parsed.trace_path = Some(require_value(args, "--trace")?),
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value
                        .parse()
                        .ok()
                        .filter(|limit| *limit > 0)
                        .ok_or(ArgsError::InvalidLimit { raw: value })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("readltr=info,services=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn replay(args: Args, config: TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = args
        .trace_path
        .ok_or(ArgsError::MissingFlag { flag: "--trace" })?;
    let raw = std::fs::read_to_string(&path)?;
    let events = trace::parse_trace(&raw)?;
    let content_id = match args.content_id {
        Some(id) => id,
        None => "replay".parse()?,
    };

    let mounted_at = Utc::now();
    let services =
        TrackingServices::sqlite(&args.db_url, Clock::fixed(mounted_at), config).await?;
    let mut tracker = services.tracker(content_id.clone());
    tracker.mount();
    trace::apply(&mut tracker, mounted_at, &events)?;
    info!(%content_id, events = events.len(), "trace replayed");

    let report = tracker.shutdown().await;
    let Some(session_id) = report.session_id else {
        let reason = if report.creation_failed {
            "the store rejected session creation"
        } else {
            "the sync worker stopped before creating a session"
        };
        return Err(format!("no session recorded: {reason}; see log for details").into());
    };
    let record = services.store().get_session(&session_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn sessions(args: Args, config: TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let content_id = args
        .content_id
        .ok_or(ArgsError::MissingFlag {
            flag: "--content-id",
        })?;
    let services = TrackingServices::sqlite(&args.db_url, Clock::system(), config).await?;
    let records = services
        .store()
        .list_sessions(&content_id, args.limit)
        .await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(&mut iter, std::env::var("READLTR_DB_URL").ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let config = TrackerConfig::from_env()?;
    prepare_sqlite_file(&parsed.db_url)?;

    match cmd {
        Command::Replay => replay(parsed, config).await,
        Command::Sessions => sessions(parsed, config).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter, None)
    }

    #[test]
    fn parses_replay_flags() {
        let args = parse(&[
            "--trace",
            "t.json",
            "--db",
            "sqlite::memory:",
            "--content-id",
            "post-1",
        ])
        .unwrap();
        assert_eq!(args.trace_path.as_deref(), Some("t.json"));
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.content_id, Some(ContentId::new("post-1").unwrap()));
        assert_eq!(args.limit, DEFAULT_LIST_LIMIT);
    }

    #[test]
    fn rejects_blank_content_id_and_zero_limit() {
        assert!(matches!(
            parse(&["--content-id", "  "]),
            Err(ArgsError::InvalidContentId { .. })
        ));
        assert!(matches!(
            parse(&["--limit", "0"]),
            Err(ArgsError::InvalidLimit { .. })
        ));
    }

    #[test]
    fn reports_missing_values_and_unknown_flags() {
        assert!(matches!(
            parse(&["--trace"]),
            Err(ArgsError::MissingValue { flag: "--trace" })
        ));
        assert!(matches!(parse(&["--verbose"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn env_db_url_is_normalized() {
        let mut iter = std::iter::empty();
        let args = Args::parse(&mut iter, Some("/tmp/reads.sqlite3".into())).unwrap();
        assert_eq!(args.db_url, "sqlite:///tmp/reads.sqlite3");
    }

    #[test]
    fn memory_url_needs_no_file() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(prepare_sqlite_file("postgres://nope").is_err());
    }
}
