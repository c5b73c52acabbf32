use crate::infra::{parse_date, write_csv, SnapshotStore, StdinPrompt, StdoutSink};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use policy_tracker::config::{AppConfig, EngineConfig};
use policy_tracker::error::AppError;
use policy_tracker::report::{render_markdown, ReportSink};
use policy_tracker::store::{MemoryStore, RecordId};
use policy_tracker::telemetry;
use policy_tracker::workflows::digest::PartnerDigest;
use policy_tracker::workflows::export::WebsiteExport;
use policy_tracker::workflows::health::{HealthCheckRequest, HealthMonitor};
use policy_tracker::workflows::status::StatusDetector;
use policy_tracker::workflows::supersedes::{Detection, SupersedesDetector};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "policy-tracker",
    about = "Match regulations and score data quality for the legislative policy tracker",
    version
)]
struct Cli {
    /// JSON snapshot of every table, or a CSV of bills (defaults to TRACKER_SNAPSHOT)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// JSON engine settings (defaults to TRACKER_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Run the workflow without saving the snapshot afterwards
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect which earlier regulations a regulation supersedes
    Supersedes(SupersedesArgs),
    /// Validate bills and rebuild the website export table
    Export(ExportArgs),
    /// Record a system health check of the bills table
    Health(HealthArgs),
    /// Flag bills whose status or latest action needs review
    Status,
    /// Summarize recent milestones for partners
    Digest(DigestArgs),
}

#[derive(Args, Debug)]
struct SupersedesArgs {
    /// Evaluate a single regulation by record id
    #[arg(long, conflicts_with = "all")]
    record: Option<String>,
    /// Evaluate every regulation (the default when no record is given)
    #[arg(long)]
    all: bool,
    /// Date written into notes (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Continue past critical preflight issues without asking
    #[arg(long)]
    yes: bool,
    /// Also write the exported rows to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HealthArgs {
    /// Check type recorded on the monitor entry
    #[arg(long, default_value = "Weekly")]
    check_type: String,
    /// Import batch a post-import check belongs to
    #[arg(long)]
    related_import: Option<String>,
}

#[derive(Args, Debug)]
struct DigestArgs {
    /// Reporting date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
    /// Print the HTML rendering after the text one
    #[arg(long)]
    html: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load_with(cli.config.as_deref())?;
    telemetry::init(&config.telemetry)?;

    let path = cli
        .snapshot
        .clone()
        .or_else(|| config.snapshot.clone())
        .ok_or_else(|| {
            AppError::Snapshot("no snapshot given; pass --snapshot or set TRACKER_SNAPSHOT".to_string())
        })?;
    let engine = config.engine;
    let snapshot = SnapshotStore::load(&path, &engine.export.source)?;
    snapshot.ensure_tables(tables_for(&cli.command, &engine));
    let store = Arc::new(snapshot.store());
    let now = Local::now().naive_local();

    let writes = match cli.command {
        Command::Supersedes(args) => run_supersedes(store, &engine, args, now).await?,
        Command::Export(args) => run_export(store, &engine, args, now).await?,
        Command::Health(args) => run_health(store, &engine, args, now).await?,
        Command::Status => run_status(store, &engine, now).await?,
        Command::Digest(args) => run_digest(store, &engine, args, now).await?,
    };

    if !writes {
        return Ok(());
    }
    if cli.dry_run {
        info!("dry run; snapshot left unchanged");
        return Ok(());
    }
    let saved = snapshot.save()?;
    println!("Snapshot saved to {}", saved.display());
    Ok(())
}

/// Tables a command writes to, so a sparse snapshot still accepts the writes.
fn tables_for<'a>(command: &Command, engine: &'a EngineConfig) -> Vec<&'a str> {
    match command {
        Command::Supersedes(_) => vec![engine.supersedes.table.as_str()],
        Command::Export(_) => vec![
            engine.export.source.as_str(),
            engine.export.destination.as_str(),
            engine.export.quality_table.as_str(),
        ],
        Command::Health(_) => vec![
            engine.health.bills.as_str(),
            engine.health.monitor.as_str(),
            engine.health.exports.as_str(),
            engine.health.raw_import.as_str(),
        ],
        Command::Status => vec![engine.status.table.as_str()],
        Command::Digest(_) => vec![engine.digest.table.as_str()],
    }
}

async fn run_supersedes(
    store: Arc<MemoryStore>,
    engine: &EngineConfig,
    args: SupersedesArgs,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let today = args.today.unwrap_or_else(|| now.date());
    let detector = SupersedesDetector::new(store, engine.supersedes.clone(), engine.write.clone());

    match args.record {
        Some(record) if !args.all => {
            let detection = detector.detect_for(&RecordId::from(record.as_str()), today).await?;
            println!("{}: {}", record, detection.summary());
            if let Detection::Matched { report } = &detection {
                println!("\n{}", render_markdown(&report.to_report()));
            }
        }
        _ => {
            let summary = detector.detect_all(today).await?;
            println!("{}", render_markdown(&summary.to_report()));
        }
    }
    Ok(true)
}

async fn run_export(
    store: Arc<MemoryStore>,
    engine: &EngineConfig,
    args: ExportArgs,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let export = WebsiteExport::new(
        store,
        engine.export.clone(),
        engine.write.clone(),
        engine.quality.clone(),
    );
    let prompt = StdinPrompt {
        assume_yes: args.yes,
    };
    let outcome = export.run(&prompt, &StdoutSink, now).await?;

    if let Some(path) = args.csv {
        if !outcome.rows.is_empty() {
            write_csv(&path, &outcome.rows)?;
            println!("Wrote {} row(s) to {}", outcome.rows.len(), path.display());
        }
    }
    Ok(outcome.write.is_some() || outcome.clear.is_some())
}

async fn run_health(
    store: Arc<MemoryStore>,
    engine: &EngineConfig,
    args: HealthArgs,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let monitor = HealthMonitor::new(store, engine.health.clone(), engine.quality.clone());
    let request = HealthCheckRequest {
        check_type: args.check_type,
        related_import: args.related_import,
    };
    let outcome = monitor.run(&request, &StdoutSink, now).await?;
    Ok(outcome.record_id.is_some())
}

async fn run_status(
    store: Arc<MemoryStore>,
    engine: &EngineConfig,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let detector = StatusDetector::new(store, engine.status.clone(), engine.write.clone());
    let run = detector.run(&StdoutSink, now).await?;
    Ok(run.flagged() > 0)
}

async fn run_digest(
    store: Arc<MemoryStore>,
    engine: &EngineConfig,
    args: DigestArgs,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let today = args.today.unwrap_or_else(|| now.date());
    let digest = PartnerDigest::new(store, engine.digest.clone())
        .run(today)
        .await?;

    let sink = StdoutSink;
    sink.emit(&digest.text());
    if args.html {
        sink.emit(&digest.html());
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "policy-tracker",
            "digest",
            "--today",
            "2025-06-15",
            "--snapshot",
            "tables.json",
            "--dry-run",
        ])
        .expect("arguments parse");

        assert!(cli.dry_run);
        assert_eq!(cli.snapshot, Some(PathBuf::from("tables.json")));
        match cli.command {
            Command::Digest(args) => {
                assert_eq!(args.today, NaiveDate::from_ymd_opt(2025, 6, 15));
                assert!(!args.html);
            }
            other => panic!("expected digest command, got {other:?}"),
        }
    }

    #[test]
    fn record_and_all_are_exclusive() {
        let parsed = Cli::try_parse_from(["policy-tracker", "supersedes", "--record", "rec1", "--all"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn tables_cover_every_export_write_target() {
        let engine = EngineConfig::default();
        let tables = tables_for(&Command::Export(ExportArgs { yes: true, csv: None }), &engine);
        assert_eq!(tables, vec!["Bills", "Website Exports", "Export Quality Reports"]);
    }
}
