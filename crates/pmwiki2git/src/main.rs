use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use pmwiki_core::config::{ConvertConfig, GitSettings, load_config};
use pmwiki_core::convert::{ConvertOptions, collect_snapshots};
use pmwiki_core::git::{CommitOutcome, GitRepo};
use pmwiki_core::pagefile::PageFile;
use pmwiki_core::scan::{StoredPage, load_page};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pmwiki2git",
    version,
    about = "Replay the stored history of a PmWiki wiki.d directory as git commits"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log debug output")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Commit every revision of every page, oldest first
    Convert(ConvertArgs),
    /// Show the fields and stored revisions of one page file
    Inspect(InspectArgs),
    /// Rebuild and list the revisions of one page file
    History(HistoryArgs),
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[arg(long, value_name = "DIR", help = "Path of PmWiki's wiki.d directory")]
    pmwiki: PathBuf,
    #[arg(long, value_name = "DIR", help = "Path to the output git repository")]
    git: PathBuf,
    #[arg(long, help = "Abort on the first page that cannot be rebuilt")]
    fail_fast: bool,
    #[arg(long, help = "Collect revisions without touching the repository")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    file: PathBuf,
    #[arg(long, help = "Print the parsed page as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    file: PathBuf,
    #[arg(long, value_name = "UNIX", help = "Treat the page as deleted at this time")]
    deleted_at: Option<i64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(cli.config.as_deref(), args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::History(args)) => run_history(args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_convert(config: Option<&Path>, args: ConvertArgs) -> Result<()> {
    ensure_directory(&args.pmwiki)?;
    ensure_directory(&args.git)?;
    let settings = resolve_settings(config)?;
    let repo = GitRepo::open(&args.git, &settings)?;

    info!(
        pmwiki = %normalize_path(&args.pmwiki),
        git = %normalize_path(repo.root()),
        "starting PmWiki to git conversion"
    );
    let report = collect_snapshots(
        &args.pmwiki,
        ConvertOptions {
            fail_fast: args.fail_fast,
        },
    )?;

    println!("convert");
    println!("pmwiki: {}", normalize_path(&args.pmwiki));
    println!("git: {}", normalize_path(repo.root()));
    println!("pages: {}", report.pages);
    println!("failed_pages: {}", report.failed_pages);
    println!("snapshots: {}", report.snapshots.len());
    if args.dry_run {
        println!("dry_run: yes");
        return Ok(());
    }

    let mut committed = 0;
    let mut skipped = 0;
    for snapshot in &report.snapshots {
        let outcome = repo.commit_snapshot(snapshot).with_context(|| {
            format!(
                "creating git commit for {} (rev {}) failed",
                snapshot.name, snapshot.rev
            )
        })?;
        match outcome {
            CommitOutcome::Committed => committed += 1,
            CommitOutcome::Skipped => skipped += 1,
        }
    }
    println!("commits: {committed}");
    println!("skipped: {skipped}");
    info!(commits = committed, "finished git import");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let page = load_page(&StoredPage::from_path(&args.file)?)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!("inspect");
    println!("file: {}", normalize_path(&args.file));
    println!("version: {}", page.version);
    println!("name: {}", page.name);
    println!("time: {}", format_time(page.time));
    println!("author: {}", or_none(&page.author));
    println!("host: {}", format_host(&page));
    println!("rev: {}", page.rev);
    println!("text.bytes: {}", page.text.len());
    println!("deleted: {}", format_time(page.deleted));
    println!("revisions.count: {}", page.revisions.len());
    for revision in page.revisions.values().rev() {
        println!(
            "revisions.entry: {} author={} host={} diff_against={} diff.bytes={}",
            revision.time.timestamp(),
            or_none(revision.author.as_deref().unwrap_or_default()),
            revision
                .host
                .map(|host| host.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            revision
                .diff_against
                .map(|time| time.timestamp().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            revision.diff_text.as_deref().map(str::len).unwrap_or(0),
        );
    }
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    let mut page = load_page(&StoredPage::from_path(&args.file)?)?;
    if let Some(seconds) = args.deleted_at {
        let deleted = DateTime::from_timestamp(seconds, 0)
            .with_context(|| format!("deletion time {seconds} is out of range"))?;
        page.deleted = Some(deleted);
    }

    println!("history");
    println!("name: {}", page.name);
    let mut listed = 0;
    for item in page.revisions() {
        match item {
            Ok(snapshot) => {
                listed += 1;
                println!(
                    "snapshot: rev={} time={} author={} host={} text.bytes={}",
                    snapshot.rev,
                    format_time(snapshot.time),
                    or_none(&snapshot.author),
                    format_host(&snapshot),
                    snapshot.text.len(),
                );
            }
            Err(err) => {
                println!("snapshots.count: {listed}");
                bail!("history of {} is incomplete: {err}", page.name);
            }
        }
    }
    println!("snapshots.count: {listed}");
    Ok(())
}

fn resolve_settings(config: Option<&Path>) -> Result<GitSettings> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => ConvertConfig::default(),
    };
    Ok(config.git_settings())
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("directory does not exist: {}", normalize_path(path));
    }
    if !path.is_dir() {
        bail!("not a directory: {}", normalize_path(path));
    }
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => format!("{} ({})", time.timestamp(), time.to_rfc3339()),
        None => "<none>".to_string(),
    }
}

fn format_host(page: &PageFile) -> String {
    page.host
        .map(|host| host.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "<none>" } else { value }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
