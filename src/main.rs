//! donorscrape command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use donorscrape::config::{load_settings, Settings};
use donorscrape::extract::{extract_subject, ProfileDocument};
use donorscrape::models::{Credentials, ScrapeJob};
use donorscrape::repository::{JobStore, ResultSink, SqliteStore, SubjectListStore};
use donorscrape::sections::parse_inventory;

#[derive(Parser)]
#[command(name = "donorscrape", version, about = "Donor-registry profile extraction")]
struct Cli {
    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (database lives here)
    #[arg(long, global = true, env = "DONORSCRAPE_DATA_DIR")]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a job over the given subjects and run it
    Run {
        /// Comma-separated subject ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// File with one subject id per line
        #[arg(long)]
        ids_file: Option<PathBuf>,
        /// Skip subjects scraped successfully within the refresh TTL
        #[arg(long)]
        incremental: bool,
    },
    /// Show a job's status and counters
    Status { job_id: String },
    /// Print a job's per-subject results as JSON
    Results { job_id: String },
    /// Re-enable a subject deactivated after repeated failures
    Reactivate { subject_id: String },
    /// Manage the stored login
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
    /// Extract a record from saved HTML without a browser
    Parse {
        /// Saved profile page
        profile: PathBuf,
        /// Saved inventory page
        #[arg(long)]
        inventory: Option<PathBuf>,
        /// Subject id to stamp on the record
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum CredentialsCommand {
    /// Replace the active credential set
    Set {
        #[arg(long)]
        identity: String,
        #[arg(long, env = "DONORSCRAPE_SECRET", hide_env_values = true)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose > 0 { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut settings = load_settings().await;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = PathBuf::from(shellexpand::tilde(dir).as_ref());
    }

    match cli.command {
        Command::Run {
            ids,
            ids_file,
            incremental,
        } => cmd_run(&settings, ids, ids_file.as_deref(), incremental).await,
        Command::Status { job_id } => cmd_status(&settings, &job_id).await,
        Command::Results { job_id } => cmd_results(&settings, &job_id).await,
        Command::Reactivate { subject_id } => cmd_reactivate(&settings, &subject_id).await,
        Command::Credentials {
            action: CredentialsCommand::Set { identity, secret },
        } => cmd_credentials_set(&settings, identity, secret).await,
        Command::Parse {
            profile,
            inventory,
            id,
        } => cmd_parse(&profile, inventory.as_deref(), &id),
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<SqliteStore>> {
    settings
        .ensure_directories()
        .with_context(|| format!("creating {}", settings.data_dir.display()))?;
    let path = settings.database_path();
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn read_ids_file(path: &Path) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(feature = "browser")]
async fn cmd_run(
    settings: &Settings,
    mut ids: Vec<String>,
    ids_file: Option<&Path>,
    incremental: bool,
) -> Result<()> {
    use donorscrape::browser::{ChromiumBackend, SessionController};
    use donorscrape::repository::{CredentialProvider, EnvCredentialProvider};
    use donorscrape::{CancelFlag, JobOrchestrator, ProgressReporter};

    let store = open_store(settings).await?;

    if let Some(path) = ids_file {
        ids.extend(read_ids_file(path)?);
    }
    ids.retain(|id| !id.trim().is_empty());
    if ids.is_empty() {
        ids = store.active_subject_ids().await?;
    }
    if ids.is_empty() {
        bail!("no subject ids given and no active subjects stored");
    }

    let job_id = store.create_job(&ids, incremental).await?;
    println!("Job {job_id}: {} subjects", ids.len());

    let credentials: Arc<dyn CredentialProvider> = if EnvCredentialProvider::is_configured() {
        Arc::new(EnvCredentialProvider::new())
    } else {
        store.clone()
    };
    let session = SessionController::new(Arc::new(ChromiumBackend::new()), credentials, settings);

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the current subject...");
            on_signal.cancel();
        }
    });

    let bar = ProgressBar::new(ids.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let (reporter, mut progress) = ProgressReporter::channel();
    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(update) = progress.recv().await {
                bar.set_position(update.counters.processed as u64);
                bar.set_message(format!(
                    "{} ok, {} failed, {} skipped",
                    update.counters.succeeded, update.counters.failed, update.counters.skipped
                ));
            }
        })
    };

    let mut orchestrator = JobOrchestrator::new(store.clone(), session, settings)
        .with_progress(reporter)
        .with_cancel_flag(cancel);
    let job = orchestrator.run(&job_id).await;
    drop(orchestrator);
    let _ = bar_task.await;
    bar.finish_and_clear();

    let job = job.context("running job")?;
    print_job(&job);
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn cmd_run(
    _settings: &Settings,
    _ids: Vec<String>,
    _ids_file: Option<&Path>,
    _incremental: bool,
) -> Result<()> {
    bail!("this build has no browser support; rebuild with --features browser")
}

fn print_job(job: &ScrapeJob) {
    println!("Job:        {}", job.id);
    println!("Status:     {}", job.status);
    println!("Incremental: {}", job.incremental);
    println!("Subjects:   {}", job.subject_ids.len());
    println!("Processed:  {}", job.counters.processed);
    println!("Succeeded:  {}", job.counters.succeeded);
    println!("Failed:     {}", job.counters.failed);
    println!("Skipped:    {}", job.counters.skipped);
    if let Some(started) = job.started_at {
        println!("Started:    {}", started.to_rfc3339());
    }
    if let Some(finished) = job.finished_at {
        println!("Finished:   {}", finished.to_rfc3339());
    }
    if let Some(error) = &job.error {
        println!("Error:      {error}");
    }
}

async fn cmd_status(settings: &Settings, job_id: &str) -> Result<()> {
    let store = open_store(settings).await?;
    match store.get_job(job_id).await? {
        Some(job) => {
            print_job(&job);
            Ok(())
        }
        None => bail!("job not found: {job_id}"),
    }
}

async fn cmd_results(settings: &Settings, job_id: &str) -> Result<()> {
    let store = open_store(settings).await?;
    let results = store.list_results(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn cmd_reactivate(settings: &Settings, subject_id: &str) -> Result<()> {
    let store = open_store(settings).await?;
    if !store.reactivate_subject(subject_id).await? {
        bail!("unknown subject: {subject_id}");
    }
    println!("Reactivated {subject_id}");
    Ok(())
}

async fn cmd_credentials_set(settings: &Settings, identity: String, secret: String) -> Result<()> {
    let store = open_store(settings).await?;
    store
        .set_credentials(&Credentials::new(identity.clone(), secret))
        .await?;
    println!("Stored credentials for {identity}");
    Ok(())
}

fn cmd_parse(profile: &Path, inventory: Option<&Path>, id: &str) -> Result<()> {
    let html = std::fs::read_to_string(profile)
        .with_context(|| format!("reading {}", profile.display()))?;
    let url = format!("file://{}", profile.display());
    let mut record = extract_subject(id, &url, &html)?;

    if let Some(path) = inventory {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        record.inventory = parse_inventory(&ProfileDocument::parse(&html));
        if record.inventory.is_none() {
            tracing::warn!(path = %path.display(), "no inventory tables found");
        }
    }

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
