use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use story_audio_jobs::config::TrackerConfig;
use story_audio_jobs::constants::TIMED_OUT_ERROR;
use story_audio_jobs::recover::{self, RecoveryOutcome};
use story_audio_jobs::store::{JobKey, JobStore};
use story_audio_jobs::stuck;
use story_audio_jobs::{db, serve};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RecoverAction {
    /// Out-of-band evidence proves the job finished; record the artifact
    ForceComplete,
    /// No evidence of completion; record an administrative failure
    ForceFail,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Track story audio-synthesis jobs and recover stuck ones"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show aggregated per-section job status for a story
    Status {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Story id to inspect
        story_id: String,
    },
    /// List jobs stuck in PROCESSING past the timeout
    Stuck {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Stuck timeout in seconds (overrides config file)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Force a stuck job to a terminal state
    Recover {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Remedy to apply
        #[arg(long, value_enum)]
        action: RecoverAction,

        /// Target section or narration-chunk id
        #[arg(long)]
        target_id: Option<String>,

        /// Voice id of the job (omit for narration-chunk jobs)
        #[arg(long)]
        voice_id: Option<String>,

        /// Force-fail every stuck job under this story instead of one key
        #[arg(long, conflicts_with = "target_id")]
        parent: Option<String>,

        /// Stuck timeout for --parent sweeps (overrides config file)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Artifact location to record (required for force-complete)
        #[arg(long)]
        audio_url: Option<String>,

        /// Failure reason to record (default: administrative timeout message)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Serve read-only status endpoints over HTTP
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Command::Status { config, story_id } => status(config, story_id),
        Command::Stuck {
            config,
            timeout_secs,
        } => stuck_listing(config, timeout_secs),
        Command::Recover {
            config,
            action,
            target_id,
            voice_id,
            parent,
            timeout_secs,
            audio_url,
            reason,
        } => recover_command(
            config,
            action,
            target_id,
            voice_id,
            parent,
            timeout_secs,
            audio_url,
            reason,
        ),
        Command::Serve { config, port } => serve_command(config, port),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Open the job database and build a store, initializing schema if needed
async fn open_store(config: &TrackerConfig) -> Result<JobStore, Box<dyn std::error::Error>> {
    let pool = db::open_database(&config.db_path)
        .await
        .map_err(|e| format!("Failed to open database '{}': {}", config.db_path.display(), e))?;
    db::init_database_schema(&pool)
        .await
        .map_err(|e| format!("Failed to initialize schema: {}", e))?;
    Ok(JobStore::new(pool))
}

fn status(config_path: PathBuf, story_id: String) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = TrackerConfig::load(&config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = open_store(&config).await?;
        let entries = store.status_by_parent(&story_id).await?;

        println!("Checking jobs for story: {}", story_id);
        if entries.is_empty() {
            println!("No jobs found for this story.");
        } else {
            for entry in &entries {
                println!(
                    "Section {}: Status={}, Updated={}, Error={}",
                    entry.item_index,
                    entry.status,
                    entry.updated_at,
                    entry.error.as_deref().unwrap_or("-")
                );
            }
        }
        Ok(ExitCode::SUCCESS)
    })
}

fn stuck_listing(
    config_path: PathBuf,
    timeout_secs: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = TrackerConfig::load(&config_path)?;
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.stuck_timeout_secs));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = open_store(&config).await?;
        let now_ms = Utc::now().timestamp_millis();
        let jobs = stuck::find_stuck(&store, timeout, now_ms).await?;

        if jobs.is_empty() {
            println!("No stuck jobs found (timeout: {}s).", timeout.as_secs());
        } else {
            println!(
                "Found {} stuck job(s) (timeout: {}s):",
                jobs.len(),
                timeout.as_secs()
            );
            for job in &jobs {
                println!(
                    "  {} story={} index={} last update {}s ago",
                    job.key(),
                    job.parent_id,
                    job.item_index,
                    (now_ms - job.updated_at) / 1000
                );
            }
        }
        Ok(ExitCode::SUCCESS)
    })
}

/// Exit codes for recover: 0 = update applied, 2 = no-op (already terminal
/// or the worker finished first), 1 = failed outright
#[allow(clippy::too_many_arguments)]
fn recover_command(
    config_path: PathBuf,
    action: RecoverAction,
    target_id: Option<String>,
    voice_id: Option<String>,
    parent: Option<String>,
    timeout_secs: Option<u64>,
    audio_url: Option<String>,
    reason: Option<String>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = TrackerConfig::load(&config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = open_store(&config).await?;
        let now_ms = Utc::now().timestamp_millis();

        if let Some(parent_id) = parent {
            // Story-wide sweep: only force-fail makes sense in bulk, since
            // force-complete needs a per-job artifact location
            if matches!(action, RecoverAction::ForceComplete) {
                return Err("--parent sweeps only support force-fail".into());
            }
            let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.stuck_timeout_secs));
            let reason = reason.as_deref().unwrap_or(TIMED_OUT_ERROR);
            println!("Resetting stuck jobs for story: {}", parent_id);
            let outcomes =
                recover::force_fail_stuck_under_parent(&store, &parent_id, timeout, reason, now_ms)
                    .await?;
            if outcomes.is_empty() {
                println!("No stuck jobs found.");
                return Ok(ExitCode::from(2));
            }
            let mut applied = 0;
            for (key, outcome) in &outcomes {
                match outcome {
                    RecoveryOutcome::Applied { prior, new } => {
                        applied += 1;
                        println!("Updated job {}: {} -> {}", key, prior, new);
                    }
                    RecoveryOutcome::AlreadyInTargetState => {
                        println!("Job {} already ERROR, skipped", key);
                    }
                    RecoveryOutcome::NoLongerProcessing { actual } => {
                        println!("Job {} no longer PROCESSING (now {}), skipped", key, actual);
                    }
                }
            }
            println!("Done. {} of {} updated.", applied, outcomes.len());
            return Ok(if applied > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            });
        }

        let target_id = target_id.ok_or("either --target-id or --parent is required")?;
        let key = JobKey {
            target_id,
            voice_id,
        };

        let outcome = match action {
            RecoverAction::ForceComplete => {
                let url = audio_url.ok_or("--audio-url is required for force-complete")?;
                recover::force_complete(&store, &key, &url, now_ms).await?
            }
            RecoverAction::ForceFail => {
                let reason = reason.as_deref().unwrap_or(TIMED_OUT_ERROR);
                recover::force_fail(&store, &key, reason, now_ms).await?
            }
        };

        match outcome {
            RecoveryOutcome::Applied { prior, new } => {
                println!("Updated job {}: {} -> {}", key, prior, new);
                Ok(ExitCode::SUCCESS)
            }
            RecoveryOutcome::AlreadyInTargetState => {
                println!("Job {} is already in the requested state, nothing to do.", key);
                Ok(ExitCode::from(2))
            }
            RecoveryOutcome::NoLongerProcessing { actual } => {
                println!(
                    "Job {} left PROCESSING before recovery (now {}), leaving as-is.",
                    key, actual
                );
                Ok(ExitCode::from(2))
            }
        }
    })
}

fn serve_command(
    config_path: PathBuf,
    port: Option<u16>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = TrackerConfig::load(&config_path)?;
    let port = port.unwrap_or(config.api_port);
    serve::serve_status(&config, port)?;
    Ok(ExitCode::SUCCESS)
}
