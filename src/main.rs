use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use aimaster::cli::{Cli, Command};
use aimaster::config::AppConfig;
use aimaster::repository::{HttpJobRepository, JobRepository};
use aimaster::ui::{self, JobBoard};
use aimaster::usecases::UseCases;
use aimaster::{JobEvent, JobTracker};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load()?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    if let Some(secs) = cli.interval {
        config.poll_interval_secs = secs;
    }
    if let Some(retries) = cli.max_poll_retries {
        config.max_poll_retries = retries;
    }

    let repo: Arc<dyn JobRepository> = Arc::new(HttpJobRepository::new(config.client()?));

    match cli.command {
        Command::Submit { file, name } => submit(repo, &config, &file, name).await,
        Command::Status { job_id } => {
            let job = UseCases::new(repo).status.execute(&job_id).await?;
            ui::print_job(&job);
            Ok(())
        }
        Command::Watch { job_ids } => watch(repo, &config, &job_ids).await,
        Command::Download { audio_id } => {
            let url = UseCases::new(repo).download.execute(&audio_id).await?;
            println!("{url}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "aimaster=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn submit(
    repo: Arc<dyn JobRepository>,
    config: &AppConfig,
    file: &Path,
    name: Option<String>,
) -> Result<()> {
    let file_name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("cannot derive a file name from the path; pass --name")?,
    };

    let tracker = JobTracker::new(repo, config.tracker_config());
    let mut events = tracker.subscribe();
    let job_id = tracker
        .submit_and_track(&file.to_string_lossy(), &file_name)
        .await?;

    follow(&tracker, &mut events).await?;

    let job = tracker.get(&job_id)?;
    if job.output_audio_id().is_none() {
        bail!("mastering job {job_id} did not succeed ({})", job.status);
    }
    let url = tracker.download_reference(&job_id).await?;
    println!("{url}");
    Ok(())
}

async fn watch(repo: Arc<dyn JobRepository>, config: &AppConfig, job_ids: &[String]) -> Result<()> {
    let lookup = UseCases::new(repo.clone());
    let tracker = JobTracker::new(repo, config.tracker_config());
    let mut events = tracker.subscribe();

    for job_id in job_ids {
        let job = lookup.status.execute(job_id).await?;
        tracker.track(job)?;
    }

    follow(&tracker, &mut events).await?;

    let unfinished: Vec<String> = tracker
        .get_tracked_jobs()
        .into_iter()
        .filter(|job| job.output_audio_id().is_none())
        .map(|job| job.id)
        .collect();
    if !unfinished.is_empty() {
        bail!("{} job(s) did not succeed: {}", unfinished.len(), unfinished.join(", "));
    }
    Ok(())
}

/// Render events until no job is polling any more. Ctrl-C stops all polling.
async fn follow(tracker: &JobTracker, events: &mut broadcast::Receiver<JobEvent>) -> Result<()> {
    let mut board = JobBoard::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracker.stop_all();
                bail!("interrupted; polling stopped");
            }
            event = events.recv() => match event {
                Ok(event) => board.handle(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "progress display fell behind");
                    board.note(&format!("skipped {skipped} progress updates"));
                }
                Err(RecvError::Closed) => break,
            },
        }

        if tracker.active_count() == 0 {
            while let Ok(event) = events.try_recv() {
                board.handle(&event);
            }
            break;
        }
    }
    Ok(())
}
