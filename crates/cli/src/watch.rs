use anyhow::{Context, Result, bail};
use chrono::Local;
use scenewatch_api::JobStatus;
use scenewatch_api_client::ApiClient;
use scenewatch_sync::{JobView, Workspace};

use crate::app::App;
use crate::output;

/// Follow `job_id`, or the first job on the server when none is given.
pub async fn run_watch(app: &App, job_id: Option<String>) -> Result<()> {
    let ws = app.workspace();
    let loaded = match &job_id {
        Some(id) => ws.select_job(id).await,
        None => ws.refresh_jobs().await,
    };
    if let Err(e) = loaded {
        ws.unmount();
        return Err(e).context("Failed to load job");
    }

    let Some(selected) = ws.jobs().selected() else {
        ws.unmount();
        bail!("No jobs on the server");
    };
    follow(&ws, &selected).await
}

/// Select `job_id` on a fresh workspace and follow it until it settles.
pub async fn follow_job(app: &App, job_id: &str) -> Result<()> {
    let ws = app.workspace();
    if let Err(e) = ws.select_job(job_id).await {
        ws.unmount();
        return Err(e).with_context(|| format!("Failed to load job {job_id}"));
    }
    ws.jobs().ensure_polling();
    follow(&ws, job_id).await
}

type Progress = (JobStatus, u64, usize);

fn progress_of(view: &JobView) -> Option<Progress> {
    view.detail
        .as_ref()
        .map(|job| (job.status, job.snapshot_count, view.snapshots.len()))
}

fn settle(view: &JobView, job_id: &str) -> Result<()> {
    match &view.detail {
        Some(job) if job.status == JobStatus::Error => {
            bail!("job {job_id} failed during extraction")
        }
        Some(_) => Ok(()),
        None => bail!("job {job_id} is no longer available"),
    }
}

/// Print a line per progress change of the selected job until polling stops
/// or the user interrupts. The workspace is unmounted on return.
pub async fn follow(ws: &Workspace<ApiClient>, job_id: &str) -> Result<()> {
    let mut rx = ws.jobs().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last: Option<Progress> = None;
    let result = loop {
        let view = rx.borrow_and_update().clone();

        let progress = progress_of(&view);
        if progress.is_some() && progress != last {
            if let Some(job) = &view.detail {
                println!(
                    "[{}] {}",
                    Local::now().format("%H:%M:%S"),
                    output::progress_line(job, view.snapshots.len())
                );
            }
            last = progress;
        }

        if !view.polling {
            break settle(&view, job_id);
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
            _ = &mut ctrl_c => {
                println!("Interrupted.");
                break Ok(());
            }
        }
    };

    ws.unmount();
    result
}
