use anyhow::{Context, Result, bail};
use scenewatch_api::{CreateJobRequest, ImageFormat, JobConfig};
use scenewatch_sync::SyncError;
use std::path::Path;

use crate::app::App;
use crate::output;
use crate::watch;

/// Sampling settings collected from `scenewatch new`.
#[derive(Debug, Clone)]
pub struct NewJobOptions {
    pub fps: f64,
    pub resize_width: Option<u32>,
    pub grayscale: bool,
    pub black_white: bool,
    pub format: ImageFormat,
    pub extract: bool,
}

impl NewJobOptions {
    fn into_request(self) -> CreateJobRequest {
        CreateJobRequest {
            config: JobConfig {
                sampling_fps: self.fps,
                resize_width: self.resize_width,
                grayscale: self.grayscale,
                black_white: self.black_white,
                image_format: self.format,
                ..JobConfig::default()
            },
            run_extract: self.extract,
        }
    }
}

pub async fn run_jobs(app: &App) -> Result<()> {
    let ws = app.workspace();
    let result = ws.refresh_jobs().await;
    ws.unmount();
    result.context("Failed to list jobs")?;

    let view = ws.jobs().view();
    if view.jobs.is_empty() {
        println!("No jobs on {}", app.client.base_url());
        return Ok(());
    }

    println!("{}", output::job_header());
    for job in &view.jobs {
        println!("{}", output::job_row(job));
    }
    Ok(())
}

pub async fn run_show(app: &App, job_id: &str, urls: bool) -> Result<()> {
    let ws = app.workspace();
    let result = ws.select_job(job_id).await;
    ws.unmount();
    result.with_context(|| format!("Failed to load job {job_id}"))?;

    let view = ws.jobs().view();
    let Some(job) = view.detail else {
        bail!("job {job_id} is not available");
    };

    for line in output::job_details(&job) {
        println!("{line}");
    }
    if view.snapshots.is_empty() {
        return Ok(());
    }

    println!();
    for snapshot in &view.snapshots {
        let mut line = format!(
            "  {}  {}",
            output::format_clock(snapshot.timestamp_sec),
            snapshot.snapshot_id
        );
        if let (Some(width), Some(height)) = (snapshot.width, snapshot.height) {
            line.push_str(&format!("  {width}x{height}"));
        }
        if urls {
            line.push_str(&format!("  {}", app.client.asset_url(&snapshot.url)));
        }
        println!("{line}");
    }
    Ok(())
}

pub async fn run_new(app: &App, video: &Path, options: NewJobOptions) -> Result<()> {
    if !video.is_file() {
        bail!("video file not found: {}", video.display());
    }

    let follow = options.extract;
    let request = options.into_request();
    let job = app
        .client
        .create_job(video, &request)
        .await
        .with_context(|| format!("Failed to upload {}", video.display()))?;

    println!(
        "Created job {} ({})",
        job.job_id,
        output::config_summary(&request.config)
    );

    if follow {
        watch::follow_job(app, &job.job_id).await
    } else {
        println!("Run `scenewatch extract {}` to start extraction.", job.job_id);
        Ok(())
    }
}

pub async fn run_extract(app: &App, job_id: &str, follow: bool) -> Result<()> {
    let ws = app.workspace();
    if let Err(e) = ws.select_job(job_id).await {
        ws.unmount();
        return Err(e).with_context(|| format!("Failed to load job {job_id}"));
    }

    let response = match ws.trigger_extraction(job_id).await {
        Ok(response) => response,
        Err(e) => {
            ws.unmount();
            return Err(e).with_context(|| format!("Failed to start extraction for {job_id}"));
        }
    };

    match response {
        Some(response) => println!("Extraction {} for job {}", response.status, response.job_id),
        None => println!("Extraction already requested for job {job_id}"),
    }

    if follow {
        watch::follow(&ws, job_id).await
    } else {
        ws.unmount();
        Ok(())
    }
}

pub async fn run_delete(app: &App, job_id: &str) -> Result<()> {
    let ws = app.workspace();
    let result = ws.delete_job(job_id).await;
    ws.unmount();

    match result {
        Ok(_) => {}
        Err(SyncError::ConfirmationDeclined) => {
            println!("Cancelled.");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to delete job {job_id}")),
    }

    println!("Deleted job {job_id}");
    let view = ws.jobs().view();
    if view.jobs.is_empty() {
        println!("No jobs left on {}", app.client.base_url());
    } else {
        println!("{} job(s) remaining", view.jobs.len());
    }
    Ok(())
}
