use chrono::{DateTime, Utc};
use scenewatch_api::{Job, JobConfig, Scene, SceneDetail};

/// `mm:ss.t` position within a video.
pub fn format_clock(sec: f64) -> String {
    let tenths = (sec.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rest = tenths % 600;
    format!("{:02}:{:02}.{}", minutes, rest / 10, rest % 10)
}

pub fn format_created(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Shorten `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

pub fn job_header() -> String {
    format!(
        "{:<36}  {:<10}  {:>9}  {}",
        "JOB", "STATUS", "SNAPSHOTS", "CREATED"
    )
}

pub fn job_row(job: &Job) -> String {
    format!(
        "{:<36}  {:<10}  {:>9}  {}",
        job.job_id,
        job.status.as_str(),
        job.snapshot_count,
        format_created(&job.created_at)
    )
}

pub fn config_summary(config: &JobConfig) -> String {
    let mut parts = vec![format!("{} fps", config.sampling_fps)];
    match config.resize_width {
        Some(width) => parts.push(format!("width {width}")),
        None => parts.push("original size".to_string()),
    }
    parts.push(config.image_format.to_string());
    if config.grayscale {
        parts.push("grayscale".to_string());
    }
    if config.black_white {
        parts.push("black/white".to_string());
    }
    parts.join(", ")
}

pub fn job_details(job: &Job) -> Vec<String> {
    let mut lines = vec![
        format!("Job:       {}", job.job_id),
        format!("Status:    {}", job.status),
        format!("Created:   {}", format_created(&job.created_at)),
        format!("Snapshots: {}", job.snapshot_count),
    ];
    if let Some(config) = &job.config {
        lines.push(format!("Sampling:  {}", config_summary(config)));
    }
    lines
}

/// One line of `watch` output.
pub fn progress_line(job: &Job, loaded_snapshots: usize) -> String {
    let mut line = format!("{} {} - {} snapshots", job.job_id, job.status, job.snapshot_count);
    if loaded_snapshots as u64 != job.snapshot_count {
        line.push_str(&format!(" ({loaded_snapshots} loaded)"));
    }
    line
}

pub fn scene_row(scene: &Scene, selected: bool) -> String {
    let marker = if selected { '*' } else { ' ' };
    let description = scene.short_description.as_deref().unwrap_or("-");
    format!(
        "{marker} {:<12}  {} - {}  {:>6.1}s  {:>4} snapshots  {}",
        scene.scene_id,
        format_clock(scene.start_sec),
        format_clock(scene.end_sec),
        scene.duration_sec(),
        scene.snapshot_count,
        truncate(description, 60)
    )
}

pub fn scene_details(detail: &SceneDetail) -> Vec<String> {
    vec![
        format!("Scene:       {}", detail.scene_id),
        format!(
            "Range:       {} - {}",
            format_clock(detail.start_sec),
            format_clock(detail.end_sec)
        ),
        format!(
            "Description: {}",
            detail.short_description.as_deref().unwrap_or("(none)")
        ),
        format!(
            "Keyframes:   {} of {} snapshots",
            detail.keyframes_count, detail.snapshots_total
        ),
    ]
}
