//! Wire types for the SceneWatch video analysis API.
//!
//! This crate is the **single source of truth** for every request/response
//! body the client exchanges with the server. It carries no I/O; the HTTP
//! client lives in `scenewatch-api-client`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned job identifier. Opaque to the client.
pub type JobId = String;

/// Server-assigned scene identifier. Opaque to the client.
pub type SceneId = String;

/// Keyframes requested for a scene detail when the caller does not say otherwise.
pub const DEFAULT_KEYFRAMES: usize = 8;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Lifecycle status of a job as reported by the processing pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Uploaded,
    Extracting,
    Done,
    Error,
    /// A status this client does not know about. Treated as terminal.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// True once the pipeline will not move the job any further.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// True while the pipeline may still change the job (`created`, `uploaded`, `extracting`).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Created | Self::Uploaded | Self::Extracting)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image encoding used for extracted snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            other => Err(format!("unsupported image format '{other}' (expected jpg or png)")),
        }
    }
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// Extraction settings fixed when a job is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    #[serde(default = "default_sampling_fps")]
    pub sampling_fps: f64,
    #[serde(default = "default_chunk_length_sec")]
    pub chunk_length_sec: u32,
    #[serde(default)]
    pub resize_width: Option<u32>,
    #[serde(default)]
    pub grayscale: bool,
    #[serde(default)]
    pub black_white: bool,
    #[serde(default)]
    pub image_format: ImageFormat,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            sampling_fps: default_sampling_fps(),
            chunk_length_sec: default_chunk_length_sec(),
            resize_width: Some(512),
            grayscale: false,
            black_white: false,
            image_format: ImageFormat::Jpg,
        }
    }
}

fn default_sampling_fps() -> f64 {
    1.0
}

fn default_chunk_length_sec() -> u32 {
    10
}

/// One video analysis task.
///
/// `config` is only present on the detail endpoint; list entries omit it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub snapshot_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<JobConfig>,
}

/// Returned by `GET /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobListResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Multipart fields sent alongside the video file on `POST /jobs`.
#[derive(Debug, Clone, Default)]
pub struct CreateJobRequest {
    pub config: JobConfig,
    /// Ask the server to start extraction as soon as the upload lands.
    pub run_extract: bool,
}

impl CreateJobRequest {
    /// Text form fields in the order the server documents them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("sampling_fps", self.config.sampling_fps.to_string())];
        if let Some(width) = self.config.resize_width {
            fields.push(("resize_width", width.to_string()));
        }
        fields.push(("grayscale", self.config.grayscale.to_string()));
        fields.push(("black_white", self.config.black_white.to_string()));
        fields.push(("image_format", self.config.image_format.to_string()));
        fields.push(("run_extract", self.run_extract.to_string()));
        fields
    }
}

/// Returned by `POST /jobs/{id}/extract`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractResponse {
    pub job_id: JobId,
    pub status: String,
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// One extracted frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub timestamp_sec: f64,
    /// Relative (`/storage/...`) or absolute locator of the image.
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Returned by `GET /jobs/{id}/snapshots`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotListResponse {
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

/// Pagination for `GET /jobs/{id}/snapshots`. Unset fields are left to the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SnapshotQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

// ─── Scenes ──────────────────────────────────────────────────────────────────

/// A contiguous time range of a job's video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub scene_id: SceneId,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default)]
    pub snapshot_count: u64,
    #[serde(default, alias = "description")]
    pub short_description: Option<String>,
}

impl Scene {
    pub fn duration_sec(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// Returned by `GET /jobs/{id}/scenes`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SceneListResponse {
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

/// Returned by `GET /jobs/{id}/scenes/{scene_id}`: a scene plus a capped,
/// ordered sample of its snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneDetail {
    pub scene_id: SceneId,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default)]
    pub keyframes: Vec<Snapshot>,
    #[serde(default)]
    pub keyframes_count: usize,
    #[serde(default)]
    pub snapshots_total: usize,
    #[serde(default, alias = "description")]
    pub short_description: Option<String>,
}

/// Returned by `POST /jobs/{id}/scenes/build`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildScenesResponse {
    pub job_id: JobId,
    pub status: String,
    #[serde(default)]
    pub scenes_created: u64,
}

/// Returned by `POST /jobs/{id}/scenes/{scene_id}/describe`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescribeSceneResponse {
    #[serde(alias = "description")]
    pub short_description: String,
}

// ─── Utilities ───────────────────────────────────────────────────────────────

/// Resolve an asset locator returned by the server against the API base.
///
/// Absolute `http://` / `https://` URLs pass through unchanged.
pub fn resolve_asset_url(base_url: &str, url: &str) -> String {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

/// Timestamps arrive either as RFC 3339 or as naive UTC (`2024-05-01T12:30:00.123456`).
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
