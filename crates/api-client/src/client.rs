use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use scenewatch_api::*;

use crate::error::ApiError;

/// Typed HTTP client for the SceneWatch API.
///
/// The base URL is fixed at construction; every path below is appended to it
/// verbatim (`{base}/jobs/...`).
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an image locator returned by the server for display.
    pub fn asset_url(&self, url: &str) -> String {
        resolve_asset_url(&self.base_url, url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Jobs ──────────────────────────────────────────────────────────────

    pub async fn list_jobs(&self) -> Result<JobListResponse, ApiError> {
        let resp = self.client.get(self.url("/jobs")).send().await?;
        parse_response(resp).await
    }

    /// Upload a video and create a job for it.
    pub async fn create_job(&self, video: &Path, req: &CreateJobRequest) -> Result<Job, ApiError> {
        let bytes = tokio::fs::read(video).await.map_err(|source| ApiError::Io {
            path: video.to_path_buf(),
            source,
        })?;
        let file_name = video
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(video_mime(video))?;
        let mut form = Form::new().part("video", part);
        for (name, value) in req.form_fields() {
            form = form.text(name, value);
        }

        let resp = self
            .client
            .post(self.url("/jobs"))
            .multipart(form)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/jobs/{}", segment(job_id))))
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Remove a job together with its snapshots and scenes.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.url(&format!("/jobs/{}", segment(job_id))))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    pub async fn list_snapshots(
        &self,
        job_id: &str,
        query: &SnapshotQuery,
    ) -> Result<SnapshotListResponse, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/jobs/{}/snapshots", segment(job_id))))
            .query(query)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Start (or continue) extraction. Progress is observed by polling the job.
    pub async fn run_extract(&self, job_id: &str) -> Result<ExtractResponse, ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/jobs/{}/extract", segment(job_id))))
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Scenes ────────────────────────────────────────────────────────────

    pub async fn list_scenes(&self, job_id: &str) -> Result<SceneListResponse, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/jobs/{}/scenes", segment(job_id))))
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn build_scenes(&self, job_id: &str) -> Result<BuildScenesResponse, ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/jobs/{}/scenes/build", segment(job_id))))
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn get_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> Result<SceneDetail, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!(
                "/jobs/{}/scenes/{}",
                segment(job_id),
                segment(scene_id)
            )))
            .query(&[("keyframes", keyframes)])
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn describe_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> Result<DescribeSceneResponse, ApiError> {
        let resp = self
            .client
            .post(self.url(&format!(
                "/jobs/{}/scenes/{}/describe",
                segment(job_id),
                segment(scene_id)
            )))
            .query(&[("keyframes", keyframes)])
            .send()
            .await?;
        parse_response(resp).await
    }
}

fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}

fn video_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Return the response unchanged on 2xx, or an error carrying the status and body text.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let url = resp.url().clone();
        let body = resp.text().await.unwrap_or_default();
        debug!("{url} rejected with {status}");
        return Err(ApiError::Status { status, body });
    }
    Ok(resp)
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let resp = ensure_success(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_mime_follows_extension() {
        assert_eq!(video_mime(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(video_mime(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(video_mime(Path::new("clip")), "application/octet-stream");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::with_client(reqwest::Client::new(), "http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/jobs"), "http://localhost:8000/jobs");
        assert_eq!(
            client.asset_url("/storage/a.jpg"),
            "http://localhost:8000/storage/a.jpg"
        );
    }

    #[test]
    fn ids_are_percent_encoded_in_paths() {
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
        assert_eq!(segment("0b7c-11"), "0b7c-11");
    }
}
