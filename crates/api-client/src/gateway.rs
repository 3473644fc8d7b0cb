use std::future::Future;

use scenewatch_api::{
    BuildScenesResponse, DescribeSceneResponse, ExtractResponse, Job, Scene, SceneDetail,
    Snapshot, SnapshotQuery,
};

use crate::client::ApiClient;
use crate::error::ApiError;

/// The reads and actions the synchronization stores need from the server.
///
/// `ApiClient` is the production implementation; tests substitute an
/// in-memory fake. Futures must be `Send` because poll steps run on spawned
/// tasks.
pub trait ResourceGateway: Send + Sync + 'static {
    fn list_jobs(&self) -> impl Future<Output = Result<Vec<Job>, ApiError>> + Send;

    fn get_job(&self, job_id: &str) -> impl Future<Output = Result<Job, ApiError>> + Send;

    fn delete_job(&self, job_id: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_snapshots(
        &self,
        job_id: &str,
        query: &SnapshotQuery,
    ) -> impl Future<Output = Result<Vec<Snapshot>, ApiError>> + Send;

    fn trigger_extraction(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<ExtractResponse, ApiError>> + Send;

    fn list_scenes(&self, job_id: &str)
    -> impl Future<Output = Result<Vec<Scene>, ApiError>> + Send;

    fn build_scenes(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<BuildScenesResponse, ApiError>> + Send;

    fn get_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> impl Future<Output = Result<SceneDetail, ApiError>> + Send;

    fn describe_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> impl Future<Output = Result<DescribeSceneResponse, ApiError>> + Send;
}

impl ResourceGateway for ApiClient {
    async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
        Ok(ApiClient::list_jobs(self).await?.jobs)
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, ApiError> {
        ApiClient::get_job(self, job_id).await
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), ApiError> {
        ApiClient::delete_job(self, job_id).await
    }

    async fn list_snapshots(
        &self,
        job_id: &str,
        query: &SnapshotQuery,
    ) -> Result<Vec<Snapshot>, ApiError> {
        Ok(ApiClient::list_snapshots(self, job_id, query).await?.snapshots)
    }

    async fn trigger_extraction(&self, job_id: &str) -> Result<ExtractResponse, ApiError> {
        self.run_extract(job_id).await
    }

    async fn list_scenes(&self, job_id: &str) -> Result<Vec<Scene>, ApiError> {
        Ok(ApiClient::list_scenes(self, job_id).await?.scenes)
    }

    async fn build_scenes(&self, job_id: &str) -> Result<BuildScenesResponse, ApiError> {
        ApiClient::build_scenes(self, job_id).await
    }

    async fn get_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> Result<SceneDetail, ApiError> {
        ApiClient::get_scene(self, job_id, scene_id, keyframes).await
    }

    async fn describe_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> Result<DescribeSceneResponse, ApiError> {
        ApiClient::describe_scene(self, job_id, scene_id, keyframes).await
    }
}
