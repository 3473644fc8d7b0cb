use std::sync::Arc;

use scenewatch_api::ExtractResponse;
use scenewatch_api_client::ResourceGateway;

use crate::SyncOptions;
use crate::confirm::Confirm;
use crate::error::{Result, SyncError};
use crate::generation::Outcome;
use crate::jobs::JobStore;
use crate::scenes::SceneStore;

/// A job store and a scene store sharing one gateway. Every job selection
/// change re-scopes the scene store, so scenes never outlive their job.
pub struct Workspace<G> {
    jobs: JobStore<G>,
    scenes: SceneStore<G>,
}

impl<G> Clone for Workspace<G> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            scenes: self.scenes.clone(),
        }
    }
}

impl<G: ResourceGateway> Workspace<G> {
    pub fn new(gateway: Arc<G>, confirm: Arc<dyn Confirm>, options: SyncOptions) -> Self {
        let jobs = JobStore::new(Arc::clone(&gateway), confirm, options.clone());
        let scenes = SceneStore::new(gateway, options);

        let scoped = scenes.clone();
        jobs.on_selection_change(move |job_id| scoped.reset_for_job(job_id));

        Self { jobs, scenes }
    }

    pub fn jobs(&self) -> &JobStore<G> {
        &self.jobs
    }

    pub fn scenes(&self) -> &SceneStore<G> {
        &self.scenes
    }

    pub async fn refresh_jobs(&self) -> Result<Outcome<()>> {
        self.jobs.refresh_list().await
    }

    pub async fn select_job(&self, job_id: &str) -> Result<Outcome<()>> {
        self.jobs.select(job_id).await
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<Outcome<()>> {
        self.jobs.delete(job_id).await
    }

    /// Start extraction for a job and make sure its progress is observed.
    pub async fn trigger_extraction(&self, job_id: &str) -> Result<Option<ExtractResponse>> {
        let response = self.jobs.trigger_extraction(job_id).await?;
        if response.is_some() && self.jobs.selected().as_deref() == Some(job_id) {
            self.jobs.ensure_polling();
        }
        Ok(response)
    }

    /// Load the scenes of the selected job.
    pub async fn open_scenes(&self) -> Result<Outcome<()>> {
        let job_id = self.jobs.selected().ok_or(SyncError::NoJobSelected)?;
        self.scenes.load_for_job(&job_id).await
    }

    /// Stop polling and discard every in-flight response in both stores.
    pub fn unmount(&self) {
        self.jobs.unmount();
        self.scenes.unmount();
    }
}
