#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::DateTime;
use scenewatch_api::{
    BuildScenesResponse, DescribeSceneResponse, ExtractResponse, Job, JobStatus, Scene,
    SceneDetail, Snapshot, SnapshotQuery,
};
use scenewatch_api_client::{ApiError, ResourceGateway, StatusCode};
use scenewatch_sync::{AssumeYes, Confirm, JobStore, SceneStore, SyncOptions, Workspace};
use tokio::sync::{Notify, Semaphore};

/// Holds a gateway call until the test releases it.
pub struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    /// Wait until a call reached the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one held call continue.
    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Default)]
struct FakeState {
    jobs: Vec<Job>,
    snapshots: HashMap<String, Vec<Snapshot>>,
    scenes: HashMap<String, Vec<Scene>>,
    built: HashMap<String, Vec<Scene>>,
    descriptions: HashMap<String, String>,
    failing: HashSet<String>,
    calls: HashMap<String, usize>,
    gates: HashMap<String, Arc<Gate>>,
}

/// In-memory server. Call keys are `op` or `op:job` / `op:job/scene`,
/// e.g. `get_job:A` or `describe_scene:A/s1`; counters exist for both the
/// bare op and the full key.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn with_jobs(jobs: Vec<Job>) -> Arc<Self> {
        let gateway = Self::default();
        gateway.state().jobs = jobs;
        Arc::new(gateway)
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake gateway lock")
    }

    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        let mut state = self.state();
        if let Some(job) = state.jobs.iter_mut().find(|job| job.job_id == job_id) {
            job.status = status;
        }
    }

    pub fn remove_job(&self, job_id: &str) {
        self.state().jobs.retain(|job| job.job_id != job_id);
    }

    pub fn set_snapshots(&self, job_id: &str, snapshots: Vec<Snapshot>) {
        self.state().snapshots.insert(job_id.to_string(), snapshots);
    }

    pub fn set_scenes(&self, job_id: &str, scenes: Vec<Scene>) {
        self.state().scenes.insert(job_id.to_string(), scenes);
    }

    /// Scenes that `build_scenes` produces for a job.
    pub fn set_built_scenes(&self, job_id: &str, scenes: Vec<Scene>) {
        self.state().built.insert(job_id.to_string(), scenes);
    }

    pub fn set_description(&self, scene_id: &str, text: &str) {
        self.state()
            .descriptions
            .insert(scene_id.to_string(), text.to_string());
    }

    /// Make every call matching `key` (bare op or full key) fail with 503.
    pub fn fail(&self, key: &str) {
        self.state().failing.insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.state().failing.remove(key);
    }

    pub fn calls(&self, key: &str) -> usize {
        self.state().calls.get(key).copied().unwrap_or(0)
    }

    /// Hold every call matching the full `key` until released.
    pub fn gate(&self, key: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.state().gates.insert(key.to_string(), Arc::clone(&gate));
        gate
    }

    async fn begin(&self, op: &str, key: String) -> Result<(), ApiError> {
        let gate = {
            let mut state = self.state();
            *state.calls.entry(key.clone()).or_default() += 1;
            if key != op {
                *state.calls.entry(op.to_string()).or_default() += 1;
            }
            state.gates.get(&key).cloned()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let state = self.state();
        if state.failing.contains(&key) || state.failing.contains(op) {
            return Err(status_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable"));
        }
        Ok(())
    }
}

impl ResourceGateway for FakeGateway {
    async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
        self.begin("list_jobs", "list_jobs".to_string()).await?;
        Ok(self.state().jobs.clone())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, ApiError> {
        self.begin("get_job", format!("get_job:{job_id}")).await?;
        self.state()
            .jobs
            .iter()
            .find(|job| job.job_id == job_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), ApiError> {
        self.begin("delete_job", format!("delete_job:{job_id}")).await?;
        let mut state = self.state();
        let before = state.jobs.len();
        state.jobs.retain(|job| job.job_id != job_id);
        if state.jobs.len() == before {
            return Err(not_found());
        }
        state.snapshots.remove(job_id);
        state.scenes.remove(job_id);
        Ok(())
    }

    async fn list_snapshots(
        &self,
        job_id: &str,
        _query: &SnapshotQuery,
    ) -> Result<Vec<Snapshot>, ApiError> {
        self.begin("list_snapshots", format!("list_snapshots:{job_id}"))
            .await?;
        let state = self.state();
        if !state.jobs.iter().any(|job| job.job_id == job_id) {
            return Err(not_found());
        }
        Ok(state.snapshots.get(job_id).cloned().unwrap_or_default())
    }

    async fn trigger_extraction(&self, job_id: &str) -> Result<ExtractResponse, ApiError> {
        self.begin("trigger_extraction", format!("trigger_extraction:{job_id}"))
            .await?;
        let mut state = self.state();
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.job_id == job_id)
            .ok_or_else(not_found)?;
        job.status = JobStatus::Extracting;
        Ok(ExtractResponse {
            job_id: job_id.to_string(),
            status: "extracting".to_string(),
        })
    }

    async fn list_scenes(&self, job_id: &str) -> Result<Vec<Scene>, ApiError> {
        self.begin("list_scenes", format!("list_scenes:{job_id}"))
            .await?;
        Ok(self.state().scenes.get(job_id).cloned().unwrap_or_default())
    }

    async fn build_scenes(&self, job_id: &str) -> Result<BuildScenesResponse, ApiError> {
        self.begin("build_scenes", format!("build_scenes:{job_id}"))
            .await?;
        let mut state = self.state();
        let scenes = state.built.get(job_id).cloned().unwrap_or_default();
        let created = scenes.len() as u64;
        state.scenes.insert(job_id.to_string(), scenes);
        Ok(BuildScenesResponse {
            job_id: job_id.to_string(),
            status: "done".to_string(),
            scenes_created: created,
        })
    }

    async fn get_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        keyframes: usize,
    ) -> Result<SceneDetail, ApiError> {
        self.begin("get_scene", format!("get_scene:{job_id}/{scene_id}"))
            .await?;
        let state = self.state();
        let scene = state
            .scenes
            .get(job_id)
            .and_then(|scenes| scenes.iter().find(|scene| scene.scene_id == scene_id))
            .ok_or_else(not_found)?;
        let snapshots = state.snapshots.get(job_id).cloned().unwrap_or_default();
        let total = snapshots.len();
        let keyframes: Vec<Snapshot> = snapshots.into_iter().take(keyframes).collect();
        Ok(SceneDetail {
            scene_id: scene.scene_id.clone(),
            start_sec: scene.start_sec,
            end_sec: scene.end_sec,
            keyframes_count: keyframes.len(),
            keyframes,
            snapshots_total: total,
            short_description: scene.short_description.clone(),
        })
    }

    async fn describe_scene(
        &self,
        job_id: &str,
        scene_id: &str,
        _keyframes: usize,
    ) -> Result<DescribeSceneResponse, ApiError> {
        self.begin("describe_scene", format!("describe_scene:{job_id}/{scene_id}"))
            .await?;
        let short_description = self
            .state()
            .descriptions
            .get(scene_id)
            .cloned()
            .unwrap_or_else(|| format!("scene {scene_id}"));
        Ok(DescribeSceneResponse { short_description })
    }
}

fn status_error(status: StatusCode, detail: &str) -> ApiError {
    ApiError::Status {
        status,
        body: format!("{{\"detail\":\"{detail}\"}}"),
    }
}

fn not_found() -> ApiError {
    status_error(StatusCode::NOT_FOUND, "not found")
}

/// Rejects every confirmation prompt.
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _message: &str) -> bool {
        false
    }
}

// ── Fixtures ───────────────────────────────────────────────────────────────

pub fn job(job_id: &str, status: JobStatus) -> Job {
    Job {
        job_id: job_id.to_string(),
        status,
        created_at: DateTime::from_timestamp(1_714_566_600, 0).expect("valid timestamp"),
        snapshot_count: 0,
        config: None,
    }
}

pub fn scene(scene_id: &str, start_sec: f64, end_sec: f64) -> Scene {
    Scene {
        scene_id: scene_id.to_string(),
        start_sec,
        end_sec,
        snapshot_count: 0,
        short_description: None,
    }
}

pub fn snapshot(snapshot_id: &str, timestamp_sec: f64) -> Snapshot {
    Snapshot {
        snapshot_id: snapshot_id.to_string(),
        timestamp_sec,
        url: format!("/storage/{snapshot_id}.jpg"),
        width: Some(512),
        height: Some(288),
    }
}

pub fn job_store(gateway: &Arc<FakeGateway>) -> JobStore<FakeGateway> {
    JobStore::new(Arc::clone(gateway), Arc::new(AssumeYes), SyncOptions::default())
}

pub fn scene_store(gateway: &Arc<FakeGateway>) -> SceneStore<FakeGateway> {
    SceneStore::new(Arc::clone(gateway), SyncOptions::default())
}

pub fn workspace(gateway: &Arc<FakeGateway>) -> Workspace<FakeGateway> {
    Workspace::new(Arc::clone(gateway), Arc::new(AssumeYes), SyncOptions::default())
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
