use std::sync::{Arc, Mutex, MutexGuard};

use scenewatch_api::{BuildScenesResponse, JobId, Scene, SceneDetail, SceneId};
use scenewatch_api_client::{ApiError, ResourceGateway};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::SyncOptions;
use crate::error::{Result, SyncError};
use crate::generation::{Generation, Outcome, Ticket, guarded, lock};

/// Scenes of the job the store is scoped to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneView {
    pub job_id: Option<JobId>,
    pub scenes: Vec<Scene>,
    pub selected: Option<SceneId>,
    pub detail: Option<SceneDetail>,
    pub error: Option<String>,
    pub loading: bool,
    pub building: bool,
    pub describing: bool,
}

impl SceneView {
    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.scene_id == scene_id)
    }
}

struct SceneState {
    view: SceneView,
    /// Bumped whenever the store is re-scoped; guards job-level actions.
    scope: Generation,
    list: Generation,
    detail: Generation,
    tx: watch::Sender<SceneView>,
}

impl SceneState {
    fn publish(&self) {
        self.tx.send_replace(self.view.clone());
    }

    fn fail(&mut self, action: &str, err: &ApiError) {
        warn!("{action} failed: {err}");
        self.view.error = Some(err.to_string());
    }

    fn is_scoped_to(&self, job_id: &str) -> bool {
        self.view.job_id.as_deref() == Some(job_id)
    }

    fn choose_scene(&mut self, scene_id: &str) -> Ticket {
        if self.view.selected.as_deref() != Some(scene_id) {
            self.view.detail = None;
        }
        self.view.selected = Some(scene_id.to_string());
        self.detail.advance()
    }

    /// Store a fresh scene list. A selection that vanished is replaced by
    /// the first scene. Returns the scene whose detail should be loaded.
    fn apply_scenes(&mut self, scenes: Vec<Scene>) -> Option<(SceneId, Ticket)> {
        self.view.scenes = scenes;
        self.view.loading = false;

        if let Some(selected) = &self.view.selected {
            if self.view.scene(selected).is_some() {
                return None;
            }
            self.view.selected = None;
            self.view.detail = None;
            self.detail.advance();
        }
        let first = self.view.scenes.first()?.scene_id.clone();
        let ticket = self.choose_scene(&first);
        Some((first, ticket))
    }
}

struct Inner<G> {
    gateway: Arc<G>,
    options: SyncOptions,
    state: Mutex<SceneState>,
}

/// Keeps the scene list and the open scene detail of one job consistent.
///
/// Cloning is cheap and every clone drives the same store.
pub struct SceneStore<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for SceneStore<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: ResourceGateway> SceneStore<G> {
    pub fn new(gateway: Arc<G>, options: SyncOptions) -> Self {
        let (tx, _) = watch::channel(SceneView::default());
        let state = SceneState {
            view: SceneView::default(),
            scope: Generation::default(),
            list: Generation::default(),
            detail: Generation::default(),
            tx,
        };
        Self {
            inner: Arc::new(Inner {
                gateway,
                options,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SceneState> {
        lock(&self.inner.state)
    }

    pub fn view(&self) -> SceneView {
        self.state().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SceneView> {
        self.state().tx.subscribe()
    }

    /// Forget everything about the previous job and scope the store to
    /// `job_id`. Responses still in flight for the old scope are discarded.
    pub fn reset_for_job(&self, job_id: Option<&str>) {
        let mut state = self.state();
        state.scope.advance();
        state.list.advance();
        state.detail.advance();
        state.view = SceneView {
            job_id: job_id.map(str::to_string),
            ..SceneView::default()
        };
        state.publish();
        debug!("scene store scoped to {job_id:?}");
    }

    /// Scope the store to `job_id` and fetch its scenes.
    pub async fn load_for_job(&self, job_id: &str) -> Result<Outcome<()>> {
        self.reset_for_job(Some(job_id));
        self.refresh_scenes(job_id).await
    }

    /// Fetch the scene list. Selects the first scene when nothing is
    /// selected. Stale when the store is not scoped to `job_id`.
    pub async fn refresh_scenes(&self, job_id: &str) -> Result<Outcome<()>> {
        let ticket = {
            let mut state = self.state();
            if !state.is_scoped_to(job_id) {
                debug!("ignoring scene refresh for unscoped job {job_id}");
                return Ok(Outcome::Stale);
            }
            state.view.loading = true;
            state.view.error = None;
            state.publish();
            state.list.advance()
        };

        let outcome = guarded(
            &self.inner.state,
            |s| &s.list,
            ticket,
            self.inner.gateway.list_scenes(job_id),
            |state, result| {
                let next = match result {
                    Ok(scenes) => Ok(state.apply_scenes(scenes)),
                    Err(err) => {
                        state.view.loading = false;
                        state.fail("loading scenes", &err);
                        Err(err)
                    }
                };
                state.publish();
                next
            },
        )
        .await
        .transpose()?;

        if let Outcome::Applied(Some((scene_id, ticket))) = &outcome {
            self.load_detail(job_id, scene_id, *ticket).await?;
        }
        Ok(outcome.map(|_| ()))
    }

    /// Open `scene_id` and fetch its detail with the configured keyframe count.
    pub async fn select_scene(&self, scene_id: &str) -> Result<Outcome<()>> {
        let (job_id, ticket) = {
            let mut state = self.state();
            let Some(job_id) = state.view.job_id.clone() else {
                return Err(SyncError::NoJobSelected);
            };
            state.view.error = None;
            let ticket = state.choose_scene(scene_id);
            state.publish();
            (job_id, ticket)
        };
        self.load_detail(&job_id, scene_id, ticket).await
    }

    /// Run scene segmentation for `job_id`, then reload the scene list.
    pub async fn build_scenes(&self, job_id: &str) -> Result<Outcome<BuildScenesResponse>> {
        let ticket = {
            let mut state = self.state();
            if !state.is_scoped_to(job_id) {
                return Ok(Outcome::Stale);
            }
            state.view.building = true;
            state.view.error = None;
            state.publish();
            state.scope.current()
        };

        let outcome = guarded(
            &self.inner.state,
            |s| &s.scope,
            ticket,
            self.inner.gateway.build_scenes(job_id),
            |state, result| {
                state.view.building = false;
                let result = result.inspect_err(|err| state.fail("building scenes", err));
                state.publish();
                result
            },
        )
        .await
        .transpose()?;

        let Outcome::Applied(response) = outcome else {
            return Ok(Outcome::Stale);
        };
        info!("built {} scenes for job {job_id}", response.scenes_created);
        Ok(self.refresh_scenes(job_id).await?.map(|()| response))
    }

    /// Ask the server to describe a scene and write the returned text into
    /// the list entry and the open detail. Nothing is re-fetched.
    pub async fn describe_scene(&self, job_id: &str, scene_id: &str) -> Result<Outcome<String>> {
        let ticket = {
            let mut state = self.state();
            if !state.is_scoped_to(job_id) {
                return Ok(Outcome::Stale);
            }
            state.view.describing = true;
            state.view.error = None;
            state.publish();
            state.scope.current()
        };

        let keyframes = self.inner.options.keyframes;
        let outcome = guarded(
            &self.inner.state,
            |s| &s.scope,
            ticket,
            self.inner.gateway.describe_scene(job_id, scene_id, keyframes),
            |state, result| {
                state.view.describing = false;
                let applied = match result {
                    Ok(resp) => {
                        let text = resp.short_description;
                        for scene in &mut state.view.scenes {
                            if scene.scene_id == scene_id {
                                scene.short_description = Some(text.clone());
                            }
                        }
                        if let Some(detail) = state
                            .view
                            .detail
                            .as_mut()
                            .filter(|detail| detail.scene_id == scene_id)
                        {
                            detail.short_description = Some(text.clone());
                        }
                        Ok(text)
                    }
                    Err(err) => {
                        state.fail("describing scene", &err);
                        Err(err)
                    }
                };
                state.publish();
                applied
            },
        )
        .await
        .transpose()?;

        if outcome.is_stale() {
            debug!("discarding description of scene {scene_id} for job {job_id}");
        }
        Ok(outcome)
    }

    /// Discard every in-flight response and clear the busy flags.
    pub fn unmount(&self) {
        let mut state = self.state();
        state.scope.advance();
        state.list.advance();
        state.detail.advance();
        state.view.loading = false;
        state.view.building = false;
        state.view.describing = false;
        state.publish();
        debug!("scene store unmounted");
    }

    async fn load_detail(&self, job_id: &str, scene_id: &str, ticket: Ticket) -> Result<Outcome<()>> {
        let keyframes = self.inner.options.keyframes;
        guarded(
            &self.inner.state,
            |s| &s.detail,
            ticket,
            self.inner.gateway.get_scene(job_id, scene_id, keyframes),
            |state, result| {
                let applied = match result {
                    Ok(detail) => {
                        state.view.detail = Some(detail);
                        Ok(())
                    }
                    Err(err) => {
                        state.fail("loading scene", &err);
                        Err(err)
                    }
                };
                state.publish();
                applied
            },
        )
        .await
        .transpose()
        .map_err(SyncError::from)
    }
}
