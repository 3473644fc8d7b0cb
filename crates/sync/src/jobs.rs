use std::sync::{Arc, Mutex, MutexGuard};

use scenewatch_api::{ExtractResponse, Job, JobId, JobStatus, Snapshot};
use scenewatch_api_client::{ApiError, ResourceGateway};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::SyncOptions;
use crate::confirm::Confirm;
use crate::error::{Result, SyncError};
use crate::generation::{Generation, Outcome, Ticket, guarded, lock};
use crate::poll::{PollLoop, PollState};

/// Snapshot of everything the job views render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobView {
    pub jobs: Vec<Job>,
    pub selected: Option<JobId>,
    pub detail: Option<Job>,
    pub snapshots: Vec<Snapshot>,
    /// Most recent surfaced failure. Cleared when the next explicit action starts.
    pub error: Option<String>,
    pub loading_jobs: bool,
    pub extraction_pending: bool,
    pub polling: bool,
}

/// What one poll step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTick {
    Observed(JobStatus),
    /// The job no longer exists on the server.
    Gone,
    /// The detail fetch failed; the next tick retries.
    Failed,
    /// The selection changed while the step was in flight.
    Stale,
}

impl PollTick {
    pub fn should_continue(&self) -> bool {
        match self {
            Self::Observed(status) => status.is_active(),
            Self::Failed => true,
            Self::Gone | Self::Stale => false,
        }
    }
}

type SelectionListener = Box<dyn Fn(Option<&str>) + Send + Sync>;

struct JobState {
    view: JobView,
    /// Guards detail + snapshots of the selected job, and its poll steps.
    selection: Generation,
    /// Guards the job list.
    list: Generation,
    poll: Option<PollLoop>,
    tx: watch::Sender<JobView>,
    listeners: Vec<SelectionListener>,
}

impl JobState {
    fn publish(&self) {
        self.tx.send_replace(self.view.clone());
    }

    fn fail(&mut self, action: &str, err: &ApiError) {
        warn!("{action} failed: {err}");
        self.view.error = Some(err.to_string());
    }

    fn stop_polling(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.cancel();
        }
        self.view.polling = false;
    }

    /// Point the store at `next`: stop polling, drop the previous job's
    /// detail and snapshots, and supersede every in-flight selection fetch.
    fn switch_selection(&mut self, next: Option<JobId>) -> Ticket {
        self.stop_polling();
        self.view.selected = next;
        self.view.detail = None;
        self.view.snapshots.clear();
        let ticket = self.selection.advance();

        let selected = self.view.selected.as_deref();
        for listener in &self.listeners {
            listener(selected);
        }
        ticket
    }

    /// Drop a job known to be deleted without a fresh list to replace it.
    fn forget(&mut self, job_id: &str) {
        self.view.jobs.retain(|job| job.job_id != job_id);
        if self.view.selected.as_deref() == Some(job_id) {
            self.switch_selection(None);
        }
    }

    /// Store a fresh job list and, when nothing usable is selected, move the
    /// selection to the first entry. Returns the job to load, if any.
    fn apply_list(&mut self, jobs: Vec<Job>, deleted: Option<&str>) -> Option<(JobId, Ticket)> {
        self.view.jobs = jobs;
        self.view.loading_jobs = false;

        let selected = self.view.selected.as_deref();
        if selected.is_some() && selected != deleted {
            return None;
        }
        let first = self.view.jobs.first().map(|job| job.job_id.clone());
        if first.is_none() && self.view.selected.is_none() {
            return None;
        }
        let ticket = self.switch_selection(first.clone());
        first.map(|job_id| (job_id, ticket))
    }
}

struct Inner<G> {
    gateway: Arc<G>,
    confirm: Arc<dyn Confirm>,
    options: SyncOptions,
    state: Mutex<JobState>,
}

/// Keeps the job list, the selected job's detail and snapshots, and the
/// selected job's poll loop consistent.
///
/// Cloning is cheap and every clone drives the same store.
pub struct JobStore<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for JobStore<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: ResourceGateway> JobStore<G> {
    pub fn new(gateway: Arc<G>, confirm: Arc<dyn Confirm>, options: SyncOptions) -> Self {
        let (tx, _) = watch::channel(JobView::default());
        let state = JobState {
            view: JobView::default(),
            selection: Generation::default(),
            list: Generation::default(),
            poll: None,
            tx,
            listeners: Vec::new(),
        };
        Self {
            inner: Arc::new(Inner {
                gateway,
                confirm,
                options,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        lock(&self.inner.state)
    }

    // ── Observation ───────────────────────────────────────────────────────

    pub fn view(&self) -> JobView {
        self.state().view.clone()
    }

    /// Receive the view after every applied mutation.
    pub fn subscribe(&self) -> watch::Receiver<JobView> {
        self.state().tx.subscribe()
    }

    pub fn selected(&self) -> Option<JobId> {
        self.state().view.selected.clone()
    }

    pub fn poll_state(&self) -> Option<PollState> {
        self.state().poll.as_ref().map(PollLoop::state)
    }

    /// Register a callback invoked synchronously whenever the selection
    /// changes. It runs under the store lock and must not call back into
    /// this store.
    pub fn on_selection_change(&self, listener: impl Fn(Option<&str>) + Send + Sync + 'static) {
        self.state().listeners.push(Box::new(listener));
    }

    // ── Actions ───────────────────────────────────────────────────────────

    /// Fetch the job list. Selects the first job when nothing is selected.
    pub async fn refresh_list(&self) -> Result<Outcome<()>> {
        self.begin_action();
        self.reload_list(None).await
    }

    /// Make `job_id` the selected job and load its detail and snapshots.
    /// Polling starts when the job is still being processed.
    pub async fn select(&self, job_id: &str) -> Result<Outcome<()>> {
        let ticket = {
            let mut state = self.state();
            if state.view.selected.as_deref() == Some(job_id) {
                return Ok(Outcome::Applied(()));
            }
            state.view.error = None;
            let ticket = state.switch_selection(Some(job_id.to_string()));
            state.publish();
            ticket
        };
        self.load_selected(job_id, ticket).await
    }

    /// Delete a job after confirmation, then refresh the list. When the
    /// deleted job was selected the first remaining job takes its place.
    pub async fn delete(&self, job_id: &str) -> Result<Outcome<()>> {
        let prompt = format!("Delete job {job_id} with all its snapshots and scenes?");
        if !self.inner.confirm.confirm(&prompt) {
            debug!("delete of job {job_id} declined");
            return Err(SyncError::ConfirmationDeclined);
        }

        self.begin_action();
        let was_selected = self.release_selection(job_id);
        if let Err(err) = self.inner.gateway.delete_job(job_id).await {
            let resume = {
                let mut state = self.state();
                state.fail("deleting job", &err);
                state.publish();
                was_selected
                    && state
                        .view
                        .detail
                        .as_ref()
                        .is_some_and(|job| job.job_id == job_id && job.status.is_active())
            };
            if resume {
                self.ensure_polling();
            }
            return Err(err.into());
        }
        info!("deleted job {job_id}");

        self.reload_list(Some(job_id)).await
    }

    /// Ask the server to start extraction. Returns `Ok(None)` without a
    /// request while a previous call is still outstanding.
    pub async fn trigger_extraction(&self, job_id: &str) -> Result<Option<ExtractResponse>> {
        {
            let mut state = self.state();
            if state.view.extraction_pending {
                debug!("extraction already pending, ignoring request for {job_id}");
                return Ok(None);
            }
            state.view.extraction_pending = true;
            state.view.error = None;
            state.publish();
        }

        let result = self.inner.gateway.trigger_extraction(job_id).await;

        let mut state = self.state();
        state.view.extraction_pending = false;
        let result = match result {
            Ok(resp) => {
                info!("extraction requested for job {job_id}: {}", resp.status);
                Ok(Some(resp))
            }
            Err(err) => {
                state.fail("starting extraction", &err);
                Err(err.into())
            }
        };
        state.publish();
        result
    }

    /// Start polling the selected job unless a poll loop is already running.
    /// Returns true when a new loop was started.
    pub fn ensure_polling(&self) -> bool {
        let (job_id, ticket) = {
            let state = self.state();
            match &state.view.selected {
                Some(job_id) => (job_id.clone(), state.selection.current()),
                None => return false,
            }
        };
        self.start_polling(&job_id, ticket)
    }

    /// Stop polling and turn every in-flight fetch into a no-op.
    pub fn unmount(&self) {
        let mut state = self.state();
        state.stop_polling();
        state.selection.advance();
        state.list.advance();
        state.view.loading_jobs = false;
        state.publish();
        debug!("job store unmounted");
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn begin_action(&self) {
        let mut state = self.state();
        state.view.error = None;
        state.publish();
    }

    /// Stop polling `job_id` and supersede its in-flight fetches when it is
    /// the selected job. The selection itself stays until the list reloads.
    fn release_selection(&self, job_id: &str) -> bool {
        let mut state = self.state();
        if state.view.selected.as_deref() != Some(job_id) {
            return false;
        }
        state.stop_polling();
        state.selection.advance();
        state.publish();
        true
    }

    async fn reload_list(&self, deleted: Option<&str>) -> Result<Outcome<()>> {
        let ticket = {
            let mut state = self.state();
            state.view.loading_jobs = true;
            state.publish();
            state.list.advance()
        };

        let outcome = guarded(
            &self.inner.state,
            |s| &s.list,
            ticket,
            self.inner.gateway.list_jobs(),
            |state, result| {
                let next = match result {
                    Ok(jobs) => Ok(state.apply_list(jobs, deleted)),
                    Err(err) => {
                        state.view.loading_jobs = false;
                        state.fail("refreshing jobs", &err);
                        if let Some(deleted) = deleted {
                            state.forget(deleted);
                        }
                        Err(err)
                    }
                };
                state.publish();
                next
            },
        )
        .await
        .transpose()?;

        if let Outcome::Applied(Some((job_id, ticket))) = &outcome {
            self.load_selected(job_id, *ticket).await?;
        }
        Ok(outcome.map(|_| ()))
    }

    async fn load_selected(&self, job_id: &str, ticket: Ticket) -> Result<Outcome<()>> {
        let gateway = &self.inner.gateway;
        let fetch = async {
            tokio::join!(
                gateway.get_job(job_id),
                gateway.list_snapshots(job_id, &self.inner.options.snapshot_query),
            )
        };

        let outcome = guarded(
            &self.inner.state,
            |s| &s.selection,
            ticket,
            fetch,
            |state, (detail, snapshots)| {
                let applied = match (detail, snapshots) {
                    (Ok(detail), Ok(snapshots)) => {
                        let active = detail.status.is_active();
                        state.view.detail = Some(detail);
                        state.view.snapshots = snapshots;
                        Ok(active)
                    }
                    (Err(err), _) | (_, Err(err)) => {
                        state.fail("loading job", &err);
                        Err(err)
                    }
                };
                state.publish();
                applied
            },
        )
        .await
        .transpose()?;

        if let Outcome::Applied(true) = outcome {
            self.start_polling(job_id, ticket);
        }
        Ok(outcome.map(|_| ()))
    }

    fn start_polling(&self, job_id: &str, ticket: Ticket) -> bool {
        let mut state = self.state();
        if !state.selection.is_current(ticket) {
            return false;
        }
        if state.poll.as_ref().is_some_and(PollLoop::is_running) {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let step_job = job_id.to_string();
        let step = move || {
            let weak = weak.clone();
            let job_id = step_job.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        let store = JobStore { inner };
                        store.poll_step(&job_id, ticket).await
                    }
                    None => PollTick::Stale,
                }
            }
        };
        let hook_job = job_id.to_string();
        let poll = PollLoop::start(
            step,
            PollTick::should_continue,
            self.inner.options.poll_interval,
            move || debug!("stopped polling job {hook_job}"),
        );

        state.poll = Some(poll);
        state.view.polling = true;
        state.publish();
        info!("polling job {job_id}");
        true
    }

    async fn poll_step(&self, job_id: &str, ticket: Ticket) -> PollTick {
        let gateway = &self.inner.gateway;
        let (detail, snapshots, jobs) = tokio::join!(
            gateway.get_job(job_id),
            gateway.list_snapshots(job_id, &self.inner.options.snapshot_query),
            gateway.list_jobs(),
        );

        let mut state = self.state();
        if !state.selection.is_current(ticket) {
            debug!("discarding poll result for deselected job {job_id}");
            return PollTick::Stale;
        }

        let tick = match detail {
            Ok(job) => {
                let status = job.status;
                state.view.detail = Some(job);
                PollTick::Observed(status)
            }
            Err(err) if err.is_not_found() => {
                debug!("job {job_id} disappeared while polling");
                state.view.detail = None;
                state.view.snapshots.clear();
                PollTick::Gone
            }
            Err(err) => {
                debug!("poll of job {job_id} failed: {err}");
                PollTick::Failed
            }
        };
        match snapshots {
            Ok(snapshots) if tick != PollTick::Gone => state.view.snapshots = snapshots,
            Ok(_) => {}
            Err(err) => debug!("poll of snapshots for job {job_id} failed: {err}"),
        }
        match jobs {
            Ok(jobs) if !state.view.loading_jobs => state.view.jobs = jobs,
            Ok(_) => debug!("job list refresh pending, skipping polled list"),
            Err(err) => debug!("poll of job list failed: {err}"),
        }

        state.view.polling = tick.should_continue();
        if !state.view.polling {
            info!("stopped polling job {job_id}: {tick:?}");
        }
        state.publish();
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_continues_only_while_job_is_active() {
        assert!(PollTick::Observed(JobStatus::Created).should_continue());
        assert!(PollTick::Observed(JobStatus::Uploaded).should_continue());
        assert!(PollTick::Observed(JobStatus::Extracting).should_continue());
        assert!(!PollTick::Observed(JobStatus::Done).should_continue());
        assert!(!PollTick::Observed(JobStatus::Error).should_continue());
        assert!(!PollTick::Observed(JobStatus::Unknown).should_continue());
    }

    #[test]
    fn failed_tick_retries_and_gone_or_stale_stop() {
        assert!(PollTick::Failed.should_continue());
        assert!(!PollTick::Gone.should_continue());
        assert!(!PollTick::Stale.should_continue());
    }
}
