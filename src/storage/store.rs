//! Store facade - the public entry point to the workflow cache

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use crossbeam::channel::{self, RecvTimeoutError, SendTimeoutError, Sender};
use crate::model::{Repository, Workflow};
use crate::{Error, Result};
use super::actor::{ActorState, Completion, Envelope, Message, Reply, StorageActor};
use super::sqlite::WorkflowDb;

/// Default bound of the mailbox
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default time a typed helper waits for mailbox space plus the reply
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning knobs for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub mailbox_capacity: usize,
    pub submit_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

/// Handle to the workflow store.
///
/// Cloning is cheap and every clone talks to the same storage actor. A store
/// that failed to open is *disabled*: it stays usable as a value but every
/// operation fails with [`Error::StoreUnavailable`], so callers can carry on
/// without caching.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Option<Arc<StoreInner>>,
}

#[derive(Debug)]
struct StoreInner {
    mailbox: Sender<Envelope>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<AtomicU8>,
    options: StoreOptions,
    location: String,
}

impl Store {
    /// Open (or create) the database at `path` and start the storage actor.
    ///
    /// `":memory:"` is accepted. On failure no actor is started.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        let db = WorkflowDb::open(path)?;
        Self::start(db, options, path.display().to_string())
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let db = WorkflowDb::open_in_memory()?;
        Self::start(db, StoreOptions::default(), ":memory:".to_string())
    }

    /// Open the store, or fall back to a disabled one if that fails
    pub fn open_or_disabled(path: impl AsRef<Path>, options: StoreOptions) -> Self {
        let path = path.as_ref();
        match Self::open_with(path, options) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "workflow cache disabled, could not open {}: {}",
                    path.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    /// A store that was never opened
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    fn start(db: WorkflowDb, options: StoreOptions, location: String) -> Result<Self> {
        let (tx, rx) = channel::bounded(options.mailbox_capacity.max(1));
        let state = Arc::new(AtomicU8::new(ActorState::Stopped as u8));
        let handle = StorageActor::new(db, rx, Arc::clone(&state)).spawn()?;

        tracing::info!("workflow store opened at {}", location);
        Ok(Self {
            inner: Some(Arc::new(StoreInner {
                mailbox: tx,
                closed: AtomicBool::new(false),
                worker: Mutex::new(Some(handle)),
                state,
                options,
                location,
            })),
        })
    }

    /// Whether the store was opened successfully and has not been closed
    pub fn is_available(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| !inner.closed.load(Ordering::Acquire))
    }

    /// Where the database lives, if the store was opened
    pub fn location(&self) -> Option<&str> {
        self.inner.as_ref().map(|inner| inner.location.as_str())
    }

    /// Current state of the storage actor; `None` for a disabled store
    pub fn actor_state(&self) -> Option<ActorState> {
        self.inner
            .as_ref()
            .map(|inner| ActorState::from_u8(inner.state.load(Ordering::Acquire)))
    }

    pub fn options(&self) -> StoreOptions {
        self.inner
            .as_ref()
            .map(|inner| inner.options)
            .unwrap_or_default()
    }

    /// Send `message` to the storage actor and wait for its outcome.
    ///
    /// The wait for mailbox space and the wait for the reply share one
    /// deadline, so this returns within `timeout`. A timed-out operation may
    /// still be applied later; it is not rolled back.
    pub fn submit(&self, message: Message, timeout: Duration) -> Result<Reply> {
        self.submit_sequenced(message, timeout).1
    }

    /// Like `submit`, also returning the actor's dequeue sequence number
    pub(crate) fn submit_sequenced(
        &self,
        message: Message,
        timeout: Duration,
    ) -> (Option<u64>, Result<Reply>) {
        let Some(inner) = self.inner.as_ref() else {
            return (None, Err(Error::StoreUnavailable));
        };
        if inner.closed.load(Ordering::Acquire) {
            return (None, Err(Error::StoreClosed));
        }

        let deadline = Instant::now().checked_add(timeout);
        let kind = message.kind();
        let (reply, completion) = channel::bounded::<Completion>(1);
        let envelope = Envelope::Request { message, reply };

        let sent = match deadline {
            Some(deadline) => inner.mailbox.send_deadline(envelope, deadline),
            None => inner
                .mailbox
                .send(envelope)
                .map_err(|e| SendTimeoutError::Disconnected(e.into_inner())),
        };
        match sent {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::debug!(op = kind, "mailbox full, gave up after {:?}", timeout);
                return (None, Err(Error::Timeout(timeout)));
            }
            Err(SendTimeoutError::Disconnected(_)) => return (None, Err(Error::StoreClosed)),
        }

        let received = match deadline {
            Some(deadline) => completion.recv_deadline(deadline),
            None => completion.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Completion { seq, result }) => (Some(seq), result),
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(op = kind, "no reply within {:?}", timeout);
                (None, Err(Error::Timeout(timeout)))
            }
            // Mailbox dropped with the request still queued
            Err(RecvTimeoutError::Disconnected) => (None, Err(Error::StoreClosed)),
        }
    }

    fn submit_default(&self, message: Message) -> Result<Reply> {
        self.submit(message, self.options().submit_timeout)
    }

    // ========== Typed helpers ==========

    pub fn store_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        self.submit_default(Message::StoreWorkflow(workflow))?.into_workflow()
    }

    pub fn update_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        self.submit_default(Message::UpdateWorkflow(workflow))?.into_workflow()
    }

    /// Returns whether the workflow existed
    pub fn remove_workflow(&self, id: impl Into<String>) -> Result<bool> {
        self.submit_default(Message::RemoveWorkflow(id.into()))?.into_removed()
    }

    pub fn get_workflow(&self, id: impl Into<String>) -> Result<Workflow> {
        self.submit_default(Message::GetWorkflow(id.into()))?.into_workflow()
    }

    pub fn list_workflows_for_repo(&self, repo: impl Into<String>) -> Result<Vec<Workflow>> {
        self.submit_default(Message::ListWorkflowsForRepo(repo.into()))?
            .into_workflows()
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.submit_default(Message::ListRepositories)?.into_repositories()
    }

    pub fn seed_repositories(&self, repos: Vec<Repository>) -> Result<usize> {
        self.submit_default(Message::SeedRepositories(repos))?.into_seeded()
    }

    /// Stop accepting messages, drain queued work and release the database.
    ///
    /// Idempotent. Other clones observe the store as closed.
    pub fn close(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.shutdown();
        }
    }
}

impl StoreInner {
    fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Blocking send: the actor keeps draining, so space frees up
            if self.mailbox.send(Envelope::Shutdown).is_err() {
                tracing::debug!("storage actor already gone");
            }
        }

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("storage actor panicked during shutdown");
            }
            tracing::info!("workflow store at {} closed", self.location);
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{sample_workflow, sample_workflow_in};
    use crate::storage::actor;
    use std::collections::BTreeMap;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(10);

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .seed_repositories(vec![Repository::new("lazy-project", "andreas", "t0k3n")])
            .unwrap();
        store
    }

    #[test]
    fn test_scenario_store_get_list() {
        let store = seeded_store();
        let workflow = sample_workflow("161335", "CI");

        let stored = store.store_workflow(workflow.clone()).unwrap();
        assert_eq!(stored, workflow);

        let fetched = store.get_workflow("161335").unwrap();
        assert_eq!(fetched, workflow);
        assert_eq!(fetched.created_at, "2020-01-08T23:48:37.000-08:00");
        assert_eq!(fetched.path, ".github/workflows/blank.yaml");

        let listed = store.list_workflows_for_repo("lazy-project").unwrap();
        assert!(listed.contains(&workflow));
    }

    #[test]
    fn test_scenario_remove_then_get() {
        let store = seeded_store();
        store.store_workflow(sample_workflow("161335", "CI")).unwrap();

        assert!(store.remove_workflow("161335").unwrap());
        assert!(matches!(
            store.get_workflow("161335"),
            Err(Error::NotFound(id)) if id == "161335"
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = seeded_store();
        store.store_workflow(sample_workflow("7", "CI")).unwrap();

        assert!(store.remove_workflow("7").unwrap());
        assert!(!store.remove_workflow("7").unwrap());
        assert!(store.list_workflows_for_repo("lazy-project").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_last_writer_wins() {
        let store = seeded_store();
        store.store_workflow(sample_workflow("1", "first")).unwrap();
        store.store_workflow(sample_workflow("1", "second")).unwrap();

        let listed = store.list_workflows_for_repo("lazy-project").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "second");
    }

    #[test]
    fn test_update_requires_existing_row() {
        let store = seeded_store();
        assert!(matches!(
            store.update_workflow(sample_workflow("9", "CI")),
            Err(Error::NotFound(_))
        ));

        store.store_workflow(sample_workflow("9", "CI")).unwrap();
        let mut changed = sample_workflow("9", "CI");
        changed.state = crate::WorkflowState::Disabled;
        store.update_workflow(changed.clone()).unwrap();
        assert_eq!(store.get_workflow("9").unwrap(), changed);
    }

    #[test]
    fn test_poison_message_does_not_starve_callers() {
        let store = seeded_store();
        assert!(matches!(
            store.store_workflow(sample_workflow("", "broken")),
            Err(Error::InvalidRecord(_))
        ));
        assert!(matches!(
            store.seed_repositories(vec![Repository::new("x", "", "")]),
            Err(Error::InvalidRecord(_))
        ));

        store.store_workflow(sample_workflow("2", "CI")).unwrap();
        assert_eq!(store.get_workflow("2").unwrap().name, "CI");
        assert_eq!(store.actor_state(), Some(ActorState::Idle));
    }

    #[test]
    fn test_scenario_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("workflows.db");

        let err = Store::open(&path).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let store = Store::open_or_disabled(&path, StoreOptions::default());
        assert!(!store.is_available());
        assert_eq!(store.actor_state(), None);
        assert!(matches!(
            store.submit(Message::ListRepositories, WAIT),
            Err(Error::StoreUnavailable)
        ));
        assert!(matches!(store.list_repositories(), Err(Error::StoreUnavailable)));
    }

    #[test]
    fn test_read_only_database_is_not_opened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.db");
        Store::open(&path).unwrap().close();

        let read_only = format!("file:{}?mode=ro", path.display());
        let err = Store::open(&read_only).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let store = Store::open_or_disabled(&read_only, StoreOptions::default());
        assert!(!store.is_available());
        assert_eq!(store.actor_state(), None);
    }

    #[test]
    fn test_concurrent_distinct_ids() {
        let store = seeded_store();

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.store_workflow(sample_workflow(&i.to_string(), "CI")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(store.list_workflows_for_repo("lazy-project").unwrap().len(), 100);
    }

    #[test]
    fn test_concurrent_result_matches_sequential_replay() {
        let store = seeded_store();

        // Four callers fighting over a handful of ids
        let handles: Vec<_> = (0..4)
            .map(|caller| {
                let store = store.clone();
                thread::spawn(move || {
                    let mut log = Vec::new();
                    for step in 0..40 {
                        let id = ((caller + step) % 5).to_string();
                        let message = match step % 4 {
                            0 | 1 => Message::StoreWorkflow(sample_workflow(
                                &id,
                                &format!("c{}-s{}", caller, step),
                            )),
                            2 => Message::RemoveWorkflow(id),
                            _ => {
                                let mut w = sample_workflow(&id, &format!("u{}-{}", caller, step));
                                w.state = crate::WorkflowState::Disabled;
                                Message::UpdateWorkflow(w)
                            }
                        };
                        let (seq, _) = store.submit_sequenced(message.clone(), WAIT);
                        log.push((seq.expect("every request is answered"), message));
                    }
                    log
                })
            })
            .collect();

        let mut ordered = BTreeMap::new();
        for handle in handles {
            for (seq, message) in handle.join().unwrap() {
                assert!(ordered.insert(seq, message).is_none(), "duplicate sequence number");
            }
        }

        let mut replayed = WorkflowDb::open_in_memory().unwrap();
        replayed
            .seed_repositories(&[Repository::new("lazy-project", "andreas", "t0k3n")])
            .unwrap();
        actor::replay(&mut replayed, ordered.into_values());

        assert_eq!(
            store.list_workflows_for_repo("lazy-project").unwrap(),
            replayed.workflows_for_repo("lazy-project").unwrap()
        );
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.db");

        let store = Store::open(&path).unwrap();
        store
            .seed_repositories(vec![Repository::new("lazy-project", "andreas", "t")])
            .unwrap();
        store.store_workflow(sample_workflow("161335", "CI")).unwrap();
        store.close();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.get_workflow("161335").unwrap().name, "CI");
        assert_eq!(reopened.list_repositories().unwrap().len(), 1);
    }

    #[test]
    fn test_close_drains_and_rejects_later_submits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.db");
        let store = Store::open(&path).unwrap();
        store
            .seed_repositories(vec![Repository::new("other", "someone", "t")])
            .unwrap();

        let writers: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store.store_workflow(sample_workflow_in("someone", "other", &i.to_string(), "CI"))
                })
            })
            .collect();

        // Races the writers: each one is either applied or told the store closed
        store.close();

        let mut accepted = 0;
        for writer in writers {
            match writer.join().unwrap() {
                Ok(_) => accepted += 1,
                Err(Error::StoreClosed) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert!(!store.is_available());
        assert_eq!(store.actor_state(), Some(ActorState::Stopped));
        assert!(matches!(
            store.get_workflow("0"),
            Err(Error::StoreClosed)
        ));
        store.close();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.list_workflows_for_repo("other").unwrap().len(), accepted);
    }

    #[test]
    fn test_submit_respects_timeout() {
        // A mailbox nobody reads stands in for a stalled actor
        let (tx, rx) = channel::bounded(1);
        let store = Store {
            inner: Some(Arc::new(StoreInner {
                mailbox: tx,
                closed: AtomicBool::new(false),
                worker: Mutex::new(None),
                state: Arc::new(AtomicU8::new(ActorState::Idle as u8)),
                options: StoreOptions::default(),
                location: "stalled".to_string(),
            })),
        };

        let timeout = Duration::from_millis(50);

        // Enqueued, but never answered
        let started = Instant::now();
        assert!(matches!(
            store.submit(Message::ListRepositories, timeout),
            Err(Error::Timeout(_))
        ));
        // Mailbox is full now
        assert!(matches!(
            store.submit(Message::ListRepositories, timeout),
            Err(Error::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));

        drop(rx);
        assert!(matches!(
            store.submit(Message::ListRepositories, timeout),
            Err(Error::StoreClosed)
        ));
    }
}
