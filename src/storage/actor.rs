//! Storage actor - the single owner of the database handle
//!
//! Callers never touch the connection. They put an [`Envelope`] on the
//! bounded mailbox and wait on its reply channel. The actor executes one
//! message per turn in dequeue order and answers every request exactly once,
//! whether the operation succeeded, failed or panicked.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use crossbeam::channel::{Receiver, Sender};
use crate::model::{Repository, Workflow};
use crate::{Error, Result};
use super::sqlite::WorkflowDb;

/// Operations the store understands.
///
/// This set is closed: a new operation is a new variant here, executed
/// atomically inside one actor turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Insert a workflow, or overwrite it if the id is already cached
    StoreWorkflow(Workflow),
    /// Overwrite an existing workflow; `NotFound` if the id is unknown
    UpdateWorkflow(Workflow),
    /// Delete a workflow by id; deleting a missing id is not an error
    RemoveWorkflow(String),
    GetWorkflow(String),
    /// All cached workflows of the repository with this name
    ListWorkflowsForRepo(String),
    ListRepositories,
    /// Upsert the configured repositories in a single transaction
    SeedRepositories(Vec<Repository>),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::StoreWorkflow(_) => "store_workflow",
            Message::UpdateWorkflow(_) => "update_workflow",
            Message::RemoveWorkflow(_) => "remove_workflow",
            Message::GetWorkflow(_) => "get_workflow",
            Message::ListWorkflowsForRepo(_) => "list_workflows_for_repo",
            Message::ListRepositories => "list_repositories",
            Message::SeedRepositories(_) => "seed_repositories",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Message::StoreWorkflow(_)
                | Message::UpdateWorkflow(_)
                | Message::RemoveWorkflow(_)
                | Message::SeedRepositories(_)
        )
    }
}

/// Successful outcome of a [`Message`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Workflow(Workflow),
    Workflows(Vec<Workflow>),
    Repositories(Vec<Repository>),
    Removed { existed: bool },
    Seeded(usize),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Reply::Workflow(_) => "workflow",
            Reply::Workflows(_) => "workflows",
            Reply::Repositories(_) => "repositories",
            Reply::Removed { .. } => "removed",
            Reply::Seeded(_) => "seeded",
        }
    }

    pub fn into_workflow(self) -> Result<Workflow> {
        match self {
            Reply::Workflow(workflow) => Ok(workflow),
            other => Err(Error::UnexpectedReply(other.kind())),
        }
    }

    pub fn into_workflows(self) -> Result<Vec<Workflow>> {
        match self {
            Reply::Workflows(workflows) => Ok(workflows),
            other => Err(Error::UnexpectedReply(other.kind())),
        }
    }

    pub fn into_repositories(self) -> Result<Vec<Repository>> {
        match self {
            Reply::Repositories(repos) => Ok(repos),
            other => Err(Error::UnexpectedReply(other.kind())),
        }
    }

    pub fn into_removed(self) -> Result<bool> {
        match self {
            Reply::Removed { existed } => Ok(existed),
            other => Err(Error::UnexpectedReply(other.kind())),
        }
    }

    pub fn into_seeded(self) -> Result<usize> {
        match self {
            Reply::Seeded(count) => Ok(count),
            other => Err(Error::UnexpectedReply(other.kind())),
        }
    }
}

/// What the actor sends back: its dequeue sequence number and the outcome
#[derive(Debug)]
pub(crate) struct Completion {
    pub seq: u64,
    pub result: Result<Reply>,
}

/// Mailbox item
#[derive(Debug)]
pub(crate) enum Envelope {
    Request {
        message: Message,
        reply: Sender<Completion>,
    },
    Shutdown,
}

/// Lifecycle of the storage actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActorState {
    Idle = 0,
    Executing = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ActorState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorState::Idle,
            1 => ActorState::Executing,
            2 => ActorState::Stopping,
            _ => ActorState::Stopped,
        }
    }

    fn can_transition_to(self, next: ActorState) -> bool {
        use ActorState::*;
        matches!(
            (self, next),
            (Idle, Executing) | (Executing, Idle) | (Idle, Stopping) | (Stopping, Stopped)
        )
    }
}

/// The worker owning the database
pub(crate) struct StorageActor {
    db: WorkflowDb,
    mailbox: Receiver<Envelope>,
    state: Arc<AtomicU8>,
    next_seq: u64,
}

impl StorageActor {
    pub fn new(db: WorkflowDb, mailbox: Receiver<Envelope>, state: Arc<AtomicU8>) -> Self {
        state.store(ActorState::Idle as u8, Ordering::Release);
        Self {
            db,
            mailbox,
            state,
            next_seq: 0,
        }
    }

    /// Run the actor on a dedicated thread
    pub fn spawn(self) -> Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("actiondeck-store".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::Connection(format!("failed to spawn storage actor: {}", e)))
    }

    fn state(&self) -> ActorState {
        ActorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, next: ActorState) {
        let current = self.state();
        debug_assert!(
            current.can_transition_to(next),
            "invalid actor transition {:?} -> {:?}",
            current,
            next
        );
        tracing::trace!("storage actor {:?} -> {:?}", current, next);
        self.state.store(next as u8, Ordering::Release);
    }

    fn run(mut self) {
        tracing::debug!("storage actor started");

        // Ends on the shutdown signal, or when every sender is gone
        while let Ok(envelope) = self.mailbox.recv() {
            match envelope {
                Envelope::Request { message, reply } => self.handle(message, reply),
                Envelope::Shutdown => break,
            }
        }

        self.transition(ActorState::Stopping);

        // Requests that raced the shutdown signal still get an answer
        let mut rejected = 0usize;
        for envelope in self.mailbox.try_iter() {
            if let Envelope::Request { reply, .. } = envelope {
                let seq = self.next_seq;
                self.next_seq += 1;
                let _ = reply.send(Completion {
                    seq,
                    result: Err(Error::StoreClosed),
                });
                rejected += 1;
            }
        }
        if rejected > 0 {
            tracing::debug!("storage actor rejected {} request(s) after shutdown", rejected);
        }

        let handled = self.next_seq;
        let StorageActor { db, state, .. } = self;
        drop(db);
        state.store(ActorState::Stopped as u8, Ordering::Release);
        tracing::debug!("storage actor stopped after {} request(s)", handled);
    }

    fn handle(&mut self, message: Message, reply: Sender<Completion>) {
        self.transition(ActorState::Executing);
        let seq = self.next_seq;
        self.next_seq += 1;
        let kind = message.kind();
        let mutation = message.is_mutation();

        let db = &mut self.db;
        let result = panic::catch_unwind(AssertUnwindSafe(|| execute(db, message)))
            .unwrap_or_else(|_| Err(Error::Internal(format!("{} panicked", kind))));

        match &result {
            Ok(_) => tracing::debug!(seq, op = kind, mutation, "storage op ok"),
            Err(e) => tracing::warn!(seq, op = kind, "storage op failed: {}", e),
        }

        if reply.send(Completion { seq, result }).is_err() {
            tracing::debug!(seq, op = kind, "caller stopped waiting before the reply");
        }
        self.transition(ActorState::Idle);
    }
}

/// Apply one message to the database
fn execute(db: &mut WorkflowDb, message: Message) -> Result<Reply> {
    match message {
        Message::StoreWorkflow(workflow) => {
            db.upsert_workflow(&workflow)?;
            Ok(Reply::Workflow(workflow))
        }
        Message::UpdateWorkflow(workflow) => {
            db.update_workflow(&workflow)?;
            Ok(Reply::Workflow(workflow))
        }
        Message::RemoveWorkflow(id) => {
            let existed = db.delete_workflow(&id)?;
            Ok(Reply::Removed { existed })
        }
        Message::GetWorkflow(id) => match db.get_workflow(&id)? {
            Some(workflow) => Ok(Reply::Workflow(workflow)),
            None => Err(Error::NotFound(id)),
        },
        Message::ListWorkflowsForRepo(repo) => {
            Ok(Reply::Workflows(db.workflows_for_repo(&repo)?))
        }
        Message::ListRepositories => Ok(Reply::Repositories(db.repositories()?)),
        Message::SeedRepositories(repos) => Ok(Reply::Seeded(db.seed_repositories(&repos)?)),
    }
}

/// Replay messages in order against a database, ignoring failures.
///
/// Used to check that the actor's results match a sequential execution.
#[cfg(test)]
pub(crate) fn replay(db: &mut WorkflowDb, messages: impl IntoIterator<Item = Message>) {
    for message in messages {
        let _ = execute(db, message);
    }
}
