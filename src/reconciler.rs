//! Mutation reconciler
//!
//! Every change to the task collection goes through here. Two flavours:
//!
//! - Optimistic (toggle, clear completed): the local index changes first,
//!   then the store is called. A failed call puts the index back.
//! - Confirm-first (add, edit, drop reschedule): the store is called first
//!   and the index only changes once it succeeded. A failed call hands the
//!   caller's input back so it can be retried.
//!
//! Either way, once a mutation settles the index matches what the store
//! confirmed. The index lock is never held across a store call, so
//! mutations on different tasks can be in flight at the same time.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use weekwise_core::{
    CoreError, Draft, DropEvent, EditForm, Task, TaskId, TaskIndex, TaskPatch, UserId,
};

use crate::session::Session;
use crate::store::{StoreError, TaskStore};

/// Why a mutation did not go through
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("No signed-in user; task changes are disabled")]
    Unauthenticated,

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// A failed mutation together with the input the user can retry
#[derive(Debug)]
pub struct Rejected<T> {
    pub input: T,
    pub error: ReconcileError,
}

impl<T> Rejected<T> {
    fn new(input: T, error: impl Into<ReconcileError>) -> Self {
        Self {
            input,
            error: error.into(),
        }
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<T: fmt::Debug> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Lifecycle of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

impl MutationState {
    pub fn can_advance_to(self, next: MutationState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Pending)
                | (Self::Pending, Self::Committed)
                | (Self::Pending, Self::RolledBack)
        )
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Toggle,
    Edit,
    Reschedule,
    ClearCompleted,
}

/// State machine for a single mutation attempt
#[derive(Debug)]
pub struct Mutation {
    kind: MutationKind,
    target: Option<TaskId>,
    state: MutationState,
}

impl Mutation {
    pub fn new(kind: MutationKind, target: Option<TaskId>) -> Self {
        Self {
            kind,
            target,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Move to `next`; invalid transitions are refused and logged
    pub fn advance(&mut self, next: MutationState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(kind = ?self.kind, from = ?self.state, to = ?next, "invalid mutation transition");
            return false;
        }
        debug!(kind = ?self.kind, task = ?self.target.as_ref().map(TaskId::as_str), state = ?next, "mutation");
        self.state = next;
        true
    }

    pub fn begin(&mut self) -> bool {
        self.advance(MutationState::Pending)
    }

    pub fn commit(&mut self) -> bool {
        self.advance(MutationState::Committed)
    }

    pub fn roll_back(&mut self) -> bool {
        self.advance(MutationState::RolledBack)
    }
}

/// Outcome of an optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    /// `Idle` when there was nothing to do
    pub state: MutationState,
    /// Tasks touched locally
    pub affected: usize,
}

impl Settled {
    fn idle() -> Self {
        Self {
            state: MutationState::Idle,
            affected: 0,
        }
    }
}

/// Applies mutations to the shared task index and the store
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TaskStore>,
    session: Arc<dyn Session>,
    index: Arc<Mutex<TaskIndex>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TaskStore>, session: Arc<dyn Session>) -> Self {
        Self {
            store,
            session,
            index: Arc::new(Mutex::new(TaskIndex::new())),
        }
    }

    /// Start from an already loaded index
    pub fn with_index(mut self, index: TaskIndex) -> Self {
        self.index = Arc::new(Mutex::new(index));
        self
    }

    /// The shared collection, for hosts that render from it directly
    pub fn shared_index(&self) -> Arc<Mutex<TaskIndex>> {
        Arc::clone(&self.index)
    }

    /// Copy of the current collection for one render pass
    pub async fn snapshot(&self) -> TaskIndex {
        self.index.lock().await.clone()
    }

    fn user(&self) -> Result<UserId, ReconcileError> {
        self.session
            .current_user_id()
            .ok_or(ReconcileError::Unauthenticated)
    }

    /// Replace the index with a bulk read from the store
    ///
    /// Used at session start and to re-sync after out-of-band changes.
    pub async fn load(&self) -> Result<usize, ReconcileError> {
        let user = self.user()?;
        let tasks = self.store.list_tasks(&user).await?;
        let index = TaskIndex::from_tasks(tasks);
        let count = index.len();
        *self.index.lock().await = index;
        info!(count, "loaded tasks");
        Ok(count)
    }

    /// Persist a quick-add draft, then put the created record at the front
    pub async fn add(&self, draft: Draft) -> Result<Task, Rejected<Draft>> {
        let user = match self.user() {
            Ok(user) => user,
            Err(e) => return Err(Rejected::new(draft, e)),
        };
        let fields = match draft.clone().into_new_task(user) {
            Ok(fields) => fields,
            Err(e) => return Err(Rejected::new(draft, e)),
        };

        let mut mutation = Mutation::new(MutationKind::Add, None);
        mutation.begin();
        match self.store.create_task(fields).await {
            Ok(task) => {
                self.index.lock().await.insert_front(task.clone());
                mutation.commit();
                info!(id = %task.id, "task added");
                Ok(task)
            }
            Err(e) => {
                mutation.roll_back();
                warn!(error = %e, "create failed, keeping draft");
                Err(Rejected::new(draft, e))
            }
        }
    }

    /// Flip completion locally, then confirm with the store
    ///
    /// Unknown ids are a no-op. A failed store call flips the task back,
    /// unless something else changed it in the meantime.
    pub async fn toggle(&self, id: &TaskId) -> Result<Settled, ReconcileError> {
        self.user()?;

        let completed = {
            let mut index = self.index.lock().await;
            let Some(task) = index.get(id) else {
                debug!(id = %id, "toggle on unknown task ignored");
                return Ok(Settled::idle());
            };
            let completed = !task.is_completed;
            index.set_completed(id, completed);
            completed
        };

        let mut mutation = Mutation::new(MutationKind::Toggle, Some(id.clone()));
        mutation.begin();
        let patch = TaskPatch::new().completed(completed);
        match self.store.update_task(id, &patch).await {
            Ok(()) => {
                mutation.commit();
            }
            Err(e) => {
                let mut index = self.index.lock().await;
                if index.get(id).is_some_and(|t| t.is_completed == completed) {
                    index.set_completed(id, !completed);
                }
                mutation.roll_back();
                warn!(id = %id, error = %e, "toggle failed, rolled back");
            }
        }

        Ok(Settled {
            state: mutation.state(),
            affected: 1,
        })
    }

    /// Apply an expanded-card edit once the store accepted it
    ///
    /// Returns `Ok(None)` when the task is not in the index.
    pub async fn edit(&self, id: &TaskId, form: EditForm) -> Result<Option<Task>, Rejected<EditForm>> {
        if let Err(e) = self.user() {
            return Err(Rejected::new(form, e));
        }
        let Some(current) = self.index.lock().await.get(id).cloned() else {
            return Ok(None);
        };
        let patch = match form.diff(&current) {
            Ok(patch) => patch,
            Err(e) => return Err(Rejected::new(form, e)),
        };

        self.commit_patch(MutationKind::Edit, current, patch)
            .await
            .map_err(|e| Rejected::new(form, e))
    }

    /// Move a dropped task to the destination day, keeping its time
    pub async fn reschedule(&self, drop: DropEvent) -> Result<Option<Task>, Rejected<DropEvent>> {
        if let Err(e) = self.user() {
            return Err(Rejected::new(drop, e));
        }
        let Some(current) = self.index.lock().await.get(&drop.task_id).cloned() else {
            return Ok(None);
        };
        let patch = drop.patch_for(&current);

        self.commit_patch(MutationKind::Reschedule, current, patch)
            .await
            .map_err(|e| Rejected::new(drop, e))
    }

    async fn commit_patch(
        &self,
        kind: MutationKind,
        current: Task,
        patch: TaskPatch,
    ) -> Result<Option<Task>, ReconcileError> {
        if patch.is_empty() {
            debug!(id = %current.id, "nothing changed");
            return Ok(Some(current));
        }

        let id = current.id;
        let mut mutation = Mutation::new(kind, Some(id.clone()));
        mutation.begin();
        if let Err(e) = self.store.update_task(&id, &patch).await {
            mutation.roll_back();
            warn!(id = %id, error = %e, "update failed, local copy unchanged");
            return Err(e.into());
        }

        let mut index = self.index.lock().await;
        index.replace(&id, &patch);
        mutation.commit();
        info!(id = %id, fields = ?patch.fields(), "task updated");
        Ok(index.get(&id).cloned())
    }

    /// Remove completed tasks locally, then from the store
    ///
    /// A failed store call restores the removed tasks at their positions.
    pub async fn clear_completed(&self) -> Result<Settled, ReconcileError> {
        let user = self.user()?;

        let removed = self.index.lock().await.remove_where(|t| t.is_completed);
        if removed.is_empty() {
            return Ok(Settled::idle());
        }
        let affected = removed.len();

        let mut mutation = Mutation::new(MutationKind::ClearCompleted, None);
        mutation.begin();
        match self.store.delete_completed(&user).await {
            Ok(deleted) => {
                mutation.commit();
                info!(removed = affected, deleted, "cleared completed tasks");
            }
            Err(e) => {
                let restored = self.index.lock().await.restore(removed);
                mutation.roll_back();
                warn!(error = %e, restored, "clear completed failed, restored tasks");
            }
        }

        Ok(Settled {
            state: mutation.state(),
            affected,
        })
    }
}
