//! Deferred one-shot tasks, driven by the host.
//!
//! Tasks are plain data carrying whatever they need to re-validate themselves
//! when they fire (the engagement check carries its visit id). There is no
//! cancellation; a task that has become irrelevant notices and does nothing.

/// Work that runs after a delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Promote the visit to engaged if `visit_id` is still the persisted visit.
    EngagementCheck { visit_id: String },
    /// Emit the web-vitals summary if it has not been emitted yet.
    VitalsSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub due_at: i64,
    seq: u64,
    pub kind: TaskKind,
}

/// Single-threaded task queue ordered by due time, then insertion order.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_at: i64, kind: TaskKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::debug!(due_at, ?kind, "Task scheduled");
        self.tasks.push(ScheduledTask { due_at, seq, kind });
    }

    /// Removes and returns every task due at or before `now_ms`, in firing order.
    pub fn take_due(&mut self, now_ms: i64) -> Vec<ScheduledTask> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.due_at <= now_ms);
        self.tasks = pending;
        due.sort_by_key(|task| (task.due_at, task.seq));
        due
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<i64> {
        self.tasks.iter().map(|task| task.due_at).min()
    }

    pub fn pending(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
