use std::mem;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Deferred work on the UI thread
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Run the viewport calculator and lazy loader.
    LazyLoad,
    /// Put the viewport back at a scroll fraction once a reflow has settled.
    RestoreAnchor { fraction: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct Pending {
    id: TaskId,
    due: Instant,
    task: Task,
}

/// Single-threaded timer queue. Every task carries an id so it can be
/// cancelled, and at most one task of each kind is pending at a time.
#[derive(Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task`, cancelling any pending task of the same kind.
    pub fn schedule(&mut self, task: Task, delay: Duration, now: Instant) -> TaskId {
        self.pending
            .retain(|p| mem::discriminant(&p.task) != mem::discriminant(&task));
        self.push(task, now + delay)
    }

    /// Queue `task` unless one of the same kind is already waiting; the
    /// waiting one is kept so steady input cannot postpone it forever.
    pub fn schedule_once(&mut self, task: Task, delay: Duration, now: Instant) -> TaskId {
        if let Some(p) = self
            .pending
            .iter()
            .find(|p| mem::discriminant(&p.task) == mem::discriminant(&task))
        {
            return p.id;
        }
        self.push(task, now + delay)
    }

    fn push(&mut self, task: Task, due: Instant) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.pending.push(Pending { id, due, task });
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Remove and return every task due at `now`, earliest first, ties in
    /// scheduling order.
    pub fn take_due(&mut self, now: Instant) -> Vec<Task> {
        let (mut due, waiting): (Vec<Pending>, Vec<Pending>) =
            mem::take(&mut self.pending).into_iter().partition(|p| p.due <= now);
        self.pending = waiting;
        due.sort_by_key(|p| (p.due, p.id));
        due.into_iter().map(|p| p.task).collect()
    }
}
