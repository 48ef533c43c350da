//! FIFO queue of jobs waiting for admission.
//!
//! The queue itself is not thread-safe; the scheduler keeps it behind
//! its queue lock together with the dependency graph.

use std::collections::VecDeque;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::JobsError;
use crate::info::JobInfo;

/// Send side of a job's update channel.
///
/// A worker emits intermediate descriptors on this channel and signals
/// completion by dropping it; the last descriptor seen before the drop
/// is promoted to the finished state.
pub type JobUpdateSender = mpsc::Sender<JobInfo>;

/// A worker function: consumes its update channel, returns a future the
/// scheduler spawns on admission.
pub type JobWorker = Box<dyn FnOnce(JobUpdateSender) -> BoxFuture<'static, ()> + Send>;

/// A queued (worker, initial descriptor) pair.
pub struct QueuedJob {
    pub worker: JobWorker,
    pub initial: JobInfo,
}

/// FIFO queue with head rotation for jobs blocked on unfinished parents.
#[derive(Default)]
pub struct JobQueue {
    items: VecDeque<QueuedJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail.
    pub fn enqueue(&mut self, worker: JobWorker, initial: JobInfo) {
        self.items.push_back(QueuedJob { worker, initial });
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Result<QueuedJob, JobsError> {
        self.items.pop_front().ok_or(JobsError::QueueEmpty)
    }

    /// The head's job ID without removing it.
    pub fn peek_id(&self) -> Result<String, JobsError> {
        self.items
            .front()
            .map(|entry| entry.initial.id().to_string())
            .ok_or(JobsError::QueueEmpty)
    }

    /// Rotate the head to the tail. Used when the head has unsatisfied
    /// parents so other queued jobs still get a chance this tick.
    pub fn delay_next(&mut self) {
        if let Some(entry) = self.items.pop_front() {
            self.items.push_back(entry);
        }
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{JobRecord, LiveAttrsArgs};

    fn noop_entry(corpus: &str) -> (JobWorker, JobInfo) {
        let worker: JobWorker = Box::new(|_tx| Box::pin(async {}));
        let info = JobInfo::LiveAttrs(JobRecord::new(corpus, LiveAttrsArgs::default()));
        (worker, info)
    }

    #[test]
    fn dequeue_follows_fifo_order() {
        let mut queue = JobQueue::new();
        let (w1, j1) = noop_entry("a");
        let (w2, j2) = noop_entry("b");
        let first_id = j1.id().to_string();
        let second_id = j2.id().to_string();
        queue.enqueue(w1, j1);
        queue.enqueue(w2, j2);

        assert_eq!(queue.dequeue().unwrap().initial.id(), first_id);
        assert_eq!(queue.dequeue().unwrap().initial.id(), second_id);
        assert!(matches!(queue.dequeue(), Err(JobsError::QueueEmpty)));
    }

    #[test]
    fn peek_does_not_remove() {
        let mut queue = JobQueue::new();
        let (w, j) = noop_entry("a");
        let id = j.id().to_string();
        queue.enqueue(w, j);

        assert_eq!(queue.peek_id().unwrap(), id);
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn peek_fails_on_empty_queue() {
        let queue = JobQueue::new();
        assert!(matches!(queue.peek_id(), Err(JobsError::QueueEmpty)));
    }

    #[test]
    fn delay_next_rotates_head_to_tail() {
        let mut queue = JobQueue::new();
        let (w1, j1) = noop_entry("a");
        let (w2, j2) = noop_entry("b");
        let first_id = j1.id().to_string();
        let second_id = j2.id().to_string();
        queue.enqueue(w1, j1);
        queue.enqueue(w2, j2);

        queue.delay_next();
        assert_eq!(queue.peek_id().unwrap(), second_id);
        queue.delay_next();
        assert_eq!(queue.peek_id().unwrap(), first_id);
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn delay_next_on_empty_queue_is_noop() {
        let mut queue = JobQueue::new();
        queue.delay_next();
        assert!(queue.is_empty());
    }
}
