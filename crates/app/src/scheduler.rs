//! In-process task scheduler backed by a tokio channel and timer.
//!
//! [`TokioTaskScheduler`] is the posting side and can be cloned freely;
//! [`TaskRunner`] is the single run loop that executes every posted task in
//! due order, one at a time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ports::{Task, TaskScheduler};

/// Posting side of the in-process scheduler.
#[derive(Clone)]
pub struct TokioTaskScheduler {
    sender: mpsc::UnboundedSender<(Instant, Task)>,
}

impl TokioTaskScheduler {
    /// Create a connected scheduler / runner pair.
    #[must_use]
    pub fn channel() -> (Self, TaskRunner) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let runner = TaskRunner {
            receiver,
            pending: BinaryHeap::new(),
            next_seq: 0,
        };
        (Self { sender }, runner)
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn post(&self, delay: Duration, task: Task) {
        let due = Instant::now() + delay;
        if self.sender.send((due, task)).is_err() {
            tracing::warn!(?delay, "task runner has stopped, dropping task");
        }
    }
}

struct Scheduled {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// The run loop executing posted tasks.
pub struct TaskRunner {
    receiver: mpsc::UnboundedReceiver<(Instant, Task)>,
    pending: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl TaskRunner {
    /// Run tasks until every [`TokioTaskScheduler`] has been dropped and no
    /// task remains.
    ///
    /// Tasks due at the same instant run in the order they were posted.
    pub async fn run(mut self) {
        loop {
            self.run_due();
            let received = match self.pending.peek().map(|Reverse(next)| next.due) {
                Some(due) => match tokio::time::timeout_at(due, self.receiver.recv()).await {
                    Ok(received) => received,
                    Err(_) => continue,
                },
                None => self.receiver.recv().await,
            };
            match received {
                Some((due, task)) => self.push(due, task),
                None => break,
            }
        }

        while let Some(Reverse(next)) = self.pending.pop() {
            tokio::time::sleep_until(next.due).await;
            (next.task)();
        }
        tracing::debug!("task runner stopped");
    }

    fn push(&mut self, due: Instant, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Reverse(Scheduled { due, seq, task }));
    }

    fn run_due(&mut self) {
        let now = Instant::now();
        while self
            .pending
            .peek()
            .is_some_and(|Reverse(next)| next.due <= now)
        {
            if let Some(Reverse(next)) = self.pending.pop() {
                (next.task)();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&log);
        let make = move |label: &'static str| -> Task {
            let log = Arc::clone(&handle);
            Box::new(move || log.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[tokio::test]
    async fn should_run_immediate_tasks_in_post_order() {
        let (scheduler, runner) = TokioTaskScheduler::channel();
        let (log, task) = recorder();

        scheduler.post(Duration::ZERO, task("first"));
        scheduler.post(Duration::ZERO, task("second"));
        scheduler.post(Duration::ZERO, task("third"));
        drop(scheduler);
        runner.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn should_run_delayed_task_after_immediate_one() {
        let (scheduler, runner) = TokioTaskScheduler::channel();
        let (log, task) = recorder();

        scheduler.post(Duration::from_millis(30), task("later"));
        scheduler.post(Duration::ZERO, task("now"));
        drop(scheduler);
        runner.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["now", "later"]);
    }

    #[tokio::test]
    async fn should_run_tasks_posted_from_inside_a_task() {
        let (scheduler, runner) = TokioTaskScheduler::channel();
        let (log, task) = recorder();

        let inner = scheduler.clone();
        let follow_up = task("follow-up");
        let first = task("first");
        scheduler.post(
            Duration::ZERO,
            Box::new(move || {
                first();
                inner.post(Duration::from_millis(10), follow_up);
            }),
        );
        drop(scheduler);
        runner.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "follow-up"]);
    }

    #[tokio::test]
    async fn should_drop_task_when_runner_is_gone() {
        let (scheduler, runner) = TokioTaskScheduler::channel();
        drop(runner);
        let (log, task) = recorder();

        scheduler.post(Duration::ZERO, task("lost"));

        assert!(log.lock().unwrap().is_empty());
    }
}
