//! Worker-thread notification dispatch.
//!
//! # Responsibility
//! - Move blocking backend calls off the coordination context.
//! - Marshal failures back through a channel drained on the next tick.
//!
//! # Invariants
//! - Commands are processed in send order.
//! - Dropping the scheduler shuts the worker down and joins it.

use crate::model::interval::IntervalId;
use crate::notify::scheduler::{
    NotificationBackend, NotificationScheduler, NotifyError, NotifyFailure, NotifyResult,
    ReminderRequest,
};
use log::{error, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

const WORKER_THREAD_NAME: &str = "intervals-notify";

enum Command {
    Schedule(ReminderRequest),
    Cancel(IntervalId),
    Flush(Sender<()>),
    Shutdown,
}

/// Fire-and-forget scheduler backed by one worker thread.
pub struct ThreadedNotificationScheduler {
    commands: Sender<Command>,
    failures: Receiver<NotifyFailure>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedNotificationScheduler {
    /// Spawns the worker thread that owns `backend`.
    ///
    /// # Errors
    /// - Returns an error when the OS refuses to spawn the thread.
    pub fn spawn<B: NotificationBackend>(backend: B) -> std::io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (failure_tx, failure_rx) = mpsc::channel::<NotifyFailure>();
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(backend, command_rx, failure_tx))?;

        Ok(Self {
            commands: command_tx,
            failures: failure_rx,
            worker: Some(worker),
        })
    }

    /// Blocks until every command sent so far has been processed.
    pub fn flush(&self) -> NotifyResult<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.commands
            .send(Command::Flush(done_tx))
            .map_err(|_| NotifyError::Disconnected)?;
        done_rx.recv().map_err(|_| NotifyError::Disconnected)
    }

    fn send(&self, command: Command) -> NotifyResult<()> {
        self.commands
            .send(command)
            .map_err(|_| NotifyError::Disconnected)
    }
}

impl NotificationScheduler for ThreadedNotificationScheduler {
    fn schedule(&mut self, request: ReminderRequest) -> NotifyResult<()> {
        self.send(Command::Schedule(request))
    }

    fn cancel(&mut self, id: IntervalId) -> NotifyResult<()> {
        self.send(Command::Cancel(id))
    }

    fn drain_failures(&mut self) -> Vec<NotifyFailure> {
        self.failures.try_iter().collect()
    }
}

impl Drop for ThreadedNotificationScheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("event=notify_worker_join module=notify status=error error_code=worker_panicked");
            }
        }
    }
}

fn run_worker<B: NotificationBackend>(
    mut backend: B,
    commands: Receiver<Command>,
    failures: Sender<NotifyFailure>,
) {
    for command in commands {
        let (id, result) = match command {
            Command::Schedule(request) => (request.id, backend.schedule(&request)),
            Command::Cancel(id) => (id, backend.cancel(id)),
            Command::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            Command::Shutdown => break,
        };

        if let Err(error) = result {
            warn!("event=notify_dispatch module=notify status=error id={id} error={error}");
            if failures.send(NotifyFailure { id, error }).is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadedNotificationScheduler;
    use crate::model::interval::IntervalId;
    use crate::notify::scheduler::{
        NotificationBackend, NotificationScheduler, NotifyError, NotifyResult, ReminderRequest,
    };
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct SharedLog(Arc<Mutex<Vec<String>>>);

    struct DenyingBackend {
        log: SharedLog,
    }

    impl NotificationBackend for DenyingBackend {
        fn schedule(&mut self, request: &ReminderRequest) -> NotifyResult<()> {
            self.log.0.lock().unwrap().push(format!("schedule {}", request.id));
            Err(NotifyError::Denied)
        }

        fn cancel(&mut self, id: IntervalId) -> NotifyResult<()> {
            self.log.0.lock().unwrap().push(format!("cancel {id}"));
            Ok(())
        }
    }

    #[test]
    fn failures_are_reported_back_in_order() {
        let log = SharedLog::default();
        let mut scheduler =
            ThreadedNotificationScheduler::spawn(DenyingBackend { log: log.clone() }).unwrap();
        let id = Uuid::new_v4();
        let fire_at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        scheduler.cancel(id).unwrap();
        scheduler
            .schedule(ReminderRequest {
                id,
                title: "t".to_string(),
                body: "b".to_string(),
                fire_at,
            })
            .unwrap();
        scheduler.flush().unwrap();

        let calls = log.0.lock().unwrap().clone();
        assert_eq!(calls, vec![format!("cancel {id}"), format!("schedule {id}")]);

        let failures = scheduler.drain_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, id);
        assert_eq!(failures[0].error, NotifyError::Denied);
        assert!(scheduler.drain_failures().is_empty());
    }
}
