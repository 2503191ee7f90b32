#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use intervals_core::{
    IntervalEntity, IntervalId, IntervalStore, NotificationScheduler, NotifyError, NotifyResult,
    ReminderRequest, RepoError, RepoResult,
};
use std::sync::{Arc, Mutex};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// One call observed by [`RecordingScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Schedule(IntervalId, NaiveDateTime),
    Cancel(IntervalId),
}

/// Scheduler that records calls and can refuse permission.
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    calls: Arc<Mutex<Vec<Call>>>,
    deny: bool,
}

impl RecordingScheduler {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: IntervalId) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::Schedule(call_id, _) | Call::Cancel(call_id) => *call_id == id,
            })
            .collect()
    }
}

impl NotificationScheduler for RecordingScheduler {
    fn schedule(&mut self, request: ReminderRequest) -> NotifyResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Schedule(request.id, request.fire_at));
        if self.deny {
            Err(NotifyError::Denied)
        } else {
            Ok(())
        }
    }

    fn cancel(&mut self, id: IntervalId) -> NotifyResult<()> {
        self.calls.lock().unwrap().push(Call::Cancel(id));
        Ok(())
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingStore;

impl IntervalStore for FailingStore {
    fn load_all(&self) -> RepoResult<Vec<IntervalEntity>> {
        Ok(Vec::new())
    }

    fn save_all(&mut self, _intervals: &[IntervalEntity]) -> RepoResult<()> {
        Err(RepoError::InvalidData("disk unavailable".to_string()))
    }
}
