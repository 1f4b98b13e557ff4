//! Progress channel: one ordered event stream per job.
//!
//! The coordinator is the only writer. Percentages never go backwards and
//! every stream ends with exactly one `Done` event. Delivery is best-effort:
//! a dropped receiver does not affect the job.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::ErrorClass;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { record_id: String },
    Failed { error: ErrorClass, message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// A progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Intermediate milestone.
    Info {
        /// Empty for input errors raised before a job id exists.
        job_id: String,
        message: String,
        percent: u8,
    },
    /// Terminal event.
    Done {
        job_id: String,
        message: String,
        percent: u8,
        outcome: JobOutcome,
    },
}

impl ProgressEvent {
    pub fn job_id(&self) -> &str {
        match self {
            ProgressEvent::Info { job_id, .. } | ProgressEvent::Done { job_id, .. } => job_id,
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            ProgressEvent::Info { percent, .. } | ProgressEvent::Done { percent, .. } => *percent,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ProgressEvent::Done { .. })
    }
}

/// Side observer for every emitted event (WebSocket fan-out, metrics).
pub type ProgressObserver = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Writer half of a job's progress channel.
pub struct ProgressReporter {
    job_id: String,
    tx: mpsc::UnboundedSender<ProgressEvent>,
    observer: Option<ProgressObserver>,
    last_percent: u8,
}

impl ProgressReporter {
    pub fn new(
        tx: mpsc::UnboundedSender<ProgressEvent>,
        observer: Option<ProgressObserver>,
    ) -> Self {
        Self {
            job_id: String::new(),
            tx,
            observer,
            last_percent: 0,
        }
    }

    /// Creates a connected reporter/receiver pair.
    pub fn channel(
        observer: Option<ProgressObserver>,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, observer), rx)
    }

    /// Binds subsequent events to a job id.
    pub fn bind(&mut self, job_id: &str) {
        self.job_id = job_id.to_string();
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Emits a milestone. Percent is clamped so the stream never goes backwards.
    pub fn info(&mut self, message: impl Into<String>, percent: u8) {
        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;
        self.emit(ProgressEvent::Info {
            job_id: self.job_id.clone(),
            message: message.into(),
            percent,
        });
    }

    /// Emits the terminal event and closes the stream.
    pub fn finish(mut self, outcome: JobOutcome) {
        let (message, percent) = match &outcome {
            JobOutcome::Succeeded { .. } => ("Upload complete".to_string(), 100),
            JobOutcome::Failed { message, .. } => (message.clone(), self.last_percent),
        };
        self.last_percent = percent;
        self.emit(ProgressEvent::Done {
            job_id: self.job_id.clone(),
            message,
            percent,
            outcome,
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
        // Receiver may be gone; the job carries on regardless.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_percent_never_decreases() {
        let (mut reporter, mut rx) = ProgressReporter::channel(None);
        reporter.bind("job-1");
        reporter.info("a", 10);
        reporter.info("b", 5);
        reporter.info("c", 40);
        reporter.info("d", 250);
        reporter.finish(JobOutcome::Succeeded {
            record_id: "r1".to_string(),
        });

        let events = drain(&mut rx);
        let percents: Vec<u8> = events.iter().map(|e| e.percent()).collect();
        assert_eq!(percents, vec![10, 10, 40, 100, 100]);
        assert!(events.last().unwrap().is_done());
        assert_eq!(events[0].job_id(), "job-1");
    }

    #[test]
    fn test_failure_keeps_last_percent() {
        let (mut reporter, mut rx) = ProgressReporter::channel(None);
        reporter.bind("job-1");
        reporter.info("encoding", 30);
        reporter.finish(JobOutcome::Failed {
            error: ErrorClass::TotalEncodeFailure,
            message: "All 3 renditions failed".to_string(),
        });

        let events = drain(&mut rx);
        match events.last().unwrap() {
            ProgressEvent::Done {
                percent, outcome, ..
            } => {
                assert_eq!(*percent, 30);
                assert!(!outcome.is_success());
            }
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (mut reporter, rx) = ProgressReporter::channel(None);
        drop(rx);
        reporter.info("still running", 50);
        reporter.finish(JobOutcome::Succeeded {
            record_id: "r1".to_string(),
        });
    }

    #[test]
    fn test_observer_sees_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: ProgressObserver = Arc::new(move |event: &ProgressEvent| {
            sink.lock().unwrap().push(event.percent());
        });

        let (mut reporter, _rx) = ProgressReporter::channel(Some(observer));
        reporter.info("a", 5);
        reporter.info("b", 50);
        reporter.finish(JobOutcome::Succeeded {
            record_id: "r1".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), vec![5, 50, 100]);
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::Done {
            job_id: "job-1".to_string(),
            message: "Upload complete".to_string(),
            percent: 100,
            outcome: JobOutcome::Succeeded {
                record_id: "r1".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["outcome"]["result"], "succeeded");
        assert_eq!(json["outcome"]["record_id"], "r1");

        let failed = JobOutcome::Failed {
            error: ErrorClass::InputError,
            message: "No source file supplied".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["error"], "input_error");
    }
}
