use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use crate::pipeline::detection_pipeline::{FrameReport, ObservationUpdate, PipelineState};

/// The most recent set of observation updates, as published to readers.
///
/// Readers replace whatever they displayed before with the snapshot's
/// updates; updates are never accumulated across snapshots.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationSnapshot {
    pub frame_index: usize,
    pub state: PipelineState,
    pub updates: Vec<ObservationUpdate>,
}

impl From<FrameReport> for ObservationSnapshot {
    fn from(report: FrameReport) -> Self {
        Self {
            frame_index: report.frame_index,
            state: report.state,
            updates: report.updates,
        }
    }
}

/// Result of waiting for a new snapshot.
#[derive(Debug)]
pub enum WaitOutcome {
    Updated(Arc<ObservationSnapshot>),
    TimedOut,
    /// The publisher is gone; no further snapshots will arrive.
    Closed,
}

type Slot = Arc<Mutex<Option<Arc<ObservationSnapshot>>>>;

/// Creates a replace-latest hand-off between the pipeline worker and any
/// number of readers.
pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotReader) {
    let slot: Slot = Arc::new(Mutex::new(None));
    let (notify_tx, notify_rx) = crossbeam_channel::bounded(1);
    (
        SnapshotPublisher {
            slot: slot.clone(),
            notify: notify_tx,
        },
        SnapshotReader {
            slot,
            notify: notify_rx,
        },
    )
}

/// Write side, owned by the pipeline worker.
pub struct SnapshotPublisher {
    slot: Slot,
    notify: Sender<()>,
}

impl SnapshotPublisher {
    /// Replaces the current snapshot. Never blocks on readers.
    pub fn publish(&self, snapshot: ObservationSnapshot) {
        *lock(&self.slot) = Some(Arc::new(snapshot));
        // Full means a wake-up is already pending for the new value.
        let _ = self.notify.try_send(());
    }
}

/// Read side. Cloning a reader shares the wake-up signal: each publication
/// wakes at most one waiting clone.
#[derive(Clone)]
pub struct SnapshotReader {
    slot: Slot,
    notify: Receiver<()>,
}

impl SnapshotReader {
    /// The latest published snapshot, if any.
    pub fn latest(&self) -> Option<Arc<ObservationSnapshot>> {
        lock(&self.slot).clone()
    }

    /// Blocks until a snapshot newer than the last wait is published.
    pub fn wait_for_update(&self, timeout: Duration) -> WaitOutcome {
        match self.notify.recv_timeout(timeout) {
            Ok(()) => match self.latest() {
                Some(snapshot) => WaitOutcome::Updated(snapshot),
                None => WaitOutcome::TimedOut,
            },
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Closed,
        }
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Arc<ObservationSnapshot>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
