use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use thiserror::Error;

use crate::capture::domain::frame_source::{
    CaptureConfigurationError, CaptureFormat, FrameSource,
};
use crate::pipeline::detection_pipeline::DetectionPipeline;
use crate::pipeline::observation_snapshot::{snapshot_channel, SnapshotPublisher, SnapshotReader};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Frame counters for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub submitted: usize,
    pub dropped: usize,
    pub processed: usize,
    pub backend_failures: usize,
}

#[derive(Default)]
struct SessionShared {
    cancelled: AtomicBool,
    in_flight: AtomicBool,
    submitted: AtomicUsize,
    dropped: AtomicUsize,
    processed: AtomicUsize,
    backend_failures: AtomicUsize,
}

impl SessionShared {
    fn counts(&self) -> SessionCounts {
        SessionCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}

/// Hands frames to the pipeline worker without ever blocking or queueing.
///
/// A frame is accepted only while the worker is idle; otherwise it is
/// dropped on the spot, so a slow backend lowers the processed frame rate
/// instead of building up latency.
#[derive(Clone)]
pub struct FrameSubmitter {
    frame_tx: Sender<Frame>,
    shared: Arc<SessionShared>,
}

impl FrameSubmitter {
    /// Returns `true` if the worker took the frame.
    pub fn submit(&self, frame: Frame) -> bool {
        if self.shared.cancelled.load(Ordering::Acquire) {
            return false;
        }
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);

        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!("Worker busy, dropping frame {}", frame.index());
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if self.frame_tx.try_send(frame).is_err() {
            self.shared.in_flight.store(false, Ordering::Release);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }
}

/// Starts live sessions: a worker thread that owns the pipeline and, for
/// pull-style sources, a capture thread that feeds it.
///
/// Layout: `source → capture → [drop if busy] → worker → snapshot`
pub struct ThreadedSession;

impl ThreadedSession {
    /// Opens `source` and runs it through `pipeline` until the source is
    /// exhausted or the session is stopped.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        pipeline: DetectionPipeline,
    ) -> Result<RunningSession, CaptureConfigurationError> {
        let format = source.open()?;
        format.validate()?;
        log::info!(
            "Starting session at {}x{} ({})",
            format.width,
            format.height,
            format.orientation
        );

        let (mut session, submitter) = Self::spawn(pipeline);
        session.capture = Some(spawn_capture(source, submitter, session.shared.clone()));
        Ok(session)
    }

    /// Starts a worker fed directly through the returned submitter, for
    /// sources that push frames from their own callback thread.
    ///
    /// The worker runs until stopped or until every submitter is dropped.
    pub fn start_push(
        format: CaptureFormat,
        pipeline: DetectionPipeline,
    ) -> Result<(RunningSession, FrameSubmitter), CaptureConfigurationError> {
        format.validate()?;
        Ok(Self::spawn(pipeline))
    }

    fn spawn(pipeline: DetectionPipeline) -> (RunningSession, FrameSubmitter) {
        let shared = Arc::new(SessionShared::default());
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (publisher, reader) = snapshot_channel();

        let worker = spawn_worker(pipeline, frame_rx, stop_rx, publisher, shared.clone());

        let session = RunningSession {
            worker: Some(worker),
            capture: None,
            stop_tx: Some(stop_tx),
            shared: shared.clone(),
            reader,
        };
        let submitter = FrameSubmitter { frame_tx, shared };
        (session, submitter)
    }
}

fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    submitter: FrameSubmitter,
    shared: Arc<SessionShared>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in source.frames() {
            if shared.cancelled.load(Ordering::Acquire) {
                break;
            }
            match frame_result {
                Ok(frame) => {
                    submitter.submit(frame);
                }
                Err(e) => log::warn!("Capture error: {e}"),
            }
        }
        source.close();
    })
}

fn spawn_worker(
    mut pipeline: DetectionPipeline,
    frame_rx: Receiver<Frame>,
    stop_rx: Receiver<()>,
    publisher: SnapshotPublisher,
    shared: Arc<SessionShared>,
) -> JoinHandle<DetectionPipeline> {
    std::thread::spawn(move || {
        loop {
            let frame = crossbeam_channel::select! {
                recv(stop_rx) -> _ => break,
                recv(frame_rx) -> msg => match msg {
                    Ok(frame) => frame,
                    Err(_) => break,
                },
            };
            if shared.cancelled.load(Ordering::Acquire) {
                break;
            }

            let report = pipeline.process_frame(&frame);

            // Stopped while the backend was busy: the result is stale.
            if shared.cancelled.load(Ordering::Acquire) {
                log::debug!("Discarding result for frame {}", report.frame_index);
                break;
            }
            shared.processed.fetch_add(1, Ordering::Relaxed);
            if report.backend_failed {
                shared.backend_failures.fetch_add(1, Ordering::Relaxed);
            }
            shared.in_flight.store(false, Ordering::Release);
            // Readers keep showing the last good snapshot across failures.
            if !report.backend_failed {
                publisher.publish(report.into());
            }
        }
        pipeline.reset();
        pipeline
    })
}

/// Handle to a live session. Dropping it stops the session.
pub struct RunningSession {
    worker: Option<JoinHandle<DetectionPipeline>>,
    capture: Option<JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
    shared: Arc<SessionShared>,
    reader: SnapshotReader,
}

/// What is left once a session's threads have been joined.
pub struct StoppedSession {
    /// Reset pipeline, ready for another session.
    pub pipeline: DetectionPipeline,
    pub counts: SessionCounts,
}

impl RunningSession {
    pub fn snapshots(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn counts(&self) -> SessionCounts {
        self.shared.counts()
    }

    /// The worker has exited (source exhausted or every submitter dropped).
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Cancels the session. An in-flight backend call is allowed to finish,
    /// but its result is never published.
    pub fn stop(mut self) -> Result<StoppedSession, SessionError> {
        self.shared.cancelled.store(true, Ordering::Release);
        self.stop_tx.take();
        self.join()
    }

    /// Waits for the session to end on its own.
    ///
    /// For push sessions this blocks until every [`FrameSubmitter`] clone
    /// has been dropped.
    pub fn wait(mut self) -> Result<StoppedSession, SessionError> {
        self.join()
    }

    fn join(&mut self) -> Result<StoppedSession, SessionError> {
        if let Some(capture) = self.capture.take() {
            capture
                .join()
                .map_err(|_| SessionError::ThreadPanicked("capture"))?;
        }
        let pipeline = self
            .worker
            .take()
            .ok_or(SessionError::ThreadPanicked("worker"))?
            .join()
            .map_err(|_| SessionError::ThreadPanicked("worker"))?;
        let counts = self.shared.counts();
        log::info!(
            "Session ended: {} submitted, {} dropped, {} processed, {} backend failures",
            counts.submitted,
            counts.dropped,
            counts.processed,
            counts.backend_failures
        );
        Ok(StoppedSession { pipeline, counts })
    }
}

impl Drop for RunningSession {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        self.shared.cancelled.store(true, Ordering::Release);
        self.stop_tx.take();
        if let Err(e) = self.join() {
            log::error!("Failed to stop session: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capture::domain::frame_source::FrameResult;
    use crate::detection::domain::detection_backend::{BackendError, DetectionBackend};
    use crate::detection::domain::observation::{
        FaceObservation, Observation, TrackedObjectObservation,
    };
    use crate::detection::domain::tracking_request::TrackingRequest;
    use crate::pipeline::detection_pipeline::PipelineState;
    use crate::pipeline::observation_snapshot::WaitOutcome;
    use crate::shared::frame::PixelFormat;
    use crate::shared::geometry::NormalizedRect;
    use crate::shared::orientation::{DeviceOrientation, ImageOrientation};
    use crate::shared::settings::PipelineSettings;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn face() -> Observation {
        Observation::Face(FaceObservation::new(
            NormalizedRect::new(0.2, 0.2, 0.3, 0.3),
            0.9,
        ))
    }

    /// Backend that signals when a call starts and blocks until released.
    struct GatedBackend {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl GatedBackend {
        fn gate(&self) {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(TIMEOUT);
        }
    }

    impl DetectionBackend for GatedBackend {
        fn detect(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            _region: Option<&NormalizedRect>,
        ) -> Result<Vec<Observation>, BackendError> {
            self.gate();
            Ok(vec![face()])
        }

        fn track(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            requests: &[TrackingRequest],
        ) -> Result<Vec<TrackedObjectObservation>, BackendError> {
            self.gate();
            Ok(requests
                .iter()
                .map(|r| TrackedObjectObservation {
                    request_id: r.id,
                    observation: r.target.clone(),
                    is_final: false,
                })
                .collect())
        }
    }

    struct GateControl {
        entered: Receiver<()>,
        release: Sender<()>,
    }

    fn gated_pipeline() -> (DetectionPipeline, GateControl) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let backend = GatedBackend {
            entered: entered_tx,
            release: release_rx,
        };
        let settings = PipelineSettings {
            refine_after_tracking: false,
            ..PipelineSettings::default()
        };
        (
            DetectionPipeline::new(Box::new(backend), settings),
            GateControl {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    struct InstantBackend;

    impl DetectionBackend for InstantBackend {
        fn detect(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            _region: Option<&NormalizedRect>,
        ) -> Result<Vec<Observation>, BackendError> {
            Ok(Vec::new())
        }

        fn track(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            _requests: &[TrackingRequest],
        ) -> Result<Vec<TrackedObjectObservation>, BackendError> {
            Ok(Vec::new())
        }
    }

    struct VecSource {
        frames: usize,
        fail_open: bool,
        closed: Arc<AtomicBool>,
    }

    impl FrameSource for VecSource {
        fn open(&mut self) -> Result<CaptureFormat, CaptureConfigurationError> {
            if self.fail_open {
                return Err(CaptureConfigurationError::DeviceUnavailable(
                    "no camera".into(),
                ));
            }
            Ok(format())
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_> {
            Box::new((0..self.frames).map(|i| Ok(frame(i))))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn format() -> CaptureFormat {
        CaptureFormat {
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Bgra8,
            orientation: DeviceOrientation::Portrait,
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 64], 4, 4, DeviceOrientation::Portrait, index)
    }

    #[test]
    fn test_frame_dropped_while_worker_busy() {
        let (pipeline, gate) = gated_pipeline();
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        let reader = session.snapshots();

        assert!(submitter.submit(frame(0)));
        gate.entered.recv_timeout(TIMEOUT).unwrap();
        assert!(!submitter.submit(frame(1)));

        gate.release.send(()).unwrap();
        let WaitOutcome::Updated(snapshot) = reader.wait_for_update(TIMEOUT) else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.frame_index, 0);
        assert_eq!(snapshot.updates.len(), 1);

        assert!(submitter.submit(frame(2)));
        gate.entered.recv_timeout(TIMEOUT).unwrap();
        gate.release.send(()).unwrap();
        let WaitOutcome::Updated(snapshot) = reader.wait_for_update(TIMEOUT) else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.frame_index, 2);
        assert_eq!(snapshot.state, PipelineState::Tracking);

        let stopped = session.stop().unwrap();
        assert_eq!(
            stopped.counts,
            SessionCounts {
                submitted: 3,
                dropped: 1,
                processed: 2,
                backend_failures: 0,
            }
        );
    }

    #[test]
    fn test_stop_during_backend_call_discards_result() {
        let (pipeline, gate) = gated_pipeline();
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        let reader = session.snapshots();

        assert!(submitter.submit(frame(0)));
        gate.entered.recv_timeout(TIMEOUT).unwrap();

        let release = gate.release.clone();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            release.send(()).unwrap();
        });
        let stopped = session.stop().unwrap();
        releaser.join().unwrap();

        assert!(reader.latest().is_none());
        assert_eq!(stopped.counts.processed, 0);
        assert!(stopped.pipeline.active_tracks().is_empty());
        assert_eq!(stopped.pipeline.state(), PipelineState::Idle);
        assert!(!submitter.submit(frame(1)));
    }

    #[test]
    fn test_stopped_pipeline_starts_clean_session() {
        let (pipeline, gate) = gated_pipeline();
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        let reader = session.snapshots();
        assert!(submitter.submit(frame(0)));
        gate.release.send(()).unwrap();
        assert!(matches!(
            reader.wait_for_update(TIMEOUT),
            WaitOutcome::Updated(_)
        ));

        let stopped = session.stop().unwrap();
        assert!(stopped.pipeline.active_tracks().is_empty());

        let (session, submitter) =
            ThreadedSession::start_push(format(), stopped.pipeline).unwrap();
        let reader = session.snapshots();
        assert!(submitter.submit(frame(1)));
        gate.release.send(()).unwrap();
        // Empty track set means the first frame of the new session detects.
        let WaitOutcome::Updated(snapshot) = reader.wait_for_update(TIMEOUT) else {
            panic!("expected a snapshot");
        };
        let ids: Vec<_> = snapshot.updates.iter().map(|u| u.track_id).collect();
        assert_eq!(ids, vec![Some(2)]);
        session.stop().unwrap();
    }

    #[test]
    fn test_pull_source_runs_to_completion() {
        let closed = Arc::new(AtomicBool::new(false));
        let source = VecSource {
            frames: 20,
            fail_open: false,
            closed: closed.clone(),
        };
        let pipeline = DetectionPipeline::new(Box::new(InstantBackend), PipelineSettings::default());

        let session = ThreadedSession::start(Box::new(source), pipeline).unwrap();
        let stopped = session.wait().unwrap();

        let counts = stopped.counts;
        assert_eq!(counts.submitted, 20);
        assert!(counts.processed >= 1);
        assert_eq!(counts.processed + counts.dropped, counts.submitted);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_start_fails_when_source_cannot_open() {
        let source = VecSource {
            frames: 0,
            fail_open: true,
            closed: Arc::new(AtomicBool::new(false)),
        };
        let pipeline = DetectionPipeline::new(Box::new(InstantBackend), PipelineSettings::default());
        assert!(matches!(
            ThreadedSession::start(Box::new(source), pipeline),
            Err(CaptureConfigurationError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_push_rejects_zero_resolution() {
        let pipeline = DetectionPipeline::new(Box::new(InstantBackend), PipelineSettings::default());
        let bad = CaptureFormat {
            width: 0,
            ..format()
        };
        assert!(ThreadedSession::start_push(bad, pipeline).is_err());
    }

    #[test]
    fn test_dropping_session_stops_worker() {
        let pipeline = DetectionPipeline::new(Box::new(InstantBackend), PipelineSettings::default());
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        drop(session);
        assert!(!submitter.submit(frame(0)));
    }

    #[test]
    fn test_worker_exits_when_submitters_dropped() {
        let pipeline = DetectionPipeline::new(Box::new(InstantBackend), PipelineSettings::default());
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        drop(submitter);
        let stopped = session.wait().unwrap();
        assert_eq!(stopped.counts, SessionCounts::default());
    }

    struct FailingBackend;

    impl DetectionBackend for FailingBackend {
        fn detect(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            _region: Option<&NormalizedRect>,
        ) -> Result<Vec<Observation>, BackendError> {
            Err(BackendError::Internal("camera busy".into()))
        }

        fn track(
            &mut self,
            _frame: &Frame,
            _orientation: ImageOrientation,
            _requests: &[TrackingRequest],
        ) -> Result<Vec<TrackedObjectObservation>, BackendError> {
            Err(BackendError::Internal("camera busy".into()))
        }
    }

    #[test]
    fn test_failed_frames_are_counted_but_not_published() {
        let pipeline = DetectionPipeline::new(Box::new(FailingBackend), PipelineSettings::default());
        let (session, submitter) = ThreadedSession::start_push(format(), pipeline).unwrap();
        let reader = session.snapshots();

        assert!(submitter.submit(frame(0)));
        drop(submitter);
        let stopped = session.wait().unwrap();

        assert_eq!(stopped.counts.processed, 1);
        assert_eq!(stopped.counts.backend_failures, 1);
        assert!(reader.latest().is_none());
    }
}
