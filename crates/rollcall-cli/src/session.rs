//! Orchestration: the camera attendance loop and single-photo recognition.
//!
//! The camera loop runs on a dedicated worker thread so the presentation
//! layer stays responsive; frames are captured and processed strictly one
//! at a time, in capture order. Events flow back over a tokio channel.

use crate::notify::Notifier;
use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use image::GrayImage;
use rollcall_core::{recognize, EmbeddingProvider, Registry};
use rollcall_hw::{Camera, CameraError};
use rollcall_ledger::{Ledger, MarkResult};
use std::path::Path;
use tokio::sync::{mpsc, watch};

/// Everything a recognition pass needs, built once per process and passed
/// by reference. No process-global state.
pub struct AppContext {
    pub registry: Registry,
    pub provider: Box<dyn EmbeddingProvider + Send>,
    pub ledger: Ledger,
    pub threshold: f32,
}

/// Why the camera loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An explicit stop was requested.
    Requested,
    /// The camera became unavailable or stopped delivering frames.
    CameraDisconnected,
}

/// Events surfaced from the camera worker to the presentation layer.
#[derive(Debug)]
pub enum SessionEvent {
    Recognized { name: String, outcome: MarkResult },
    Stopped { reason: StopReason },
}

/// Handle to a running camera session. The fields are independent so the
/// caller can wait on events while holding the stop signal.
pub struct SessionHandle {
    pub events: mpsc::Receiver<SessionEvent>,
    pub stop: StopSignal,
}

/// Requests a graceful stop of the camera loop. Any in-flight recognition
/// completes first.
pub struct StopSignal(watch::Sender<bool>);

impl StopSignal {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// Outcome of single-photo recognition.
#[derive(Debug)]
pub enum PhotoOutcome {
    /// At least one enrolled identity was found; per-name mark outcomes.
    Recognized(Vec<(String, MarkResult)>),
    /// No enrolled identity was found in the image.
    NoMatch,
}

/// Run recognition and attendance marking for one frame.
///
/// Recognition failure skips the frame. Ledger failures are logged per name
/// and never abort the remaining names. Presentation side effects go through
/// the notifier after a successful mark and cannot affect it.
pub fn process_frame(
    ctx: &mut AppContext,
    frame: &GrayImage,
    now: NaiveDateTime,
    notifier: &mut dyn Notifier,
) -> Vec<(String, MarkResult)> {
    let recognitions = match recognize(frame, &ctx.registry, ctx.provider.as_mut(), ctx.threshold)
    {
        Ok(recognitions) => recognitions,
        Err(err) => {
            tracing::warn!(error = %err, "recognition failed, skipping frame");
            return Vec::new();
        }
    };

    let mut outcomes = Vec::new();
    for recognition in recognitions {
        match ctx.ledger.mark(&recognition.name, now) {
            Ok(outcome) => {
                if outcome == MarkResult::Marked {
                    notifier.welcome(&recognition.name);
                }
                outcomes.push((recognition.name, outcome));
            }
            Err(err) => {
                tracing::error!(
                    name = %recognition.name,
                    error = %err,
                    "failed to record attendance"
                );
            }
        }
    }
    outcomes
}

/// Spawn the camera loop on a dedicated worker thread.
///
/// The worker owns the context. The loop ends on a stop request or when the
/// camera reports a fetch failure; either way the process stays alive and a
/// final [`SessionEvent::Stopped`] is emitted.
pub fn spawn_camera_session(
    mut ctx: AppContext,
    device: String,
    mut notifier: Box<dyn Notifier>,
) -> SessionHandle {
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(16);
    let (stop_tx, stop_rx) = watch::channel(false);

    std::thread::Builder::new()
        .name("rollcall-camera".into())
        .spawn(move || {
            let reason = run_camera_loop(&mut ctx, &device, notifier.as_mut(), &stop_rx, &event_tx);
            let _ = event_tx.blocking_send(SessionEvent::Stopped { reason });
            tracing::info!(?reason, "camera worker exiting");
        })
        .expect("failed to spawn camera worker");

    SessionHandle {
        events: event_rx,
        stop: StopSignal(stop_tx),
    }
}

fn run_camera_loop(
    ctx: &mut AppContext,
    device: &str,
    notifier: &mut dyn Notifier,
    stop: &watch::Receiver<bool>,
    events: &mpsc::Sender<SessionEvent>,
) -> StopReason {
    let camera = match Camera::open(device) {
        Ok(camera) => camera,
        Err(err) => {
            tracing::error!(device, error = %err, "camera unavailable");
            notifier.status(&format!("camera unavailable: {err}"));
            return StopReason::CameraDisconnected;
        }
    };

    let mut stream = match camera.stream() {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(device, error = %err, "failed to start capture");
            notifier.status(&format!("camera failed to start: {err}"));
            return StopReason::CameraDisconnected;
        }
    };

    notifier.status("camera started");

    loop {
        if *stop.borrow() {
            notifier.status("camera session ended");
            return StopReason::Requested;
        }

        let frame = match stream.next_frame() {
            Ok(frame) => frame,
            Err(CameraError::Disconnected(err)) => {
                tracing::warn!(error = %err, "camera disconnected");
                notifier.status("camera disconnected");
                return StopReason::CameraDisconnected;
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame fetch failed, stopping");
                notifier.status("camera stopped capturing");
                return StopReason::CameraDisconnected;
            }
        };

        let Some(image) = frame.into_gray_image() else {
            tracing::warn!("frame buffer size mismatch, skipping");
            continue;
        };

        let now = Local::now().naive_local();
        for (name, outcome) in process_frame(ctx, &image, now, notifier) {
            let _ = events.blocking_send(SessionEvent::Recognized { name, outcome });
        }
    }
}

/// Recognize a single externally supplied photo and mark attendance for
/// every recognized identity.
pub fn run_photo(
    ctx: &mut AppContext,
    path: &Path,
    notifier: &mut dyn Notifier,
) -> anyhow::Result<PhotoOutcome> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .to_luma8();

    let outcomes = process_frame(ctx, &image, Local::now().naive_local(), notifier);
    if outcomes.is_empty() {
        Ok(PhotoOutcome::NoMatch)
    } else {
        Ok(PhotoOutcome::Recognized(outcomes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{
        BoundingBox, DetectedFace, Embedding, KnownIdentity, ProviderError,
    };

    struct FixedProvider {
        faces: Vec<DetectedFace>,
    }

    impl EmbeddingProvider for FixedProvider {
        fn detect_and_embed(
            &mut self,
            _frame: &GrayImage,
        ) -> Result<Vec<DetectedFace>, ProviderError> {
            Ok(self.faces.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        welcomes: Vec<String>,
    }

    impl Notifier for RecordingNotifier {
        fn welcome(&mut self, name: &str) {
            self.welcomes.push(name.to_string());
        }
        fn status(&mut self, _message: &str) {}
    }

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding {
            values,
            model_version: None,
        }
    }

    fn face(values: Vec<f32>) -> DetectedFace {
        DetectedFace {
            embedding: embedding(values),
            region: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 8.0,
                height: 8.0,
                confidence: 0.9,
                landmarks: None,
            },
        }
    }

    fn context(tmp: &tempfile::TempDir, faces: Vec<DetectedFace>) -> AppContext {
        AppContext {
            registry: Registry::from_entries(vec![KnownIdentity {
                name: "Alice".to_string(),
                embedding: embedding(vec![1.0, 0.0]),
            }]),
            provider: Box::new(FixedProvider { faces }),
            ledger: Ledger::open(tmp.path().join("attendance.csv")).unwrap(),
            threshold: 0.5,
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_process_frame_marks_and_welcomes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(&tmp, vec![face(vec![1.0, 0.0])]);
        let mut notifier = RecordingNotifier::default();

        let outcomes =
            process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:00:00"), &mut notifier);

        assert_eq!(outcomes, vec![("Alice".to_string(), MarkResult::Marked)]);
        assert_eq!(notifier.welcomes, vec!["Alice"]);
        assert_eq!(ctx.ledger.records().unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_frames_same_day_collapse_to_one_record() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(&tmp, vec![face(vec![1.0, 0.0])]);
        let mut notifier = RecordingNotifier::default();

        process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:00:00"), &mut notifier);
        let outcomes =
            process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:05:00"), &mut notifier);

        assert_eq!(
            outcomes,
            vec![("Alice".to_string(), MarkResult::AlreadyMarked)]
        );
        // No second welcome, no second row.
        assert_eq!(notifier.welcomes, vec!["Alice"]);
        assert_eq!(ctx.ledger.records().unwrap().len(), 1);
    }

    #[test]
    fn test_next_day_marks_again() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(&tmp, vec![face(vec![1.0, 0.0])]);
        let mut notifier = RecordingNotifier::default();

        process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:00:00"), &mut notifier);
        let outcomes =
            process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-02 09:00:00"), &mut notifier);

        assert_eq!(outcomes, vec![("Alice".to_string(), MarkResult::Marked)]);
        assert_eq!(ctx.ledger.records().unwrap().len(), 2);
    }

    #[test]
    fn test_unrecognized_frame_yields_no_outcomes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(&tmp, vec![face(vec![-1.0, 0.0])]);
        let mut notifier = RecordingNotifier::default();

        let outcomes =
            process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:00:00"), &mut notifier);

        assert!(outcomes.is_empty());
        assert!(ctx.ledger.records().unwrap().is_empty());
    }

    #[test]
    fn test_empty_registry_frame_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(&tmp, vec![face(vec![1.0, 0.0])]);
        ctx.registry = Registry::from_entries(vec![]);
        let mut notifier = RecordingNotifier::default();

        let outcomes =
            process_frame(&mut ctx, &GrayImage::new(64, 48), at("2024-01-01 09:00:00"), &mut notifier);

        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_run_photo_no_match() {
        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("group.png");
        GrayImage::new(64, 48).save(&photo).unwrap();

        let mut ctx = context(&tmp, vec![]);
        let mut notifier = RecordingNotifier::default();

        let outcome = run_photo(&mut ctx, &photo, &mut notifier).unwrap();
        assert!(matches!(outcome, PhotoOutcome::NoMatch));
    }

    #[test]
    fn test_run_photo_recognized() {
        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("group.png");
        GrayImage::new(64, 48).save(&photo).unwrap();

        let mut ctx = context(&tmp, vec![face(vec![1.0, 0.0])]);
        let mut notifier = RecordingNotifier::default();

        let outcome = run_photo(&mut ctx, &photo, &mut notifier).unwrap();
        match outcome {
            PhotoOutcome::Recognized(outcomes) => {
                assert_eq!(outcomes, vec![("Alice".to_string(), MarkResult::Marked)]);
            }
            PhotoOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn test_run_photo_unreadable_image_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("bogus.png");
        std::fs::write(&photo, b"not an image").unwrap();

        let mut ctx = context(&tmp, vec![]);
        let mut notifier = RecordingNotifier::default();

        assert!(run_photo(&mut ctx, &photo, &mut notifier).is_err());
    }
}
