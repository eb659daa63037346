//! Auto-mode symbol boundaries
//!
//! In auto mode every pointer movement re-arms a one-shot inactivity
//! deadline. A dedicated timer thread sleeps on the recorder's condvar until
//! the deadline passes without a re-arm, then atomically takes the buffer
//! and hands the drawing to the async consumer over a bounded tokio channel.
//!
//! The hand-off uses `Sender::try_send`: non-blocking, callable from any
//! thread, and wakes the single task awaiting the receiver. Capture
//! continues afterwards without leaving the Recording state.
//!
//! Boundaries fire under the session lock, and `stop()` takes the same lock,
//! so a racing stop either sees the drawing or the timer does. Never both.

use super::recorder::{RecorderState, Session, Shared};
use crate::geometry::Drawing;
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Pending drawings the hand-off channel may hold
pub const HANDOFF_CAPACITY: usize = 1;

/// Auto-mode settings for `Recorder::start`
#[derive(Debug, Clone)]
pub struct AutoModeConfig {
    /// Inactivity that ends a symbol
    pub timeout: Duration,
    /// Where completed drawings are delivered
    pub sender: mpsc::Sender<Drawing>,
}

impl AutoModeConfig {
    pub fn new(timeout: Duration, sender: mpsc::Sender<Drawing>) -> Self {
        Self { timeout, sender }
    }

    /// Config plus the receiving end of a fresh single-slot hand-off channel
    pub fn channel(timeout: Duration) -> (Self, mpsc::Receiver<Drawing>) {
        let (sender, receiver) = mpsc::channel(HANDOFF_CAPACITY);
        (Self::new(timeout, sender), receiver)
    }
}

/// Handle to the inactivity timer thread of one recording session
pub(crate) struct BoundaryTimer {
    handle: JoinHandle<()>,
}

impl BoundaryTimer {
    pub(crate) fn spawn(shared: Arc<Shared>, generation: u64) -> crate::Result<Self> {
        let handle = thread::Builder::new()
            .name("auto-boundary".into())
            .spawn(move || run_timer(&shared, generation))
            .map_err(|e| crate::Error::Capture(format!("Failed to spawn boundary timer: {}", e)))?;
        Ok(Self { handle })
    }

    /// Wait for the thread to exit. The caller must have ended the session first.
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            warn!("Boundary timer thread panicked");
        }
    }
}

fn session_over(session: &Session, generation: u64) -> bool {
    session.state != RecorderState::Recording || session.generation != generation
}

fn run_timer(shared: &Shared, generation: u64) {
    debug!("Boundary timer started");
    let mut session = shared.session.lock();

    loop {
        if session_over(&session, generation) {
            break;
        }

        let Some(deadline) = session.deadline else {
            shared.timer_wake.wait(&mut session);
            continue;
        };

        if Instant::now() < deadline {
            // Woken early by a re-arm or a stop; re-check either way
            shared.timer_wake.wait_until(&mut session, deadline);
            continue;
        }

        // Inactivity boundary: capture and clear, but keep recording
        session.deadline = None;
        let drawing = session.take_drawing();
        session.last_move = None;
        session.clock.restart();

        let Some(sender) = session.auto.as_ref().map(|a| a.sender.clone()) else {
            continue;
        };
        if drawing.is_empty() {
            debug!("Inactivity boundary with empty buffer, nothing to deliver");
            continue;
        }

        MutexGuard::unlocked(&mut session, || deliver(&sender, drawing));
    }

    debug!("Boundary timer stopped");
}

fn deliver(sender: &mpsc::Sender<Drawing>, drawing: Drawing) {
    let points = drawing.point_count();
    match sender.try_send(drawing) {
        Ok(()) => info!(points, "Symbol boundary delivered"),
        Err(TrySendError::Full(_)) => {
            warn!(points, "Previous drawing still pending; dropping gesture")
        }
        Err(TrySendError::Closed(_)) => {
            warn!(points, "Drawing consumer has gone away; dropping gesture")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::cursor::HeadlessCursor;
    use crate::capture::recorder::{Recorder, RecorderConfig};
    use crate::capture::source::ManualSource;

    fn recorder() -> Recorder {
        Recorder::new(
            Box::new(ManualSource::new()),
            Box::new(HeadlessCursor),
            RecorderConfig::default(),
        )
    }

    #[test]
    fn test_channel_is_single_slot() {
        let (config, _rx) = AutoModeConfig::channel(Duration::from_millis(10));
        assert_eq!(config.sender.max_capacity(), HANDOFF_CAPACITY);
    }

    #[test]
    fn test_boundary_delivers_and_keeps_recording() {
        let recorder = recorder();
        let (config, mut rx) = AutoModeConfig::channel(Duration::from_millis(30));
        recorder.start(Some(config)).unwrap();
        assert!(recorder.is_auto_mode());

        recorder.on_move(1.0, 1.0);
        recorder.on_move(2.0, 2.0);

        let drawing = rx.blocking_recv().unwrap();
        assert_eq!(drawing.point_count(), 2);
        assert!(recorder.is_recording());
        assert_eq!(recorder.buffered_points(), 0);

        // Next symbol in the same session
        recorder.on_move(3.0, 3.0);
        let next = rx.blocking_recv().unwrap();
        assert_eq!(next.point_count(), 1);
        // Sub-session clock restarted at the boundary
        assert!(next.points()[0].t < 1_000.0);

        recorder.stop();
    }

    #[test]
    fn test_no_boundary_without_movement() {
        let recorder = recorder();
        let (config, mut rx) = AutoModeConfig::channel(Duration::from_millis(10));
        recorder.start(Some(config)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
        recorder.stop();
    }

    #[test]
    fn test_manual_stop_sends_nothing() {
        let recorder = recorder();
        let (config, mut rx) = AutoModeConfig::channel(Duration::from_secs(5));
        recorder.start(Some(config)).unwrap();
        recorder.on_move(1.0, 1.0);

        let drawing = recorder.stop();
        assert_eq!(drawing.point_count(), 1);
        assert!(!recorder.is_auto_mode());
        // Sender dropped with the session; channel closes empty
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_stop_racing_boundary_never_duplicates() {
        for _ in 0..20 {
            let recorder = recorder();
            let (config, mut rx) = AutoModeConfig::channel(Duration::from_millis(2));
            recorder.start(Some(config)).unwrap();
            recorder.on_move(1.0, 1.0);
            thread::sleep(Duration::from_millis(2));
            let stopped = recorder.stop();

            let mut delivered = 0;
            while let Some(d) = rx.blocking_recv() {
                delivered += d.point_count();
            }
            assert_eq!(stopped.point_count() + delivered, 1);
        }
    }
}
