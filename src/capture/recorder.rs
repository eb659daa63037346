//! Drawing Recorder
//!
//! Stateful capture engine between the OS pointer callback thread and the
//! recognition pipeline.
//!
//! ```text
//!          start()                 stop()
//!   Idle ──────────▶ Recording ──────────▶ Idle
//!                     │     ▲
//!       reset_cursor()│     │ relocation done
//!                     ▼     │
//!                   Resetting (capture suppressed)
//! ```
//!
//! All buffer state lives behind a single mutex. The pointer callback holds
//! it only long enough to append one point; control calls hold it only long
//! enough to swap buffers. Nothing blocking (source detach, cursor warps,
//! channel sends) runs while it is held.

use super::auto_mode::{AutoModeConfig, BoundaryTimer};
use super::cursor::{CursorControl, ScreenPosition};
use super::source::PointerSource;
use crate::geometry::{flatten_strokes, Drawing, Point, Stroke};
use crate::time::SessionClock;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Default pause that closes the live stroke (milliseconds); a cursor reset drops only the live stroke
pub const DEFAULT_STROKE_GAP_MS: u64 = 300;

/// Default wait after a cursor warp so its move event is swallowed
pub const DEFAULT_CURSOR_SETTLE_MS: u64 = 50;

/// Externally visible recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not capturing
    Idle,
    /// Capturing pointer movement
    Recording,
}

/// Recorder tuning
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// A movement arriving later than this after the previous one starts a new stroke
    pub stroke_gap: Duration,
    /// Time to keep capture suppressed after a cursor warp
    pub cursor_settle: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            stroke_gap: Duration::from_millis(DEFAULT_STROKE_GAP_MS),
            cursor_settle: Duration::from_millis(DEFAULT_CURSOR_SETTLE_MS),
        }
    }
}

/// Auto-mode wiring kept for the lifetime of a session
pub(crate) struct AutoSlot {
    pub(crate) timeout: Duration,
    pub(crate) sender: mpsc::Sender<Drawing>,
}

/// Mutable capture state, guarded by `Shared::session`
pub(crate) struct Session {
    pub(crate) state: RecorderState,
    pub(crate) resetting: bool,
    pub(crate) clock: SessionClock,
    pub(crate) strokes: Vec<Stroke>,
    pub(crate) current: Stroke,
    pub(crate) last_move: Option<Instant>,
    pub(crate) auto: Option<AutoSlot>,
    /// Inactivity deadline, re-armed by every movement in auto mode
    pub(crate) deadline: Option<Instant>,
    /// Bumped on every start/stop so a stale timer thread can tell it is finished
    pub(crate) generation: u64,
}

impl Session {
    fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            resetting: false,
            clock: SessionClock::start(),
            strokes: Vec::new(),
            current: Vec::new(),
            last_move: None,
            auto: None,
            deadline: None,
            generation: 0,
        }
    }

    /// Move every buffered point out as a drawing.
    ///
    /// The live strokes are flattened and segmented again with the same rule
    /// the store applies when reading a drawing back, so a recorded drawing
    /// and its stored copy have identical strokes.
    pub(crate) fn take_drawing(&mut self) -> Drawing {
        let mut points = flatten_strokes(&std::mem::take(&mut self.strokes));
        points.append(&mut self.current);
        Drawing::from_points(&points)
    }

    fn clear(&mut self) {
        self.strokes.clear();
        self.current.clear();
        self.last_move = None;
        self.deadline = None;
    }
}

/// State shared between the recorder, its pointer sinks and the boundary timer
pub(crate) struct Shared {
    pub(crate) session: Mutex<Session>,
    pub(crate) timer_wake: Condvar,
    stroke_gap: Duration,
}

impl Shared {
    fn on_move(&self, x: f64, y: f64) {
        let mut session = self.session.lock();
        if session.state != RecorderState::Recording || session.resetting {
            return;
        }

        let now = Instant::now();
        let t = SessionClock::millis_between(session.clock.origin(), now);

        if let Some(last) = session.last_move {
            if now.saturating_duration_since(last) > self.stroke_gap && !session.current.is_empty() {
                let stroke = std::mem::take(&mut session.current);
                session.strokes.push(stroke);
            }
        }

        session.current.push(Point { x, y, t });
        session.last_move = Some(now);

        if let Some(timeout) = session.auto.as_ref().map(|a| a.timeout) {
            session.deadline = Some(now + timeout);
            self.timer_wake.notify_one();
        }

        trace!("Captured move at ({:.1}, {:.1}) t={:.1}ms", x, y, t);
    }
}

/// Handle given to pointer sources; cheap to clone and safe to call from any thread
#[derive(Clone)]
pub struct PointerSink {
    shared: Arc<Shared>,
}

impl PointerSink {
    /// Deliver one pointer movement
    #[inline]
    pub fn on_move(&self, x: f64, y: f64) {
        self.shared.on_move(x, y);
    }
}

/// Live pointer recorder
pub struct Recorder {
    shared: Arc<Shared>,
    source: Mutex<Box<dyn PointerSource>>,
    cursor: Box<dyn CursorControl>,
    timer: Mutex<Option<BoundaryTimer>>,
    config: RecorderConfig,
}

impl Recorder {
    /// Create an idle recorder over a pointer source and cursor controller
    pub fn new(
        source: Box<dyn PointerSource>,
        cursor: Box<dyn CursorControl>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session::new()),
                timer_wake: Condvar::new(),
                stroke_gap: config.stroke_gap,
            }),
            source: Mutex::new(source),
            cursor,
            timer: Mutex::new(None),
            config,
        }
    }

    /// Begin a recording session.
    ///
    /// With `auto` set, the recorder detects symbol boundaries itself: after
    /// `auto.timeout` without movement the buffered drawing is handed to
    /// `auto.sender` and capture continues for the next symbol.
    pub fn start(&self, auto: Option<AutoModeConfig>) -> crate::Result<()> {
        let generation = {
            let mut session = self.shared.session.lock();
            if session.state == RecorderState::Recording {
                return Err(crate::Error::Capture("Recorder already recording".into()));
            }
            session.clear();
            session.clock.restart();
            session.resetting = false;
            session.generation += 1;
            session.auto = auto.map(|a| AutoSlot {
                timeout: a.timeout,
                sender: a.sender,
            });
            session.state = RecorderState::Recording;
            session.generation
        };

        let sink = self.sink();
        if let Err(e) = self.source.lock().attach(sink) {
            let mut session = self.shared.session.lock();
            session.state = RecorderState::Idle;
            session.auto = None;
            session.generation += 1;
            return Err(e);
        }

        let auto_timeout = self.shared.session.lock().auto.as_ref().map(|a| a.timeout);
        if let Some(timeout) = auto_timeout {
            match BoundaryTimer::spawn(Arc::clone(&self.shared), generation) {
                Ok(timer) => *self.timer.lock() = Some(timer),
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
            info!(timeout_ms = timeout.as_millis() as u64, "Recording started in auto mode");
        } else {
            info!("Recording started");
        }

        Ok(())
    }

    /// End the session and return everything buffered since the last boundary.
    ///
    /// Returns an empty drawing when not recording. In auto mode this is a
    /// manual stop: the buffer is cleared and nothing is sent on the channel.
    pub fn stop(&self) -> Drawing {
        let drawing = {
            let mut session = self.shared.session.lock();
            if session.state != RecorderState::Recording {
                return Drawing::default();
            }
            session.state = RecorderState::Idle;
            session.generation += 1;
            session.auto = None;
            session.deadline = None;
            let drawing = session.take_drawing();
            session.clear();
            drawing
        };
        self.shared.timer_wake.notify_all();

        self.source.lock().detach();
        if let Some(timer) = self.timer.lock().take() {
            timer.join();
        }

        info!(
            strokes = drawing.stroke_count(),
            points = drawing.point_count(),
            "Recording stopped"
        );
        drawing
    }

    /// Move the physical pointer without recording the jump.
    ///
    /// `None` targets the default re-centering position of the main display.
    /// Failures are logged and swallowed; an active recording continues.
    pub fn reset_cursor(&self, target: Option<ScreenPosition>) {
        self.shared.session.lock().resetting = true;

        let moved = target
            .map(Ok)
            .unwrap_or_else(|| self.cursor.default_target())
            .and_then(|position| {
                self.cursor.warp(position)?;
                Ok(position)
            });

        match moved {
            Ok(position) => {
                debug!("Cursor reset to ({:.0}, {:.0})", position.x, position.y);
                // Let the warp's own move event arrive while capture is suppressed
                std::thread::sleep(self.config.cursor_settle);
            }
            Err(e) => warn!("Could not reset cursor: {}", e),
        }

        let mut session = self.shared.session.lock();
        session.resetting = false;
        session.current.clear();
        session.last_move = Some(Instant::now());
    }

    /// Feed one pointer movement (same path the OS callback uses)
    pub fn on_move(&self, x: f64, y: f64) {
        self.shared.on_move(x, y);
    }

    /// Handle for pointer sources and test drivers
    pub fn sink(&self) -> PointerSink {
        PointerSink {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.shared.session.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Whether the current session detects boundaries automatically
    pub fn is_auto_mode(&self) -> bool {
        self.shared.session.lock().auto.is_some()
    }

    /// Points buffered since the last boundary
    pub fn buffered_points(&self) -> usize {
        let session = self.shared.session.lock();
        session.strokes.iter().map(Vec::len).sum::<usize>() + session.current.len()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.is_recording() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::cursor::{HeadlessCursor, VirtualCursor};
    use crate::capture::source::ManualSource;
    use std::thread;

    fn recorder_with(config: RecorderConfig) -> (Recorder, VirtualCursor) {
        let cursor = VirtualCursor::new(1000.0, 800.0);
        let recorder = Recorder::new(
            Box::new(ManualSource::new()),
            Box::new(cursor.clone()),
            config,
        );
        (recorder, cursor)
    }

    fn recorder() -> Recorder {
        recorder_with(RecorderConfig {
            stroke_gap: Duration::from_millis(40),
            cursor_settle: Duration::from_millis(1),
        })
        .0
    }

    #[test]
    fn test_idle_ignores_moves() {
        let recorder = recorder();
        recorder.on_move(1.0, 1.0);
        assert_eq!(recorder.buffered_points(), 0);
        assert!(recorder.stop().is_empty());
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_start_stop_returns_points() {
        let recorder = recorder();
        recorder.start(None).unwrap();
        assert!(recorder.is_recording());
        assert!(!recorder.is_auto_mode());

        for i in 0..5 {
            recorder.on_move(i as f64, 0.0);
        }
        let drawing = recorder.stop();

        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(drawing.point_count(), 5);
        assert_eq!(drawing.stroke_count(), 1);
        let points = drawing.points();
        assert!(points.windows(2).all(|w| w[1].t >= w[0].t));
        assert!(points[0].t >= 0.0);
    }

    #[test]
    fn test_double_start_rejected() {
        let recorder = recorder();
        recorder.start(None).unwrap();
        assert!(recorder.start(None).is_err());
        recorder.stop();
        assert!(recorder.start(None).is_ok());
    }

    #[test]
    fn test_pause_splits_strokes_like_stored_form() {
        let recorder = recorder();
        recorder.start(None).unwrap();
        for i in 0..5 {
            recorder.on_move(i as f64, 0.0);
        }
        thread::sleep(Duration::from_millis(250));
        for i in 0..5 {
            recorder.on_move(5.0, i as f64);
        }
        let drawing = recorder.stop();
        assert_eq!(drawing.stroke_count(), 2);
        assert_eq!(drawing.strokes()[0].len(), 5);
    }

    #[test]
    fn test_short_pause_matches_stored_segmentation() {
        // Shorter than the live gap but longer than the stored threshold
        let (recorder, _cursor) = recorder_with(RecorderConfig::default());
        recorder.start(None).unwrap();
        for i in 0..10 {
            recorder.on_move(i as f64, 0.0);
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(250));
        for i in 0..10 {
            recorder.on_move(10.0, i as f64);
            thread::sleep(Duration::from_millis(10));
        }
        let recorded = recorder.stop();

        let json = serde_json::to_string(&recorded).unwrap();
        let stored: Drawing = serde_json::from_str(&json).unwrap();
        assert_eq!(recorded, stored);
        assert_eq!(recorded.stroke_count(), 2);
        assert_eq!(
            crate::geometry::extract_features(recorded.strokes()),
            crate::geometry::extract_features(stored.strokes())
        );
    }

    #[test]
    fn test_start_clears_previous_buffer() {
        let recorder = recorder();
        recorder.start(None).unwrap();
        recorder.on_move(0.0, 0.0);
        recorder.stop();
        recorder.start(None).unwrap();
        assert_eq!(recorder.buffered_points(), 0);
        recorder.stop();
    }

    #[test]
    fn test_reset_cursor_drops_partial_stroke() {
        let (recorder, cursor) = recorder_with(RecorderConfig {
            stroke_gap: Duration::from_secs(10),
            cursor_settle: Duration::from_millis(1),
        });
        recorder.start(None).unwrap();
        recorder.on_move(0.0, 0.0);
        recorder.on_move(1.0, 1.0);

        recorder.reset_cursor(Some(ScreenPosition::new(400.0, 90.0)));
        assert_eq!(cursor.warps(), vec![ScreenPosition::new(400.0, 90.0)]);
        assert!(recorder.is_recording());
        assert_eq!(recorder.buffered_points(), 0);

        recorder.on_move(2.0, 2.0);
        assert_eq!(recorder.stop().point_count(), 1);
    }

    #[test]
    fn test_reset_cursor_default_target() {
        let (recorder, cursor) = recorder_with(RecorderConfig::default());
        recorder.reset_cursor(None);
        // 1000x800 display: center horizontally, 15% from the top
        assert_eq!(cursor.warps(), vec![ScreenPosition::new(500.0, 120.0)]);
    }

    #[test]
    fn test_reset_cursor_failure_keeps_recording() {
        let recorder = Recorder::new(
            Box::new(ManualSource::new()),
            Box::new(HeadlessCursor),
            RecorderConfig::default(),
        );
        recorder.start(None).unwrap();
        recorder.reset_cursor(None);
        assert!(recorder.is_recording());
        recorder.on_move(3.0, 3.0);
        assert_eq!(recorder.stop().point_count(), 1);
    }

    #[test]
    fn test_moves_from_foreign_thread() {
        let recorder = recorder();
        recorder.start(None).unwrap();
        let sink = recorder.sink();
        let handle = thread::spawn(move || {
            for i in 0..100 {
                sink.on_move(i as f64, i as f64);
            }
        });
        handle.join().unwrap();
        assert_eq!(recorder.stop().point_count(), 100);
    }
}
