//! Pointer Sources
//!
//! A pointer source delivers raw movement events to the recorder through a
//! `PointerSink`. Real sources run on a foreign OS callback thread; the sink
//! is `Send + Sync` so it can be called from there directly.

use super::recorder::PointerSink;

/// Origin of pointer movement events
pub trait PointerSource: Send {
    /// Begin delivering movements to `sink`
    fn attach(&mut self, sink: PointerSink) -> crate::Result<()>;

    /// Stop delivering movements. Must be idempotent.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// Source whose events are injected by the caller via `Recorder::sink`
/// (replays, tests, or an external event loop that already owns the pointer)
#[derive(Default)]
pub struct ManualSource {
    sink: Option<PointerSink>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PointerSource for ManualSource {
    fn attach(&mut self, sink: PointerSink) -> crate::Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn detach(&mut self) {
        self.sink = None;
    }

    fn is_attached(&self) -> bool {
        self.sink.is_some()
    }
}

/// Platform default pointer source
#[cfg(target_os = "macos")]
pub fn system_source() -> Box<dyn PointerSource> {
    Box::new(super::event_tap::EventTapSource::new())
}

/// Platform default pointer source
#[cfg(not(target_os = "macos"))]
pub fn system_source() -> Box<dyn PointerSource> {
    Box::new(UnsupportedSource)
}

/// Placeholder on platforms without a native pointer tap
#[cfg(not(target_os = "macos"))]
struct UnsupportedSource;

#[cfg(not(target_os = "macos"))]
impl PointerSource for UnsupportedSource {
    fn attach(&mut self, _sink: PointerSink) -> crate::Result<()> {
        Err(crate::Error::Capture(
            "No pointer event source available on this platform".into(),
        ))
    }

    fn detach(&mut self) {}

    fn is_attached(&self) -> bool {
        false
    }
}
