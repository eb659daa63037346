//! Pointer capture module
//!
//! This module turns OS pointer movement into drawings. Movement arrives on a
//! foreign callback thread; the recorder buffers it behind one mutex and, in
//! auto mode, hands completed drawings to async code over a channel.

pub mod recorder;
pub mod auto_mode;
pub mod source;
pub mod cursor;
#[cfg(target_os = "macos")]
pub mod event_tap;

pub use auto_mode::AutoModeConfig;
pub use cursor::{CursorControl, HeadlessCursor, ScreenPosition, SystemCursor, VirtualCursor};
pub use recorder::{PointerSink, Recorder, RecorderConfig, RecorderState};
pub use source::{system_source, ManualSource, PointerSource};
#[cfg(target_os = "macos")]
pub use event_tap::{check_accessibility_permissions, EventTapSource};
