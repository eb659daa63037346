//! Cursor Relocation
//!
//! Between symbols the pointer is warped back to a fixed spot so the user
//! always starts drawing on the same part of the trackpad. The warp itself
//! generates a movement event, which the recorder suppresses.
//!
//! Relocation is best effort: a missing display or unsupported platform is
//! reported as an error to the caller, who logs and carries on.

use parking_lot::Mutex;
use std::sync::Arc;

/// Fraction of the screen height, from the top, used as the default target
pub const DEFAULT_TARGET_TOP_FRACTION: f64 = 0.15;

/// Position in global screen coordinates (points)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl ScreenPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Default re-centering target for a display of the given size
    pub fn default_for_screen(width: f64, height: f64) -> Self {
        Self {
            x: (width / 2.0).floor(),
            y: (height * DEFAULT_TARGET_TOP_FRACTION).floor(),
        }
    }
}

/// Moves the system pointer
pub trait CursorControl: Send + Sync {
    /// Size of the main display
    fn screen_size(&self) -> crate::Result<(f64, f64)>;

    /// Warp the pointer to `position`
    fn warp(&self, position: ScreenPosition) -> crate::Result<()>;

    /// Horizontal center, near the top of the main display
    fn default_target(&self) -> crate::Result<ScreenPosition> {
        let (width, height) = self.screen_size()?;
        Ok(ScreenPosition::default_for_screen(width, height))
    }
}

/// The platform pointer
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCursor;

#[cfg(target_os = "macos")]
mod platform {
    use super::ScreenPosition;

    #[repr(C)]
    #[derive(Copy, Clone, Debug)]
    struct CGPoint {
        x: f64,
        y: f64,
    }

    type CGDirectDisplayID = u32;
    type CGError = i32;

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGMainDisplayID() -> CGDirectDisplayID;
        fn CGDisplayPixelsWide(display: CGDirectDisplayID) -> usize;
        fn CGDisplayPixelsHigh(display: CGDirectDisplayID) -> usize;
        fn CGWarpMouseCursorPosition(new_position: CGPoint) -> CGError;
        fn CGAssociateMouseAndMouseCursorPosition(connected: bool) -> CGError;
    }

    pub(super) fn screen_size() -> crate::Result<(f64, f64)> {
        // Safety: read-only display queries
        let (width, height) = unsafe {
            let display = CGMainDisplayID();
            (CGDisplayPixelsWide(display), CGDisplayPixelsHigh(display))
        };
        if width == 0 || height == 0 {
            return Err(crate::Error::Cursor("No display information available".into()));
        }
        Ok((width as f64, height as f64))
    }

    pub(super) fn warp(position: ScreenPosition) -> crate::Result<()> {
        let err = unsafe {
            CGWarpMouseCursorPosition(CGPoint {
                x: position.x,
                y: position.y,
            })
        };
        if err != 0 {
            return Err(crate::Error::Cursor(format!("CGWarpMouseCursorPosition failed: {}", err)));
        }
        // A warp freezes pointer movement briefly unless re-associated
        unsafe {
            CGAssociateMouseAndMouseCursorPosition(true);
        }
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::ScreenPosition;

    pub(super) fn screen_size() -> crate::Result<(f64, f64)> {
        Err(crate::Error::Cursor(
            "No display information available on this platform".into(),
        ))
    }

    pub(super) fn warp(_position: ScreenPosition) -> crate::Result<()> {
        Err(crate::Error::Cursor(
            "Cursor relocation is not supported on this platform".into(),
        ))
    }
}

impl CursorControl for SystemCursor {
    fn screen_size(&self) -> crate::Result<(f64, f64)> {
        platform::screen_size()
    }

    fn warp(&self, position: ScreenPosition) -> crate::Result<()> {
        platform::warp(position)
    }
}

/// Cursor for sessions without a display; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessCursor;

impl CursorControl for HeadlessCursor {
    fn screen_size(&self) -> crate::Result<(f64, f64)> {
        Err(crate::Error::Cursor("No display attached".into()))
    }

    fn warp(&self, _position: ScreenPosition) -> crate::Result<()> {
        Err(crate::Error::Cursor("No display attached".into()))
    }
}

/// In-memory cursor over a virtual screen, for replay and tests
#[derive(Debug, Clone)]
pub struct VirtualCursor {
    size: (f64, f64),
    warps: Arc<Mutex<Vec<ScreenPosition>>>,
}

impl VirtualCursor {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            warps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every position warped to, oldest first
    pub fn warps(&self) -> Vec<ScreenPosition> {
        self.warps.lock().clone()
    }

    /// Last warped position
    pub fn position(&self) -> Option<ScreenPosition> {
        self.warps.lock().last().copied()
    }
}

impl CursorControl for VirtualCursor {
    fn screen_size(&self) -> crate::Result<(f64, f64)> {
        Ok(self.size)
    }

    fn warp(&self, position: ScreenPosition) -> crate::Result<()> {
        self.warps.lock().push(position);
        Ok(())
    }
}
