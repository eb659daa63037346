//! Quartz Event Tap Pointer Source
//!
//! Listens to pointer movement (plain moves and drags) through a
//! listen-only CGEventTap on a dedicated CFRunLoop thread, and forwards each
//! location to the recorder's sink from that thread.
//!
//! # Permissions
//!
//! Requires Accessibility permissions in System Preferences > Security & Privacy.

use super::recorder::PointerSink;
use super::source::PointerSource;
use core_foundation::base::{CFRelease, CFTypeRef};
use core_foundation::runloop::kCFRunLoopCommonModes;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, trace};

type CGEventRef = CFTypeRef;
type CGEventTapProxy = *const c_void;
type CGEventMask = u64;

// CGEventTapLocation, CGEventTapPlacement and CGEventTapOptions values
const K_CG_SESSION_EVENT_TAP: u32 = 1;
const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;

// CGEventType values for pointer movement
const CG_EVENT_MOUSE_MOVED: u32 = 5;
const CG_EVENT_LEFT_MOUSE_DRAGGED: u32 = 6;
const CG_EVENT_RIGHT_MOUSE_DRAGGED: u32 = 7;
const CG_EVENT_OTHER_MOUSE_DRAGGED: u32 = 27;

// The system disables taps that time out or on user input; re-enable on these
const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

fn movement_event_mask() -> CGEventMask {
    (1 << CG_EVENT_MOUSE_MOVED)
        | (1 << CG_EVENT_LEFT_MOUSE_DRAGGED)
        | (1 << CG_EVENT_RIGHT_MOUSE_DRAGGED)
        | (1 << CG_EVENT_OTHER_MOUSE_DRAGGED)
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: CGEventMask,
        callback: extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef,
        user_info: *mut c_void,
    ) -> CFTypeRef;

    fn CGEventTapEnable(tap: CFTypeRef, enable: bool);

    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFTypeRef,
        port: CFTypeRef,
        order: i64,
    ) -> CFTypeRef;

    fn CFRunLoopGetCurrent() -> CFTypeRef;
    fn CFRunLoopAddSource(rl: CFTypeRef, source: CFTypeRef, mode: CFTypeRef);
    fn CFRunLoopRun();
    fn CFRunLoopStop(rl: CFTypeRef);
}

extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

/// Callback context, owned by the source and published through `CONTEXT_PTR`
struct TapContext {
    sink: PointerSink,
    running: Arc<AtomicBool>,
    event_count: AtomicU64,
}

/// CGEventTapCreate's callback cannot capture Rust closures
static CONTEXT_PTR: AtomicPtr<TapContext> = AtomicPtr::new(ptr::null_mut());
static RUN_LOOP_PTR: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static TAP_PTR: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

/// Pointer source backed by a Quartz event tap
pub struct EventTapSource {
    thread_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl EventTapSource {
    pub fn new() -> Self {
        Self {
            thread_handle: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Movements delivered since the tap was attached
    pub fn event_count(&self) -> u64 {
        let ctx = CONTEXT_PTR.load(Ordering::SeqCst);
        if ctx.is_null() {
            0
        } else {
            unsafe { (*ctx).event_count.load(Ordering::Relaxed) }
        }
    }
}

impl Default for EventTapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerSource for EventTapSource {
    fn attach(&mut self, sink: PointerSink) -> crate::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(crate::Error::Capture("Event tap already running".into()));
        }

        if !check_accessibility_permissions() {
            self.running.store(false, Ordering::SeqCst);
            return Err(crate::Error::Capture(
                "Accessibility permissions not granted. Please enable in System Preferences > Security & Privacy > Privacy > Accessibility".into(),
            ));
        }

        let context = Box::new(TapContext {
            sink,
            running: Arc::clone(&self.running),
            event_count: AtomicU64::new(0),
        });
        let context_ptr = Box::into_raw(context);
        CONTEXT_PTR.store(context_ptr, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("pointer-tap".into())
            .spawn(|| {
                if let Err(e) = run_event_tap_loop() {
                    error!("Event tap error: {}", e);
                }
            })
            .map_err(|e| {
                CONTEXT_PTR.store(ptr::null_mut(), Ordering::SeqCst);
                // Safety: the pointer came from Box::into_raw above and was never shared
                unsafe {
                    drop(Box::from_raw(context_ptr));
                }
                self.running.store(false, Ordering::SeqCst);
                crate::Error::Capture(format!("Failed to spawn event tap thread: {}", e))
            })?;

        self.thread_handle = Some(handle);
        info!("Pointer event tap attached");
        Ok(())
    }

    fn detach(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let run_loop = RUN_LOOP_PTR.swap(ptr::null_mut(), Ordering::SeqCst);
        if !run_loop.is_null() {
            unsafe {
                CFRunLoopStop(run_loop as _);
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        // The run loop thread has exited, so no callback can still hold the context
        let context_ptr = CONTEXT_PTR.swap(ptr::null_mut(), Ordering::SeqCst);
        if !context_ptr.is_null() {
            let ctx = unsafe { Box::from_raw(context_ptr) };
            info!(
                "Pointer event tap detached after {} movements",
                ctx.event_count.load(Ordering::Relaxed)
            );
        }
    }

    fn is_attached(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EventTapSource {
    fn drop(&mut self) {
        self.detach();
    }
}

extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    _user_info: *mut c_void,
) -> CGEventRef {
    if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT
        || event_type == CG_EVENT_TAP_DISABLED_BY_USER_INPUT
    {
        let tap = TAP_PTR.load(Ordering::SeqCst);
        if !tap.is_null() {
            unsafe { CGEventTapEnable(tap as CFTypeRef, true) };
        }
        return event;
    }

    let ctx = CONTEXT_PTR.load(Ordering::SeqCst);
    if ctx.is_null() {
        return event;
    }
    let context = unsafe { &*ctx };
    if !context.running.load(Ordering::Relaxed) {
        return event;
    }

    let location = unsafe { CGEventGetLocation(event) };
    context.sink.on_move(location.x, location.y);
    context.event_count.fetch_add(1, Ordering::Relaxed);
    trace!("Tap move ({:.1}, {:.1})", location.x, location.y);

    // Listen-only: pass the event through unchanged
    event
}

/// Disables and releases the tap on drop
struct EventTapGuard(CFTypeRef);

impl Drop for EventTapGuard {
    fn drop(&mut self) {
        TAP_PTR.store(ptr::null_mut(), Ordering::SeqCst);
        unsafe {
            CGEventTapEnable(self.0, false);
            CFRelease(self.0);
        }
    }
}

/// Releases the run loop source on drop
struct RunLoopSourceGuard(CFTypeRef);

impl Drop for RunLoopSourceGuard {
    fn drop(&mut self) {
        unsafe {
            CFRelease(self.0);
        }
    }
}

/// Clears RUN_LOOP_PTR on drop
struct RunLoopPtrGuard;

impl Drop for RunLoopPtrGuard {
    fn drop(&mut self) {
        RUN_LOOP_PTR.store(ptr::null_mut(), Ordering::SeqCst);
    }
}

fn run_event_tap_loop() -> crate::Result<()> {
    let tap = unsafe {
        CGEventTapCreate(
            K_CG_SESSION_EVENT_TAP,
            K_CG_HEAD_INSERT_EVENT_TAP,
            K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
            movement_event_mask(),
            event_tap_callback,
            ptr::null_mut(),
        )
    };
    if tap.is_null() {
        return Err(crate::Error::Capture(
            "Failed to create event tap. Ensure accessibility permissions are granted.".into(),
        ));
    }
    TAP_PTR.store(tap as *mut c_void, Ordering::SeqCst);
    let _tap_guard = EventTapGuard(tap);

    let run_loop_source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
    if run_loop_source.is_null() {
        return Err(crate::Error::Capture("Failed to create run loop source".into()));
    }
    let _source_guard = RunLoopSourceGuard(run_loop_source);

    let run_loop = unsafe { CFRunLoopGetCurrent() };
    RUN_LOOP_PTR.store(run_loop as *mut c_void, Ordering::SeqCst);
    let _ptr_guard = RunLoopPtrGuard;

    unsafe {
        CFRunLoopAddSource(run_loop, run_loop_source, kCFRunLoopCommonModes as CFTypeRef);
        CGEventTapEnable(tap, true);
    }

    info!("Pointer event tap running");
    // Returns once detach() calls CFRunLoopStop
    unsafe {
        CFRunLoopRun();
    }

    info!("Pointer event tap loop stopped");
    Ok(())
}

/// Check if accessibility permissions are granted
pub fn check_accessibility_permissions() -> bool {
    unsafe { AXIsProcessTrusted() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessibility_query_does_not_panic() {
        let _ = check_accessibility_permissions();
    }

    #[test]
    fn test_event_mask_covers_moves_and_drags() {
        let mask = movement_event_mask();
        assert_ne!(mask & (1 << CG_EVENT_MOUSE_MOVED), 0);
        assert_ne!(mask & (1 << CG_EVENT_LEFT_MOUSE_DRAGGED), 0);
        assert_eq!(mask & (1 << 1), 0); // left mouse down
    }

    #[test]
    fn test_detach_without_attach_is_noop() {
        let mut source = EventTapSource::new();
        source.detach();
        assert!(!source.is_attached());
        assert_eq!(source.event_count(), 0);
    }
}
