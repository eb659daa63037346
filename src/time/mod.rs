//! Session timing
//!
//! Point timestamps are milliseconds since the start of the current
//! recording session. The clock is monotonic and restartable so each
//! auto-mode sub-session starts near zero.

pub mod clock;

pub use clock::SessionClock;
