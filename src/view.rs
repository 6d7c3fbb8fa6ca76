//! View-window policy: which x-range the renderer should show.
//!
//! Selection order, first match wins:
//!
//! 1. **Following**: a positive trailing width is configured; the window
//!    tracks the playback head.
//! 2. **Fixed**: timestamp x-axis with known start and end; the whole
//!    preloaded timeline `[0, end - start]`.
//! 3. **None**: renderer auto-fits.

use crate::config::XAxisMode;
use crate::source::PlaybackClock;

/// Visible x-range requested from the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewWindow {
    /// Trailing window of `width` seconds ending at the playback head
    Following { width: f64 },
    /// Fixed range in seconds since start
    Fixed { min: f64, max: f64 },
}

impl ViewWindow {
    /// Concrete `(min, max)` given the current time since start.
    ///
    /// A following window before enough time has elapsed starts at zero.
    pub fn bounds(&self, current_time_since_start: Option<f64>) -> Option<(f64, f64)> {
        match *self {
            ViewWindow::Fixed { min, max } => Some((min, max)),
            ViewWindow::Following { width } => {
                let now = current_time_since_start?;
                Some(((now - width).max(0.0), now.max(width)))
            }
        }
    }
}

/// Pick the view window for the current configuration and clock
pub fn compute_view_window(
    mode: XAxisMode,
    following_width: Option<f64>,
    clock: &PlaybackClock,
) -> Option<ViewWindow> {
    if let Some(width) = following_width.filter(|w| w.is_finite() && *w > 0.0) {
        return Some(ViewWindow::Following { width });
    }
    if mode == XAxisMode::Timestamp {
        if let (Some(start), Some(end)) = (clock.start_time, clock.end_time) {
            return Some(ViewWindow::Fixed {
                min: 0.0,
                max: end.seconds_since(start),
            });
        }
    }
    None
}

/// Seconds from the source start to the playback head; timestamp mode only
pub fn current_time_since_start(mode: XAxisMode, clock: &PlaybackClock) -> Option<f64> {
    if mode != XAxisMode::Timestamp {
        return None;
    }
    Some(clock.current_time?.seconds_since(clock.start_time?))
}
