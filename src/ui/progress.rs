//! ui::progress
//!
//! Single-line terminal progress bar.
//!
//! # Design
//!
//! A [`ProgressBar`] is a cheap handle (`Arc<Mutex<..>>`) so it can be
//! advanced from a stream adapter while a render loop redraws it on another
//! branch of a `join!`. Rendering is delegated to a [`Formatter`], which
//! receives a snapshot of the bar state and returns the line to draw.
//!
//! The bar is a scoped resource: when the last handle is dropped without
//! [`ProgressBar::finish`] having been called, the current line is drawn one
//! last time and terminated, so an early return never leaves the cursor in
//! the middle of a line.
//!
//! # Example
//!
//! ```
//! use shopcli::ui::progress::{percent_format, DrawTarget, ProgressBar};
//!
//! let (target, buffer) = DrawTarget::buffer();
//! let bar = ProgressBar::new(100, target, percent_format("Exporting"));
//! bar.set_position(40);
//! bar.finish();
//!
//! let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
//! assert!(out.ends_with("40% Exporting\n"));
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::output::format_bytes;

/// Minimum delay between two throttled redraws on a terminal.
const REDRAW_THROTTLE: Duration = Duration::from_millis(100);

/// Width of the bar glyphs in characters.
const BAR_WIDTH: usize = 30;

/// Snapshot handed to a [`Formatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarState {
    pub position: u64,
    pub length: u64,
    pub elapsed: Duration,
}

impl BarState {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.length == 0 {
            return if self.position > 0 { 1.0 } else { 0.0 };
        }
        (self.position as f64 / self.length as f64).clamp(0.0, 1.0)
    }
}

/// Renders a bar state to one line of text.
pub type Formatter = Box<dyn Fn(&BarState) -> String + Send + Sync>;

/// Where a bar is drawn.
#[derive(Debug, Clone)]
pub enum DrawTarget {
    /// Standard error, with throttled redraws.
    Stderr,
    /// Not drawn at all.
    Hidden,
    /// In-memory buffer, every draw is kept.
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl DrawTarget {
    /// A buffer target and a handle to read back what was drawn.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (DrawTarget::Buffer(buffer.clone()), buffer)
    }

    /// Stderr when `show` is set, hidden otherwise.
    pub fn stderr_if(show: bool) -> Self {
        if show {
            DrawTarget::Stderr
        } else {
            DrawTarget::Hidden
        }
    }

    fn throttled(&self) -> bool {
        matches!(self, DrawTarget::Stderr)
    }

    fn write(&self, text: &str) {
        match self {
            DrawTarget::Stderr => {
                let mut stderr = std::io::stderr().lock();
                // A failed terminal write is not worth failing a transfer for.
                let _ = stderr.write_all(text.as_bytes()).and_then(|_| stderr.flush());
            }
            DrawTarget::Hidden => {}
            DrawTarget::Buffer(buffer) => {
                lock(buffer).extend_from_slice(text.as_bytes());
            }
        }
    }
}

struct BarInner {
    length: u64,
    position: u64,
    started: Instant,
    target: DrawTarget,
    formatter: Formatter,
    finished: bool,
    last_draw: Option<Instant>,
    /// Width of the previous line, for clearing leftovers.
    last_width: usize,
}

impl BarInner {
    fn state(&self) -> BarState {
        BarState {
            position: self.position,
            length: self.length,
            elapsed: self.started.elapsed(),
        }
    }

    fn draw(&mut self, force: bool) {
        if self.finished {
            return;
        }
        let now = Instant::now();
        if !force && self.target.throttled() {
            if let Some(last) = self.last_draw {
                if now.duration_since(last) < REDRAW_THROTTLE {
                    return;
                }
            }
        }
        self.last_draw = Some(now);

        let line = (self.formatter)(&self.state());
        let width = line.chars().count();
        let pad = self.last_width.saturating_sub(width);
        self.last_width = width;
        self.target.write(&format!("\r{}{}", line, " ".repeat(pad)));
    }

    fn finalize(&mut self) {
        if self.finished {
            return;
        }
        self.draw(true);
        self.finished = true;
        self.target.write("\n");
    }
}

impl Drop for BarInner {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// Handle to a progress bar. Clones share the same bar.
#[derive(Clone)]
pub struct ProgressBar {
    inner: Arc<Mutex<BarInner>>,
}

impl std::fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ProgressBar")
            .field("length", &inner.length)
            .field("position", &inner.position)
            .field("finished", &inner.finished)
            .finish()
    }
}

impl ProgressBar {
    /// Create a bar and draw it once at position 0.
    pub fn new(length: u64, target: DrawTarget, formatter: Formatter) -> Self {
        let bar = Self {
            inner: Arc::new(Mutex::new(BarInner {
                length,
                position: 0,
                started: Instant::now(),
                target,
                formatter,
                finished: false,
                last_draw: None,
                last_width: 0,
            })),
        };
        lock(&bar.inner).draw(true);
        bar
    }

    /// A bar that draws nothing.
    pub fn hidden(length: u64) -> Self {
        Self::new(length, DrawTarget::Hidden, Box::new(|_| String::new()))
    }

    /// Set the absolute position.
    pub fn set_position(&self, position: u64) {
        let mut inner = lock(&self.inner);
        inner.position = position;
        inner.draw(false);
    }

    /// Advance by `delta`.
    pub fn inc(&self, delta: u64) {
        let mut inner = lock(&self.inner);
        inner.position = inner.position.saturating_add(delta);
        inner.draw(false);
    }

    /// Draw the final state and end the line. Later updates are ignored
    /// visually but still tracked.
    pub fn finish(&self) {
        lock(&self.inner).finalize();
    }

    pub fn position(&self) -> u64 {
        lock(&self.inner).position
    }

    pub fn length(&self) -> u64 {
        lock(&self.inner).length
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.inner).finished
    }

    /// Redraw every `every` until `done` is cancelled.
    ///
    /// Used as the render side of a transfer: the bar is advanced from the
    /// data path and this loop keeps the elapsed time ticking.
    pub async fn redraw_until(&self, done: CancellationToken, every: Duration) {
        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = tokio::time::sleep(every) => lock(&self.inner).draw(true),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Render `[hh:mm:ss]`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "[{:02}:{:02}:{:02}]",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Render the bar glyphs for a fraction.
pub fn bar_glyphs(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// `[hh:mm:ss] ███░░░ 40% description`, for bars of length 100.
pub fn percent_format(description: impl Into<String>) -> Formatter {
    let description = description.into();
    Box::new(move |state| {
        format!(
            "{} {} {}% {}",
            format_elapsed(state.elapsed),
            bar_glyphs(state.fraction()),
            state.position.min(100),
            description
        )
    })
}

/// `[hh:mm:ss] ███░░░ 1.5 KiB / 3 KiB description`, for byte counts.
pub fn bytes_format(description: impl Into<String>) -> Formatter {
    let description = description.into();
    Box::new(move |state| {
        format!(
            "{} {} {} / {} {}",
            format_elapsed(state.elapsed),
            bar_glyphs(state.fraction()),
            format_bytes(state.position),
            format_bytes(state.length),
            description
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn fraction_handles_zero_length_and_overflow() {
        let state = |position, length| BarState {
            position,
            length,
            elapsed: Duration::ZERO,
        };
        assert_eq!(state(0, 0).fraction(), 0.0);
        assert_eq!(state(5, 0).fraction(), 1.0);
        assert_eq!(state(50, 100).fraction(), 0.5);
        assert_eq!(state(150, 100).fraction(), 1.0);
    }

    #[test]
    fn inc_accumulates() {
        let bar = ProgressBar::hidden(1000);
        bar.inc(250);
        bar.inc(750);
        assert_eq!(bar.position(), 1000);
        assert_eq!(bar.length(), 1000);
    }

    #[test]
    fn set_position_accepts_decreasing_values() {
        let bar = ProgressBar::hidden(100);
        bar.set_position(70);
        bar.set_position(30);
        assert_eq!(bar.position(), 30);
    }

    #[test]
    fn buffer_records_every_draw() {
        let (target, buffer) = DrawTarget::buffer();
        let bar = ProgressBar::new(100, target, percent_format("Working"));
        bar.set_position(30);
        bar.set_position(70);
        bar.finish();

        let out = drawn(&buffer);
        assert!(out.contains("0% Working"));
        assert!(out.contains("30% Working"));
        assert!(out.contains("70% Working"));
        assert_eq!(out.matches('\n').count(), 1);
        assert!(bar.is_finished());
    }

    #[test]
    fn finish_is_idempotent() {
        let (target, buffer) = DrawTarget::buffer();
        let bar = ProgressBar::new(10, target, percent_format("x"));
        bar.finish();
        bar.finish();
        drop(bar);
        assert_eq!(drawn(&buffer).matches('\n').count(), 1);
    }

    #[test]
    fn drop_finalizes_unfinished_bar() {
        let (target, buffer) = DrawTarget::buffer();
        {
            let bar = ProgressBar::new(100, target, percent_format("Exporting"));
            let clone = bar.clone();
            clone.set_position(55);
            drop(clone);
            assert!(!drawn(&buffer).ends_with('\n'));
        }
        let out = drawn(&buffer);
        assert!(out.ends_with("55% Exporting\n"));
    }

    #[test]
    fn bytes_format_renders_sizes() {
        let format = bytes_format("data.csv");
        let line = format(&BarState {
            position: 1536,
            length: 3072,
            elapsed: Duration::from_secs(3725),
        });
        assert!(line.starts_with("[01:02:05] "));
        assert!(line.ends_with(" 1.5 KiB / 3 KiB data.csv"));
    }

    #[test]
    fn glyphs_fill_proportionally() {
        assert_eq!(bar_glyphs(0.0), "░".repeat(BAR_WIDTH));
        assert_eq!(bar_glyphs(1.0), "█".repeat(BAR_WIDTH));
        assert_eq!(bar_glyphs(0.5).chars().filter(|c| *c == '█').count(), 15);
    }

    #[test]
    fn shorter_line_clears_leftovers() {
        let (target, buffer) = DrawTarget::buffer();
        let bar = ProgressBar::new(100, target, percent_format("x"));
        bar.set_position(100);
        bar.set_position(5);
        let out = drawn(&buffer);
        let last = out.rsplit('\r').next().unwrap();
        assert!(last.ends_with("5% x  "));
    }

    #[tokio::test(start_paused = true)]
    async fn redraw_loop_stops_on_cancel() {
        let (target, buffer) = DrawTarget::buffer();
        let bar = ProgressBar::new(10, target, percent_format("tick"));
        let done = CancellationToken::new();

        let canceller = {
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(350)).await;
                done.cancel();
            }
        };
        tokio::join!(bar.redraw_until(done, Duration::from_millis(100)), canceller);

        // Initial draw plus three ticks.
        assert_eq!(drawn(&buffer).matches('\r').count(), 4);
    }
}
