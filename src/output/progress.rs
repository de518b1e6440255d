//! Textual progress bars
//!
//! Rendered into a string and emitted through `tracing`, so progress lines
//! interleave cleanly with the rest of the log output.

/// Renders `"<message> <pct>% [###___] (current/total)"`
///
/// A zero `total` counts as complete. `current` is clamped to `total` when
/// drawing the bar, but the raw counter is still printed.
pub fn render_progress(message: &str, current: u64, total: u64, width: usize) -> String {
    let ratio = if total == 0 {
        1.0
    } else {
        (current.min(total) as f64) / (total as f64)
    };

    let filled = ((ratio * width as f64) as usize).min(width);
    let percent = (ratio * 100.0) as u32;

    format!(
        "{} {}% [{}{}] ({}/{})",
        message,
        percent,
        "#".repeat(filled),
        "_".repeat(width - filled),
        current,
        total
    )
}
