//! Human-readable time formatting
//!
//! Provides consistent duration and progress display for status endpoints,
//! log lines and front-ends.

/// Bar segment character used by [`progress_bar`]
const BAR_SEGMENT: char = '▬';

/// Position marker used by [`progress_bar`]
const BAR_MARKER: char = '🔘';

/// Format whole seconds as `M:SS`, or `H:MM:SS` once an hour is reached.
///
/// # Examples
///
/// ```
/// use autoradio_common::human_time::format_duration_seconds;
///
/// assert_eq!(format_duration_seconds(0), "0:00");
/// assert_eq!(format_duration_seconds(65), "1:05");
/// assert_eq!(format_duration_seconds(3661), "1:01:01");
/// ```
pub fn format_duration_seconds(total_seconds: u64) -> String {
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format `elapsed/total` as `M:SS/M:SS`
pub fn format_progress_time(elapsed_secs: u64, total_secs: u64) -> String {
    format!(
        "{}/{}",
        format_duration_seconds(elapsed_secs),
        format_duration_seconds(total_secs)
    )
}

/// Render a fixed-width text progress bar with a position marker.
///
/// The result always contains exactly `length` characters. An unknown
/// (zero) total renders an empty bar with no marker.
pub fn progress_bar(current_secs: u64, total_secs: u64, length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    if total_secs == 0 {
        return std::iter::repeat(BAR_SEGMENT).take(length).collect();
    }

    let filled = ((current_secs as f64 / total_secs as f64) * length as f64).floor() as usize;
    let filled = filled.min(length - 1);

    let mut bar = String::with_capacity(length * 4);
    bar.extend(std::iter::repeat(BAR_SEGMENT).take(filled));
    bar.push(BAR_MARKER);
    bar.extend(std::iter::repeat(BAR_SEGMENT).take(length - filled - 1));
    bar
}
