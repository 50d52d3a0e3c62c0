//! Human-readable byte size formatting

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count as a human-readable string with 1024-based units,
/// at most two decimal places, trailing zeros trimmed.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    let mut repr = format!("{:.2}", rounded);
    while repr.ends_with('0') {
        repr.pop();
    }
    if repr.ends_with('.') {
        repr.pop();
    }
    format!("{} {}", repr, UNITS[exponent])
}
