//! Human-readable byte sizes.

const SI_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Format a byte count with the best SI prefix (powers of 1000) and zero
/// decimal places: `1_000_000_000` → `"1 GB"`, `512` → `"512 B"`.
pub fn format_si_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SI_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.0} {}", value, SI_UNITS[unit])
}
