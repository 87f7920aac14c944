const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Renders a byte count with binary units, e.g. `1.50 MiB`.
///
/// ```
/// use cfm_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(1536 * 1024, 2), "1.50 MiB");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    let mut value = bytes as f64;
    let mut idx = 0;
    while value >= 1024.0 && idx < UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }

    if idx == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.precision$} {}", UNITS[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0, 2), "0 B");
        assert_eq!(format_bytes(1023, 2), "1023 B");
        assert_eq!(format_bytes(1024, 1), "1.0 KiB");
        assert_eq!(format_bytes(1024_u64.pow(2), 2), "1.00 MiB");
        assert_eq!(format_bytes(1024_u64.pow(5), 0), "1024 TiB");
    }
}
