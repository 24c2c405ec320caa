use chrono::NaiveDateTime;
use std::time::Duration;

/// Timestamp layout embedded in every screenshot file name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Replace every run of characters outside `[A-Za-z0-9_]` with a single `_`.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    out
}

/// File name for a capture of `url` taken at `taken_at`:
/// `<sanitized-url>_<YYYYMMDD_HHMMSS>.png`.
pub fn output_file_name(url: &str, taken_at: NaiveDateTime) -> String {
    format!(
        "{}_{}.png",
        sanitize_filename(url),
        taken_at.format(TIMESTAMP_FORMAT)
    )
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("http://a.com/x?y=1"), "http_a_com_x_y_1");
        assert_eq!(sanitize_filename("https://example.com/"), "https_example_com_");
        assert_eq!(sanitize_filename("already_safe_123"), "already_safe_123");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_sanitize_filename_collapses_runs() {
        assert_eq!(sanitize_filename("a://??b"), "a_b");
        assert_eq!(sanitize_filename("///"), "_");
    }

    #[test]
    fn test_sanitize_filename_only_word_characters() {
        let inputs = [
            "http://user:pw@host:8080/p?q=1#frag",
            "héllo wörld/ünïcode",
            "tab\tand\nnewline",
            "..\\..\\windows\\path",
            "emoji 🙂 url",
        ];
        for input in inputs {
            let out = sanitize_filename(input);
            assert!(
                out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "{input:?} -> {out:?}"
            );
            assert!(!out.contains("__"), "{input:?} -> {out:?}");
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("http://ok.test", at(7, 5, 3)),
            "http_ok_test_20240309_070503.png"
        );
    }

    #[test]
    fn test_output_file_name_same_second_collides() {
        let a = output_file_name("http://a.com/x", at(12, 0, 0));
        let b = output_file_name("http://a.com/x", at(12, 0, 0));
        let c = output_file_name("http://a.com/x", at(12, 0, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.0s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
