/// Text helpers for replies
pub mod text {
    /// Whole text when it is at most `short_len` characters, otherwise the
    /// first `keep_percent` percent of its characters followed by an ellipsis.
    pub fn excerpt(text: &str, short_len: usize, keep_percent: usize) -> String {
        let len = text.chars().count();
        if len <= short_len {
            return text.to_string();
        }

        let keep = len * keep_percent / 100;
        let prefix: String = text.chars().take(keep).collect();
        format!("{}...", prefix)
    }

    /// True when `text` contains at least one letter and no lowercase letters.
    pub fn is_upper_case(text: &str) -> bool {
        let mut includes_letter = false;
        for c in text.chars() {
            if c.is_lowercase() {
                return false;
            }
            if c.is_alphabetic() {
                includes_letter = true;
            }
        }
        includes_letter
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    /// Format the age of `then` relative to `now`, e.g. "2 days, 1 hour, 5 seconds ago".
    ///
    /// Zero-valued units are left out except seconds, which always appear.
    pub fn readable_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
        format_age(now.signed_duration_since(then))
    }

    pub fn format_age(age: Duration) -> String {
        let total = age.num_seconds().max(0);

        let seconds = total % 60;
        let minutes = (total / 60) % 60;
        let hours = (total / 3600) % 24;
        let days = total / 86400;

        let mut out = String::new();
        for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
            if value != 0 {
                out.push_str(&format!("{} {}{}, ", value, unit, plural(value)));
            }
        }
        out.push_str(&format!("{} second{} ago", seconds, plural(seconds)));
        out
    }

    fn plural(value: i64) -> &'static str {
        if value == 1 { "" } else { "s" }
    }
}

/// Byte size formatting
pub mod bytes {
    /// SI-unit size, e.g. "512 B", "1.5 kB", "3.2 MB".
    pub fn human_readable(bytes: u64) -> String {
        const UNIT: f64 = 1000.0;
        if bytes < 1000 {
            return format!("{} B", bytes);
        }

        let mut value = bytes as f64 / UNIT;
        let mut exp = 0;
        while value >= UNIT && exp < 5 {
            value /= UNIT;
            exp += 1;
        }
        let prefix = "kMGTPE".as_bytes()[exp] as char;
        format!("{:.1} {}B", value, prefix)
    }
}
