use chrono::{DateTime, Local};

pub const SENDER_TAG: &str = "_sender_";
pub const MESSAGE_TAG: &str = "_message_";
pub const TIME_TAG: &str = "_time_";

pub const DEFAULT_TEMPLATE: &str = "_sender_ just cheered you at _time_";

/// Fills the tags of a reply template. Substitution is literal and happens in a fixed
/// order (sender, message, then time) without any escaping.
pub fn format_message(template: &str, time: DateTime<Local>, sender: &str, message: &str) -> String {
    template
        .replace(SENDER_TAG, sender)
        .replace(MESSAGE_TAG, message)
        .replace(TIME_TAG, &time.format("%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_all_tags() {
        let out = format_message("_sender_ said '_message_' at _time_", noon(), "keebs", "hello");
        assert_eq!(out, "keebs said 'hello' at 12:30:05");
    }

    #[test]
    fn test_default_template() {
        let out = format_message(DEFAULT_TEMPLATE, noon(), "owesome", "");
        assert_eq!(out, "owesome just cheered you at 12:30:05");
    }

    #[test]
    fn test_no_escaping() {
        // a tag typed by the viewer is substituted as well when it comes later in order
        let out = format_message("_message_", noon(), "keebs", "it is _time_ and _sender_");
        assert_eq!(out, "it is 12:30:05 and _sender_");
    }
}
