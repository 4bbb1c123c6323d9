//! Line protocol spoken with the preamp controller over the serial link.
//!
//! Inbound lines are ASCII text.  Two prefixes carry state worth caching for
//! late joiners: `STATE ...` (the full current state) and `SELECTOR_LABELS ...`
//! (the display names of the inputs).  Everything else is passed through.
//!
//! Outbound commands have the form `GET <KEY>` or `SET <KEY> <VALUE>`.  Browsers
//! may also type the short form `<KEY> <VALUE>`, which is rewritten to `SET`.

/// Prefix of a full-state line.
pub const STATE_PREFIX: &str = "STATE ";

/// Prefix of a selector-labels line.
pub const LABELS_PREFIX: &str = "SELECTOR_LABELS";

/// Synthetic line delivered to clients when the serial input is not valid UTF-8.
pub const BAD_VALUE_LINE: &str = "ERR BAD_VALUE";

/// Keys accepted in the short `<KEY> <VALUE>` form.
pub const SHORT_FORM_KEYS: [&str; 5] = ["VOL", "BAL", "INP", "MUTE", "BRI"];

/// Category of a line received from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    State,
    Labels,
    Other,
}

/// Classifies one trimmed line from the controller.  Matching is case-sensitive.
pub fn classify_line(line: &str) -> LineKind {
    if line.starts_with(STATE_PREFIX) {
        LineKind::State
    } else if line.starts_with(LABELS_PREFIX) {
        LineKind::Labels
    } else {
        LineKind::Other
    }
}

/// Turns free text typed by a browser into a controller command.
///
/// - `GET ...` / `SET ...` (any case) pass through with their original casing.
/// - A two-token `<KEY> <VALUE>` with a recognised key becomes
///   `SET <KEY> <VALUE>` with the key upper-cased.
/// - Anything else yields `None` and must not be forwarded.
///
/// # Examples
///
/// ```rust
/// use preamp_core::normalize_command;
///
/// assert_eq!(normalize_command("vol 10").as_deref(), Some("SET VOL 10"));
/// assert_eq!(normalize_command("GET STATE").as_deref(), Some("GET STATE"));
/// assert_eq!(normalize_command("foo bar"), None);
/// ```
pub fn normalize_command(input: &str) -> Option<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }

    let upper = raw.to_ascii_uppercase();
    if upper.starts_with("GET ") || upper.starts_with("SET ") {
        return Some(raw.to_string());
    }

    let mut tokens = raw.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(key), Some(value), None) => {
            let key = key.to_ascii_uppercase();
            SHORT_FORM_KEYS
                .contains(&key.as_str())
                .then(|| format!("SET {key} {value}"))
        }
        _ => None,
    }
}

/// Decodes one raw line from the controller.
///
/// Invalid UTF-8 becomes [`BAD_VALUE_LINE`] so clients see the corruption.
/// Surrounding whitespace (including the line terminator) is removed; an
/// empty result means there is nothing to deliver.
pub fn decode_line(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.trim().to_string(),
        Err(_) => BAD_VALUE_LINE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_state_line() {
        assert_eq!(classify_line("STATE VOL=10 BAL=0"), LineKind::State);
    }

    #[test]
    fn test_classify_labels_line() {
        assert_eq!(classify_line("SELECTOR_LABELS CD,TUNER,AUX"), LineKind::Labels);
    }

    #[test]
    fn test_classify_is_case_sensitive_and_needs_state_space() {
        assert_eq!(classify_line("state VOL=10"), LineKind::Other);
        assert_eq!(classify_line("STATEFUL"), LineKind::Other);
        assert_eq!(classify_line("OK"), LineKind::Other);
    }

    #[test]
    fn test_normalize_short_form_is_rewritten() {
        assert_eq!(normalize_command("vol 10").as_deref(), Some("SET VOL 10"));
        assert_eq!(normalize_command("Mute on").as_deref(), Some("SET MUTE on"));
        assert_eq!(normalize_command("  bri 3 ").as_deref(), Some("SET BRI 3"));
    }

    #[test]
    fn test_normalize_get_and_set_pass_through_unchanged() {
        assert_eq!(normalize_command("GET STATE").as_deref(), Some("GET STATE"));
        assert_eq!(normalize_command("set vol 5").as_deref(), Some("set vol 5"));
        assert_eq!(
            normalize_command("get selector_labels").as_deref(),
            Some("get selector_labels")
        );
    }

    #[test]
    fn test_normalize_rejects_unknown_key() {
        assert_eq!(normalize_command("foo bar"), None);
    }

    #[test]
    fn test_normalize_rejects_wrong_token_count() {
        assert_eq!(normalize_command("vol"), None);
        assert_eq!(normalize_command("vol 1 2"), None);
        assert_eq!(normalize_command("   "), None);
    }

    #[test]
    fn test_normalize_requires_space_after_get() {
        assert_eq!(normalize_command("GETSTATE"), None);
    }

    #[test]
    fn test_decode_line_trims_terminator() {
        assert_eq!(decode_line(b"STATE VOL=1\r\n"), "STATE VOL=1");
    }

    #[test]
    fn test_decode_line_invalid_utf8_becomes_bad_value() {
        assert_eq!(decode_line(&[0xFF, 0xFE, b'\n']), BAD_VALUE_LINE);
    }

    #[test]
    fn test_decode_blank_line_is_empty() {
        assert_eq!(decode_line(b" \r\n"), "");
    }
}
