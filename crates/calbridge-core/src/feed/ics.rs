//! Minimal ICS (iCalendar) parsing: just enough to pull property maps out
//! of `VEVENT` blocks.
//!
//! Handles the two wire quirks that matter for calendar exports: folded
//! lines (continuations start with a single space) and `\n` escapes in
//! text values. Property parameters (`DTSTART;VALUE=DATE:...`) are
//! stripped; only the bare property name is kept.

use std::collections::HashMap;

const BEGIN_VEVENT: &str = "BEGIN:VEVENT";
const END_VEVENT: &str = "END:VEVENT";

/// Unfold wrapped lines: a line starting with a space continues the
/// previous line (RFC 5545 §3.1).
fn unfold(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in body.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ') {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Split one content line into `(name, value)`, dropping any property
/// parameters and unescaping `\n` in the value.
fn parse_property(line: &str) -> Option<(String, String)> {
    let (name_part, value) = line.split_once(':')?;
    let name = name_part.split(';').next()?.to_string();
    if name.is_empty() {
        return None;
    }
    Some((name, value.replace("\\n", "\n")))
}

/// Extract the property map of every VEVENT block in a feed body.
///
/// Anything outside `BEGIN:VEVENT`/`END:VEVENT` (calendar headers,
/// timezone definitions, alarms nested markers) is ignored. An unclosed
/// trailing block is dropped rather than guessed at.
pub fn parse_events(body: &str) -> Vec<HashMap<String, String>> {
    let lines = unfold(body);
    let mut events = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;

    for line in &lines {
        match line.as_str() {
            BEGIN_VEVENT => current = Some(HashMap::new()),
            END_VEVENT => {
                if let Some(props) = current.take() {
                    events.push(props);
                }
            }
            _ => {
                if let Some(props) = current.as_mut() {
                    if let Some((name, value)) = parse_property(line) {
                        props.insert(name, value);
                    }
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
PRODID:-//Google Inc//Google Calendar 70.9054//EN\r\n\
X-WR-TIMEZONE:UTC\r\n\
BEGIN:VEVENT\r\n\
UID:ev-1@google.com\r\n\
SUMMARY:Homework 3\r\n\
DTSTART;VALUE=DATE:20240310\r\n\
LAST-MODIFIED:20240301T120000Z\r\n\
DESCRIPTION:Read chapter 5\\nSolve exercises\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:ev-2@google.com\r\n\
SUMMARY:Midterm exam covering everything from week one th\r\n rough week eight\r\n\
DTSTART:20240401T090000Z\r\n\
LAST-MODIFIED:20240302T080000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn parses_all_vevent_blocks() {
        let events = parse_events(FEED);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["UID"], "ev-1@google.com");
        assert_eq!(events[1]["UID"], "ev-2@google.com");
    }

    #[test]
    fn strips_property_parameters() {
        let events = parse_events(FEED);
        assert_eq!(events[0]["DTSTART"], "20240310");
    }

    #[test]
    fn unfolds_continuation_lines() {
        let events = parse_events(FEED);
        assert_eq!(
            events[1]["SUMMARY"],
            "Midterm exam covering everything from week one through week eight"
        );
    }

    #[test]
    fn folded_line_in_minimal_feed_rejoins_without_the_space() {
        let events = parse_events(
            "BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:part one th\r\n rough part two\r\nEND:VEVENT\r\n",
        );
        assert_eq!(events[0]["SUMMARY"], "part one through part two");
    }

    #[test]
    fn unescapes_newlines_in_values() {
        let events = parse_events(FEED);
        assert_eq!(events[0]["DESCRIPTION"], "Read chapter 5\nSolve exercises");
    }

    #[test]
    fn ignores_calendar_headers_outside_vevent() {
        let events = parse_events(FEED);
        assert!(!events[0].contains_key("PRODID"));
        assert!(!events[0].contains_key("X-WR-TIMEZONE"));
    }

    #[test]
    fn value_may_contain_colons() {
        let events =
            parse_events("BEGIN:VEVENT\nUID:a\nDESCRIPTION:see https://example.com\nEND:VEVENT\n");
        assert_eq!(events[0]["DESCRIPTION"], "see https://example.com");
    }

    #[test]
    fn unclosed_block_is_dropped() {
        let events = parse_events("BEGIN:VEVENT\nUID:a\nSUMMARY:half\n");
        assert!(events.is_empty());
    }

    #[test]
    fn empty_body_yields_no_events() {
        assert!(parse_events("").is_empty());
    }
}
