//! Text format of the credential store.

use ballotbot_core_types::CredentialRecord;
use chrono::{DateTime, SecondsFormat, Utc};

/// Substring that marks the store (or a line of it) as already applied.
pub const APPLIED_MARKER: &str = "IMPORT APPLIED";

const HEADER_TITLE: &str = "# ballotbot credential store - IMPORT APPLIED";
const LAST_UPDATE_PREFIX: &str = "# Last update:";

pub(crate) const TEMPLATE: &str = "# ballotbot credential store
# Paste your session cookies here, one per line.
# Format: cookieName=cookieValue
# Example:
# session_id=your_session_id_here
#
# The file is checked every few seconds. Lines starting with '#' are ignored.
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreState {
    /// No store file on disk.
    Absent,
    /// File exists but carries no records yet.
    Template,
    /// Records present, never applied.
    Populated,
    /// Stamped with the applied marker by an earlier run.
    Applied,
}

impl StoreState {
    pub fn classify(content: Option<&str>) -> Self {
        match content {
            None => StoreState::Absent,
            Some(text) if text.contains(APPLIED_MARKER) => StoreState::Applied,
            Some(text) if parse_records(text).is_empty() => StoreState::Template,
            Some(_) => StoreState::Populated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Absent => "absent",
            StoreState::Template => "template",
            StoreState::Populated => "populated",
            StoreState::Applied => "applied",
        }
    }
}

/// Parses `name=value` lines. Comments, blanks, marker lines and lines with an empty side are
/// skipped; only the first `=` splits, so values may contain `=`.
pub fn parse_records(content: &str) -> Vec<CredentialRecord> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| !line.contains(APPLIED_MARKER))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .map(|(name, value)| CredentialRecord::new(name, value))
        .collect()
}

fn stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Store content after a successful apply: header (added once, timestamp refreshed), the
/// previous content untouched, then a footer line.
pub(crate) fn render_applied(content: &str, now: DateTime<Utc>) -> String {
    let ts = stamp(now);
    let mut out = String::with_capacity(content.len() + 256);

    if content.contains(HEADER_TITLE) {
        let mut refreshed = false;
        for line in content.split_inclusive('\n') {
            if !refreshed && line.starts_with(LAST_UPDATE_PREFIX) {
                out.push_str(&format!("{LAST_UPDATE_PREFIX} {ts}\n"));
                refreshed = true;
            } else {
                out.push_str(line);
            }
        }
    } else {
        out.push_str(HEADER_TITLE);
        out.push('\n');
        out.push_str(&format!("{LAST_UPDATE_PREFIX} {ts}\n"));
        out.push_str("# These records were applied to the browser session.\n");
        out.push_str("# Add new records below, one per line: cookieName=cookieValue\n\n");
        out.push_str(content);
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("\n# ✅ {APPLIED_MARKER} at {ts}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_records_and_skips_noise() {
        let content = "# comment\n\nsession_id=abc123\n  token = a=b=c \nbroken\n=novalue\nname=\n# ✅ IMPORT APPLIED at x\n";
        let records = parse_records(content);
        assert_eq!(
            records,
            vec![
                CredentialRecord::new("session_id", "abc123"),
                CredentialRecord::new("token", "a=b=c"),
            ]
        );
    }

    #[test]
    fn template_has_no_records() {
        assert!(parse_records(TEMPLATE).is_empty());
        assert_eq!(StoreState::classify(Some(TEMPLATE)), StoreState::Template);
        assert_eq!(StoreState::classify(None), StoreState::Absent);
        assert_eq!(StoreState::classify(Some("a=b\n")), StoreState::Populated);
    }

    #[test]
    fn header_is_added_once_and_timestamp_refreshed() {
        let t1 = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 7, 2, 11, 30, 0).unwrap();

        let first = render_applied("session_id=abc123", t1);
        assert!(first.starts_with(HEADER_TITLE));
        assert!(first.contains("session_id=abc123\n"));
        assert!(first.ends_with("# ✅ IMPORT APPLIED at 2024-07-01T10:00:00Z\n"));
        assert_eq!(StoreState::classify(Some(&first)), StoreState::Applied);

        let second = render_applied(&first, t2);
        assert_eq!(second.matches(HEADER_TITLE).count(), 1);
        assert!(second.contains("# Last update: 2024-07-02T11:30:00Z\n"));
        assert!(second.contains("IMPORT APPLIED at 2024-07-01T10:00:00Z"));
        assert!(second.ends_with("# ✅ IMPORT APPLIED at 2024-07-02T11:30:00Z\n"));
        assert_eq!(parse_records(&second).len(), 1);
    }
}
