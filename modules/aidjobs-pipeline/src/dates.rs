use chrono::{Datelike, NaiveDate};

/// Parse a free-text date with day-first preference.
///
/// `prefer_future` resolves day/month ambiguity toward dates on or after
/// `today` (used for deadlines, which are almost always in the future).
pub fn parse_date(text: &str, prefer_future: bool, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = clean(text);
    if cleaned.is_empty() {
        return None;
    }

    // Unambiguous formats first.
    for format in [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d %B %Y",
        "%d %b %Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
        "%d.%m.%Y",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }

    // Numeric day/month forms are ambiguous; collect both readings.
    let day_first = ["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%d-%m-%y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&cleaned, f).ok());
    let month_first = ["%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y", "%m-%d-%y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&cleaned, f).ok());

    match (day_first, month_first) {
        (Some(d), Some(m)) if d != m => {
            if prefer_future && d < today && m >= today {
                Some(m)
            } else {
                Some(d)
            }
        }
        (Some(d), _) => Some(d),
        (None, Some(m)) => Some(m),
        (None, None) => None,
    }
}

/// Format as the canonical `YYYY-MM-DD` string.
pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Normalize an ISO 8601 datetime (or bare date) to `YYYY-MM-DD`.
pub fn iso_datetime_to_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::DateTime::parse_from_rfc3339(&trimmed.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.date_naive())
        .or_else(|| {
            // Datetimes without offset, e.g. "2026-02-15T00:00:00".
            chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn clean(text: &str) -> String {
    let mut s = text.trim().to_string();
    // Strip ordinal suffixes: 1st, 2nd, 3rd, 15th.
    for suffix in ["st,", "nd,", "rd,", "th,"] {
        s = s.replace(suffix, ",");
    }
    for suffix in ["st ", "nd ", "rd ", "th "] {
        if let Some(pos) = s.find(suffix) {
            if pos > 0 && s.as_bytes()[pos - 1].is_ascii_digit() {
                s.replace_range(pos..pos + 2, "");
            }
        }
    }
    s.trim().to_string()
}

/// Whether a year looks plausible for a posting deadline.
pub fn plausible_deadline_year(date: NaiveDate, today: NaiveDate) -> bool {
    let year = date.year();
    year >= today.year() - 1 && year <= today.year() + 5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    #[test]
    fn iso_round_trips() {
        let date = parse_date("2026-09-15", false, today()).unwrap();
        assert_eq!(format_iso(date), "2026-09-15");
    }

    #[test]
    fn day_first_preference() {
        // 05/09/2026: day-first reads 5 Sep, month-first 9 May.
        let date = parse_date("05/09/2026", false, today()).unwrap();
        assert_eq!(format_iso(date), "2026-09-05");
    }

    #[test]
    fn prefer_future_swaps_ambiguous_past() {
        // 05/03/2026 day-first = 5 Mar 2026 (past vs 2026-08-01);
        // month-first = 3 May 2026, also past -> day-first kept.
        let date = parse_date("05/03/2026", true, today()).unwrap();
        assert_eq!(format_iso(date), "2026-03-05");

        // 02/10/2026 day-first = 2 Oct (future) -> kept even with prefer_future.
        let date = parse_date("02/10/2026", true, today()).unwrap();
        assert_eq!(format_iso(date), "2026-10-02");

        // 07/15/2026 only parses month-first (no 15th month).
        let date = parse_date("07/15/2026", true, today()).unwrap();
        assert_eq!(format_iso(date), "2026-07-15");
    }

    #[test]
    fn month_name_formats() {
        assert_eq!(
            format_iso(parse_date("15 September 2026", false, today()).unwrap()),
            "2026-09-15"
        );
        assert_eq!(
            format_iso(parse_date("Sep 15, 2026", false, today()).unwrap()),
            "2026-09-15"
        );
        assert_eq!(
            format_iso(parse_date("15 Sep 2026", false, today()).unwrap()),
            "2026-09-15"
        );
    }

    #[test]
    fn ordinal_suffixes_stripped() {
        assert_eq!(
            format_iso(parse_date("15th September 2026", false, today()).unwrap()),
            "2026-09-15"
        );
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_date("as soon as possible", false, today()).is_none());
        assert!(parse_date("", false, today()).is_none());
    }

    #[test]
    fn iso_datetime_normalizes() {
        assert_eq!(
            format_iso(iso_datetime_to_date("2026-02-15T10:30:00Z").unwrap()),
            "2026-02-15"
        );
        assert_eq!(
            format_iso(iso_datetime_to_date("2026-02-15").unwrap()),
            "2026-02-15"
        );
        assert_eq!(
            format_iso(iso_datetime_to_date("2026-02-15T00:00:00").unwrap()),
            "2026-02-15"
        );
    }

    #[test]
    fn deadline_year_plausibility() {
        assert!(plausible_deadline_year(
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            today()
        ));
        assert!(!plausible_deadline_year(
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(),
            today()
        ));
    }
}
