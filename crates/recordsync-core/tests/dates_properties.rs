use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use recordsync_core::dates::{format_date, parse_date, parse_date_str};
use serde_json::json;

proptest! {
    #[test]
    fn formatted_dates_parse_back(millis in -62_135_596_800_000_i64..253_402_300_799_000_i64) {
        let dt = DateTime::from_timestamp_millis(millis).unwrap();
        let text = format_date(&dt);
        prop_assert_eq!(parse_date(&json!(text)), Some(dt));
    }

    #[test]
    fn epoch_seconds_match_iso_text(secs in 0_i64..4_102_444_800_i64) {
        let from_number = parse_date(&json!(secs));
        let from_text = parse_date_str(&Utc.timestamp_opt(secs, 0).unwrap().to_rfc3339());
        prop_assert_eq!(from_number, from_text);
    }

    #[test]
    fn arbitrary_text_never_panics(text in ".*") {
        let _ = parse_date(&json!(text));
    }
}
