use chrono::DateTime;
use proptest::prelude::*;
use recordsync_core::sync::{freshness, should_unpack, Freshness, SyncStamps};

fn stamps(updated_ms: i64) -> SyncStamps {
    SyncStamps::new(None, DateTime::from_timestamp_millis(updated_ms))
}

proptest! {
    #[test]
    fn stale_only_when_strictly_newer(local in 0_i64..4_000_000_000_000, remote in 0_i64..4_000_000_000_000) {
        let expected = if remote > local { Freshness::Stale } else { Freshness::Current };
        prop_assert_eq!(freshness(&stamps(local), &stamps(remote)), expected);
    }

    #[test]
    fn reapplying_a_payload_is_a_no_op(t in 0_i64..4_000_000_000_000) {
        let mut current = stamps(t - 1);
        let incoming = stamps(t);
        prop_assert!(should_unpack(false, &current, &incoming));
        current.absorb(&incoming);
        prop_assert!(!should_unpack(false, &current, &incoming));
    }

    #[test]
    fn new_objects_always_unpack(local in proptest::option::of(0_i64..4_000_000_000_000)) {
        let current = local.map(stamps).unwrap_or_default();
        prop_assert!(should_unpack(true, &current, &SyncStamps::default()));
    }
}
