//! Computes the next identity record from the stored one and fresh attribution.
//! Branches are evaluated in order and each is terminal.

use serde_json::Map;

use crate::attribution::{is_valid_new_source, sources_are_different};
use crate::ids::IdGenerator;
use crate::types::{IdentityRecord, SourceMap, VisitRecord};

/// Everything the transition needs; no ambient lookups.
#[derive(Debug, Clone)]
pub struct TransitionInput<'a> {
    pub previous: Option<IdentityRecord>,
    pub source: SourceMap,
    pub landing_page: &'a str,
    pub now_ms: i64,
    pub user_ttl_ms: i64,
    pub visit_ttl_ms: i64,
    /// Attribution whitelist used to judge whether `source` is worth recording.
    pub params: &'a [&'a str],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionFlags {
    pub is_new_user: bool,
    pub is_new_visit: bool,
    pub is_new_source: bool,
}

impl TransitionFlags {
    /// A new source is only announced inside an existing visit.
    pub fn announces_new_source(&self) -> bool {
        self.is_new_source && !self.is_new_visit
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub record: IdentityRecord,
    pub flags: TransitionFlags,
}

pub fn next_record(input: TransitionInput<'_>, ids: &dyn IdGenerator) -> Transition {
    let TransitionInput {
        previous,
        source,
        landing_page,
        now_ms,
        user_ttl_ms,
        visit_ttl_ms,
        params,
    } = input;

    let new_visit = |count: u64, source: SourceMap| VisitRecord {
        id: ids.next_id(),
        expiration_date: now_ms.saturating_add(visit_ttl_ms),
        landing_page: landing_page.to_string(),
        source,
        count,
        is_engaged: false,
        extra: Map::new(),
    };

    let mut record = match previous {
        Some(record) if !record.is_expired(now_ms) => record,
        _ => {
            let visit = new_visit(1, source.clone());
            return Transition {
                record: IdentityRecord {
                    id: ids.next_id(),
                    expiration_date: now_ms.saturating_add(user_ttl_ms),
                    last_activity: now_ms,
                    landing_page: landing_page.to_string(),
                    source,
                    custom_data: Map::new(),
                    visit: Some(visit),
                    extra: Map::new(),
                },
                flags: TransitionFlags {
                    is_new_user: true,
                    is_new_visit: true,
                    is_new_source: false,
                },
            };
        }
    };

    let visit = match record.visit.take() {
        Some(visit) if !visit.is_expired(now_ms) => visit,
        stale => {
            let count = stale.map(|v| v.count).unwrap_or(0).saturating_add(1);
            record.visit = Some(new_visit(count, source));
            record.last_activity = now_ms;
            return Transition {
                record,
                flags: TransitionFlags {
                    is_new_user: false,
                    is_new_visit: true,
                    is_new_source: false,
                },
            };
        }
    };

    let mut visit = visit;
    let previous_source = visit.source.clone();
    let is_new_source = is_valid_new_source(&source, params)
        && sources_are_different(Some(&previous_source), Some(&source));
    if is_new_source {
        visit.source = source;
    }
    visit.expiration_date = now_ms.saturating_add(visit_ttl_ms);
    record.last_activity = now_ms;
    record.visit = Some(visit);

    Transition {
        record,
        flags: TransitionFlags {
            is_new_user: false,
            is_new_visit: false,
            is_new_source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use serde_json::json;

    const USER_TTL: i64 = 1_000_000;
    const VISIT_TTL: i64 = 1_800;
    const PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign"];

    fn source(pairs: &[(&str, &str)]) -> SourceMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn step(
        previous: Option<IdentityRecord>,
        current: SourceMap,
        now_ms: i64,
        ids: &SequentialIds,
    ) -> Transition {
        next_record(
            TransitionInput {
                previous,
                source: current,
                landing_page: "https://shop.example/landing",
                now_ms,
                user_ttl_ms: USER_TTL,
                visit_ttl_ms: VISIT_TTL,
                params: PARAMS,
            },
            ids,
        )
    }

    #[test]
    fn test_no_record_creates_user_and_visit() {
        let ids = SequentialIds::new("id");
        let t = step(None, source(&[("utm_source", "news")]), 100, &ids);

        assert_eq!(
            t.flags,
            TransitionFlags {
                is_new_user: true,
                is_new_visit: true,
                is_new_source: false
            }
        );
        let visit = t.record.visit.as_ref().unwrap();
        assert_eq!(visit.count, 1);
        assert!(!visit.is_engaged);
        assert_eq!(visit.expiration_date, 100 + VISIT_TTL);
        assert_eq!(t.record.expiration_date, 100 + USER_TTL);
        assert_eq!(t.record.last_activity, 100);
        assert_eq!(t.record.source, source(&[("utm_source", "news")]));
        assert_eq!(visit.source, t.record.source);
        assert_eq!(t.record.landing_page, "https://shop.example/landing");
        assert_ne!(t.record.id, visit.id);
    }

    #[test]
    fn test_expired_user_gets_fresh_identity() {
        let ids = SequentialIds::new("id");
        let first = step(None, SourceMap::new(), 0, &ids).record;
        let mut old = first.clone();
        old.custom_data.insert("k".to_string(), json!(1));

        let t = step(Some(old), SourceMap::new(), USER_TTL + 1, &ids);
        assert!(t.flags.is_new_user);
        assert!(t.flags.is_new_visit);
        assert_ne!(t.record.id, first.id);
        assert_eq!(t.record.visit.as_ref().unwrap().count, 1);
        assert!(t.record.custom_data.is_empty());
    }

    #[test]
    fn test_user_expiring_exactly_now_is_fresh() {
        let ids = SequentialIds::new("id");
        let first = step(None, SourceMap::new(), 0, &ids).record;
        let t = step(Some(first.clone()), SourceMap::new(), USER_TTL, &ids);
        assert!(!t.flags.is_new_user);
        assert_eq!(t.record.id, first.id);
    }

    #[test]
    fn test_expired_visit_rolls_over() {
        let ids = SequentialIds::new("id");
        let mut first = step(None, source(&[("utm_source", "news")]), 0, &ids).record;
        first.custom_data.insert("plan".to_string(), json!("pro"));
        first.extra.insert("segment".to_string(), json!("b2b"));
        if let Some(visit) = first.visit.as_mut() {
            visit.is_engaged = true;
        }

        let later = VISIT_TTL + 10;
        let t = step(
            Some(first.clone()),
            source(&[("utm_source", "ads")]),
            later,
            &ids,
        );

        assert_eq!(
            t.flags,
            TransitionFlags {
                is_new_user: false,
                is_new_visit: true,
                is_new_source: false
            }
        );
        let visit = t.record.visit.as_ref().unwrap();
        assert_eq!(visit.count, 2);
        assert!(!visit.is_engaged);
        assert_ne!(Some(visit.id.as_str()), first.visit_id());
        assert_eq!(visit.source, source(&[("utm_source", "ads")]));

        // Identity-level fields survive the rollover
        assert_eq!(t.record.id, first.id);
        assert_eq!(t.record.expiration_date, first.expiration_date);
        assert_eq!(t.record.source, source(&[("utm_source", "news")]));
        assert_eq!(t.record.landing_page, first.landing_page);
        assert_eq!(t.record.custom_data.get("plan"), Some(&json!("pro")));
        assert_eq!(t.record.extra.get("segment"), Some(&json!("b2b")));
        assert_eq!(t.record.last_activity, later);
    }

    #[test]
    fn test_missing_visit_rolls_over_from_zero() {
        let ids = SequentialIds::new("id");
        let mut first = step(None, SourceMap::new(), 0, &ids).record;
        first.visit = None;

        let t = step(Some(first), SourceMap::new(), 10, &ids);
        assert!(t.flags.is_new_visit);
        assert!(!t.flags.is_new_user);
        assert_eq!(t.record.visit.unwrap().count, 1);
    }

    #[test]
    fn test_fresh_visit_slides_expiry() {
        let ids = SequentialIds::new("id");
        let first = step(None, SourceMap::new(), 0, &ids).record;
        let t = step(Some(first.clone()), SourceMap::new(), 1_000, &ids);

        assert_eq!(t.flags, TransitionFlags::default());
        let visit = t.record.visit.as_ref().unwrap();
        assert_eq!(visit.id, first.visit.as_ref().unwrap().id);
        assert_eq!(visit.count, 1);
        assert_eq!(visit.expiration_date, 1_000 + VISIT_TTL);
        assert_eq!(t.record.last_activity, 1_000);
        assert_eq!(t.record.expiration_date, first.expiration_date);
    }

    #[test]
    fn test_new_campaign_mid_visit_is_new_source() {
        let ids = SequentialIds::new("id");
        let first = step(None, source(&[("utm_source", "news")]), 0, &ids).record;

        let current = source(&[("utm_source", "news"), ("utm_campaign", "spring")]);
        let t = step(Some(first.clone()), current.clone(), 500, &ids);

        assert!(t.flags.is_new_source);
        assert!(t.flags.announces_new_source());
        assert_eq!(t.record.visit.as_ref().unwrap().source, current);
        // User-level source is first-touch
        assert_eq!(t.record.source, first.source);
    }

    #[test]
    fn test_same_source_is_not_new() {
        let ids = SequentialIds::new("id");
        let current = source(&[("utm_source", "news")]);
        let first = step(None, current.clone(), 0, &ids).record;
        let t = step(Some(first), current, 500, &ids);
        assert!(!t.flags.is_new_source);
    }

    #[test]
    fn test_empty_source_never_replaces_visit_source() {
        let ids = SequentialIds::new("id");
        let original = source(&[("utm_source", "news")]);
        let first = step(None, original.clone(), 0, &ids).record;

        // Internal navigation: nothing attributable
        let t = step(Some(first), SourceMap::new(), 500, &ids);
        assert!(!t.flags.is_new_source);
        assert_eq!(t.record.visit.unwrap().source, original);
    }

    #[test]
    fn test_unlisted_param_alone_is_not_a_new_source() {
        let ids = SequentialIds::new("id");
        let first = step(None, SourceMap::new(), 0, &ids).record;
        let t = step(Some(first), source(&[("utm_term", "shoes")]), 500, &ids);
        assert!(!t.flags.is_new_source);
    }

    #[test]
    fn test_new_visit_never_announces_source() {
        let flags = TransitionFlags {
            is_new_user: false,
            is_new_visit: true,
            is_new_source: true,
        };
        assert!(!flags.announces_new_source());
    }

    #[test]
    fn test_visit_count_increments_once_per_rollover() {
        let ids = SequentialIds::new("id");
        let mut record = step(None, SourceMap::new(), 0, &ids).record;
        let mut now = 0;
        let mut last_count = 1;

        for round in 0..5 {
            // A renewal inside the window, then a gap that expires the visit
            now += 100;
            let renewed = step(Some(record), SourceMap::new(), now, &ids);
            assert_eq!(renewed.record.visit.as_ref().unwrap().count, last_count);

            now += VISIT_TTL + 1;
            let rolled = step(Some(renewed.record), SourceMap::new(), now, &ids);
            assert!(rolled.flags.is_new_visit, "round {}", round);
            let count = rolled.record.visit.as_ref().unwrap().count;
            assert_eq!(count, last_count + 1);
            last_count = count;
            record = rolled.record;
        }
    }
}
