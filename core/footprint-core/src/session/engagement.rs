//! Deferred "engaged visit" promotion.
//!
//! Armed once per new visit with the visit id captured at schedule time. When
//! it fires, the caller re-reads the persisted record (another tab may have
//! rolled the visit over) and passes it here. There is no cancellation: a
//! superseded check is detected by id mismatch and does nothing.

use crate::types::IdentityRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum EngagementOutcome {
    /// The visit is still current; the returned record has `isEngaged = true`.
    Promoted(IdentityRecord),
    /// Already engaged; nothing to write or announce.
    AlreadyEngaged,
    /// The persisted visit is a different one (or gone).
    Superseded,
    /// Nothing persisted to promote.
    NoRecord,
}

pub fn promote_engaged(current: Option<IdentityRecord>, scheduled_visit_id: &str) -> EngagementOutcome {
    let mut record = match current {
        Some(record) => record,
        None => return EngagementOutcome::NoRecord,
    };

    let visit = match record.visit.as_mut() {
        Some(visit) if visit.id == scheduled_visit_id => visit,
        _ => return EngagementOutcome::Superseded,
    };

    if visit.is_engaged {
        return EngagementOutcome::AlreadyEngaged;
    }
    visit.is_engaged = true;
    EngagementOutcome::Promoted(record)
}
