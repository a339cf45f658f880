use std::collections::HashSet;

use crate::engine::linker::pickup_range;
use crate::error::ValidationError;
use crate::models::route::RouteDraft;
use crate::models::stop::{Sequenced, StopKind, StopRef};

/// True when the sequence may be submitted: it has a pickup, has a delivery
/// and ends with a delivery. A false result is not an error; the draft stays
/// editable.
pub fn validate<S: Sequenced>(stops: &[S]) -> bool {
    check_sequence(stops).is_ok()
}

pub fn check_sequence<S: Sequenced>(stops: &[S]) -> Result<(), ValidationError> {
    let Some(last) = stops.last() else {
        return Err(ValidationError::Empty);
    };

    if !stops.iter().any(|stop| stop.kind() == StopKind::Pickup) {
        return Err(ValidationError::NoPickup);
    }
    if !stops.iter().any(|stop| stop.kind() == StopKind::Delivery) {
        return Err(ValidationError::NoDelivery);
    }
    if last.kind() != StopKind::Delivery {
        return Err(ValidationError::EndsWithPickup);
    }

    Ok(())
}

/// Checks on the draft as a whole that do not need storage.
pub fn check_draft(draft: &RouteDraft) -> Result<(), ValidationError> {
    check_sequence(&draft.stops)?;

    if draft.scheduled_finish < draft.scheduled_start {
        return Err(ValidationError::FinishBeforeStart);
    }

    let mut seen = HashSet::new();
    for stop in &draft.stops {
        if let Some(id) = &stop.id {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::DuplicateStopId(id.clone()));
            }
        }

        if let Some(percent) = stop.percent_of_total_dropped {
            if percent > 100 {
                return Err(ValidationError::PercentOutOfRange {
                    stop_id: stop.id.clone().unwrap_or_default(),
                    percent,
                });
            }
        }
    }

    Ok(())
}

/// Every delivery must draw from at least one pickup.
pub fn check_linkage(stops: &[StopRef]) -> Result<(), ValidationError> {
    for (index, stop) in stops.iter().enumerate() {
        if stop.kind == StopKind::Delivery && pickup_range(stops, index).is_empty() {
            return Err(ValidationError::DeliveryWithoutPickups {
                stop_id: stop.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use super::{check_draft, check_linkage, check_sequence, validate};
    use crate::error::ValidationError;
    use crate::models::route::RouteDraft;
    use crate::models::stop::StopKind::{Delivery as D, Pickup as P};
    use crate::models::stop::{StopDraft, StopKind, StopRef};

    fn refs(kinds: &[StopKind]) -> Vec<StopRef> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| StopRef {
                id: format!("s{i}"),
                kind: *kind,
            })
            .collect()
    }

    #[test]
    fn rejects_empty_sequence() {
        let empty: Vec<StopKind> = Vec::new();
        assert!(!validate(&empty));
        assert_eq!(check_sequence(&empty), Err(ValidationError::Empty));
    }

    #[test]
    fn rejects_sequence_without_pickup() {
        assert_eq!(check_sequence(&[D, D]), Err(ValidationError::NoPickup));
    }

    #[test]
    fn rejects_sequence_without_delivery() {
        assert_eq!(check_sequence(&[P, P]), Err(ValidationError::NoDelivery));
    }

    #[test]
    fn rejects_sequence_ending_in_pickup() {
        assert_eq!(check_sequence(&[P, D, P]), Err(ValidationError::EndsWithPickup));
    }

    #[test]
    fn accepts_interleaved_sequences() {
        assert!(validate(&[P, D]));
        assert!(validate(&[P, P, D, P, D, D]));
        assert!(validate(&[D, P, D]));
    }

    #[test]
    fn linkage_rejects_leading_delivery() {
        let stops = refs(&[D, P, D]);
        assert_eq!(
            check_linkage(&stops),
            Err(ValidationError::DeliveryWithoutPickups {
                stop_id: "s0".to_string()
            })
        );
        assert!(check_linkage(&refs(&[P, D, D, P, D])).is_ok());
    }

    #[test]
    fn draft_rejects_inverted_schedule_and_bad_percentages() {
        let start = Utc::now();
        let stops = vec![
            StopDraft::new(P, "org", "loc").with_id("p"),
            StopDraft::new(D, "org", "loc").with_id("d"),
        ];

        let inverted = RouteDraft::new(start, start - Duration::hours(1), stops.clone());
        assert_eq!(check_draft(&inverted), Err(ValidationError::FinishBeforeStart));

        let mut overdrop = RouteDraft::new(start, start + Duration::hours(2), stops);
        overdrop.stops[1].percent_of_total_dropped = Some(120);
        assert_eq!(
            check_draft(&overdrop),
            Err(ValidationError::PercentOutOfRange {
                stop_id: "d".to_string(),
                percent: 120
            })
        );
    }

    #[test]
    fn draft_rejects_duplicate_stop_ids() {
        let start = Utc::now();
        let draft = RouteDraft::new(
            start,
            start,
            vec![
                StopDraft::new(P, "org", "loc").with_id("same"),
                StopDraft::new(D, "org", "loc").with_id("same"),
            ],
        );
        assert_eq!(
            check_draft(&draft),
            Err(ValidationError::DuplicateStopId("same".to_string()))
        );
    }

    proptest! {
        #[test]
        fn validity_matches_the_three_rules(
            seq in prop::collection::vec(prop_oneof![Just(P), Just(D)], 0..16)
        ) {
            let expected = seq.contains(&P) && seq.contains(&D) && seq.last() == Some(&D);
            prop_assert_eq!(validate(&seq), expected);
        }
    }
}
