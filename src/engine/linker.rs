//! Delivery-to-pickup linkage.
//!
//! A delivery draws from the pickups collected since the previous delivery.
//! Deliveries that directly follow another delivery share its pickups, so a
//! run of adjacent deliveries all split the same load.

use std::ops::Range;

use serde::Serialize;

use crate::models::stop::{Sequenced, StopKind, StopRef};

/// Index range of the pickups feeding the delivery at `index`.
///
/// Scans backward from `index - 1`. A delivery with nothing between it and
/// the current window end is treated as a sibling and the window shrinks past
/// it; any other delivery closes the scan. The range holds only pickups and
/// is empty when no pickup precedes the delivery.
pub fn pickup_range<S: Sequenced>(stops: &[S], index: usize) -> Range<usize> {
    let mut window_end = index.min(stops.len());

    for position in (0..window_end).rev() {
        if stops[position].kind() != StopKind::Delivery {
            continue;
        }

        if window_end == position + 1 {
            window_end = position;
        } else {
            return position + 1..window_end;
        }
    }

    0..window_end
}

/// Ids of the pickups feeding the delivery at `index`, in route order.
pub fn pickup_ids(stops: &[StopRef], index: usize) -> Vec<String> {
    stops[pickup_range(stops, index)]
        .iter()
        .map(|stop| stop.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryLink {
    pub delivery_id: String,
    pub pickup_ids: Vec<String>,
}

/// Linkage for every delivery in the sequence, in route order.
pub fn link_deliveries(stops: &[StopRef]) -> Vec<DeliveryLink> {
    stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| stop.kind == StopKind::Delivery)
        .map(|(index, stop)| DeliveryLink {
            delivery_id: stop.id.clone(),
            pickup_ids: pickup_ids(stops, index),
        })
        .collect()
}
