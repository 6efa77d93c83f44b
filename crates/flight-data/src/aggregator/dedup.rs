//! Cross-provider offer deduplication.
//!
//! Two offers describe the same logical flight when their segment
//! signatures (origin, destination, carrier, flight number of every
//! segment) are equal and their first departures lie within the tolerance.
//! Within a signature, offers are sorted by departure and chained: a gap
//! larger than the tolerance starts a new flight. Because every gap between
//! two flights exceeds the tolerance, merging again changes nothing.
//!
//! The tolerance therefore bounds neighbouring departures, not every pair.
//! A chain of offers each within the tolerance of the previous one merges
//! into one flight even when its first and last departures are further
//! apart: with five minutes, 08:00, 08:04 and 08:08 collapse into a single
//! offer. Pairwise clustering would keep 08:00 and 08:08 apart but would
//! depend on input order and could split differently on a second pass.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::{FlightOffer, SegmentKey};

/// Merge offers for the same logical flight.
///
/// The lowest-priced member survives (ties: provider name, then offer id)
/// and its `offered_by` lists every provider of the merged group, sorted.
pub fn deduplicate(offers: Vec<FlightOffer>, tolerance: Duration) -> Vec<FlightOffer> {
    let tolerance =
        chrono::Duration::from_std(tolerance).unwrap_or_else(|_| chrono::Duration::weeks(52));

    let mut groups: BTreeMap<Vec<SegmentKey>, Vec<FlightOffer>> = BTreeMap::new();
    let mut unkeyed = Vec::new();
    for offer in offers {
        let keys = offer.segment_keys();
        if keys.is_empty() || offer.departure().is_none() {
            unkeyed.push(offer);
        } else {
            groups.entry(keys).or_default().push(offer);
        }
    }

    let mut merged = Vec::new();
    for (_, mut group) in groups {
        group.sort_by_key(|offer| offer.departure());

        let mut cluster: Vec<FlightOffer> = Vec::new();
        for offer in group {
            let previous = cluster.last().and_then(FlightOffer::departure);
            let chained = match (previous, offer.departure()) {
                (Some(previous), Some(current)) => current - previous <= tolerance,
                _ => false,
            };
            if !chained && !cluster.is_empty() {
                merged.push(merge_cluster(std::mem::take(&mut cluster)));
            }
            cluster.push(offer);
        }
        if !cluster.is_empty() {
            merged.push(merge_cluster(cluster));
        }
    }

    merged.extend(unkeyed);
    merged
}

/// Order in which duplicates compete for survival.
fn survivor_order(a: &FlightOffer, b: &FlightOffer) -> Ordering {
    a.price
        .total
        .cmp(&b.price.total)
        .then_with(|| a.provider.cmp(&b.provider))
        .then_with(|| a.id.cmp(&b.id))
}

fn merge_cluster(mut cluster: Vec<FlightOffer>) -> FlightOffer {
    let mut offered_by: Vec<String> = cluster
        .iter()
        .flat_map(|offer| offer.offered_by.iter().cloned())
        .collect();
    offered_by.sort();
    offered_by.dedup();

    cluster.sort_by(survivor_order);
    let mut survivor = cluster.swap_remove(0);
    survivor.offered_by = offered_by;
    survivor
}
