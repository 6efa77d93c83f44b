use std::cmp::Ordering;

use crate::models::FlightOffer;

/// Total order used for search results.
///
/// Cheapest first, then shortest, then fewest stops. Offer id and provider
/// make full ties deterministic.
pub fn compare_offers(a: &FlightOffer, b: &FlightOffer) -> Ordering {
    a.price
        .total
        .cmp(&b.price.total)
        .then_with(|| a.total_duration_minutes().cmp(&b.total_duration_minutes()))
        .then_with(|| a.total_stops().cmp(&b.total_stops()))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.provider.cmp(&b.provider))
}

pub fn rank(offers: &mut [FlightOffer]) {
    offers.sort_by(compare_offers);
}
