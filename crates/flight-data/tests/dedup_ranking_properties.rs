//! Property-based tests for offer deduplication and ranking.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use farescout_flight_data::aggregator::{compare_offers, deduplicate, rank};
use farescout_flight_data::{FlightOffer, Itinerary, Price, Segment};
use proptest::prelude::*;
use rust_decimal::Decimal;

const TOLERANCE: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Generators
// =============================================================================

fn base_departure() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 11, 2)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap()
}

/// Raw offer fields: provider, carrier, flight, departure offset, minutes,
/// price, connecting.
type OfferSeed = (usize, usize, u32, i64, u32, u32, bool);

fn arb_seed() -> impl Strategy<Value = OfferSeed> {
    (
        0usize..3,      // provider
        0usize..2,      // carrier
        1u32..4,        // flight number
        0i64..90,       // minutes after 08:00
        200u32..420,    // duration
        100u32..500,    // price
        any::<bool>(),  // connecting via ORD
    )
}

fn build_offer(index: usize, seed: OfferSeed) -> FlightOffer {
    let (provider, carrier, flight, offset, minutes, price, connecting) = seed;
    let provider = ["AMADEUS", "DUFFEL", "KIWI"][provider];
    let carrier = ["UA", "AA"][carrier];
    let departure = base_departure() + chrono::Duration::minutes(offset);
    let arrival = departure + chrono::Duration::minutes(i64::from(minutes));

    let segment = |origin: &str, destination: &str, dep, arr, number: u32, mins| Segment {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure: dep,
        arrival: arr,
        carrier: carrier.to_string(),
        flight_number: number.to_string(),
        duration_minutes: mins,
    };

    let segments = if connecting {
        let half = minutes / 2;
        let connection = departure + chrono::Duration::minutes(i64::from(half));
        vec![
            segment("JFK", "ORD", departure, connection, flight, half),
            segment("ORD", "LAX", connection, arrival, flight + 100, minutes - half),
        ]
    } else {
        vec![segment("JFK", "LAX", departure, arrival, flight, minutes)]
    };

    FlightOffer::new(
        format!("offer-{index}"),
        provider,
        Price::total_only(Decimal::from(price), "USD"),
        vec![Itinerary::new(segments, Some(minutes))],
    )
}

fn arb_offers() -> impl Strategy<Value = Vec<FlightOffer>> {
    proptest::collection::vec(arb_seed(), 0..40).prop_map(|seeds| {
        seeds
            .into_iter()
            .enumerate()
            .map(|(i, seed)| build_offer(i, seed))
            .collect()
    })
}

fn providers_of(offers: &[FlightOffer]) -> BTreeSet<String> {
    offers
        .iter()
        .flat_map(|o| o.offered_by.iter().cloned())
        .collect()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Merging an already merged list changes nothing.
    #[test]
    fn prop_deduplicate_is_idempotent(offers in arb_offers()) {
        let once = deduplicate(offers, TOLERANCE);
        let twice = deduplicate(once.clone(), TOLERANCE);
        prop_assert_eq!(once, twice);
    }

    /// Merging never invents offers and never loses a provider's attribution.
    #[test]
    fn prop_deduplicate_preserves_attribution(offers in arb_offers()) {
        let providers = providers_of(&offers);
        let ids: BTreeSet<String> = offers.iter().map(|o| o.id.clone()).collect();
        let count = offers.len();

        let merged = deduplicate(offers, TOLERANCE);

        prop_assert!(merged.len() <= count);
        prop_assert_eq!(providers_of(&merged), providers);
        for offer in &merged {
            prop_assert!(ids.contains(&offer.id));
            prop_assert!(offer.offered_by.contains(&offer.provider));
            prop_assert!(offer.offered_by.windows(2).all(|w| w[0] < w[1]));
        }
    }

    /// No two survivors describe the same flight within the tolerance.
    #[test]
    fn prop_survivors_are_distinct_flights(offers in arb_offers()) {
        let merged = deduplicate(offers, TOLERANCE);
        let tolerance = chrono::Duration::from_std(TOLERANCE).unwrap();

        for (i, a) in merged.iter().enumerate() {
            for b in merged.iter().skip(i + 1) {
                if a.segment_keys() == b.segment_keys() {
                    let gap = (a.departure().unwrap() - b.departure().unwrap()).abs();
                    prop_assert!(gap > tolerance);
                }
            }
        }
    }

    /// Ranked output is ordered by price, then duration, then stops.
    #[test]
    fn prop_rank_orders_by_price_duration_stops(mut offers in arb_offers()) {
        rank(&mut offers);
        for pair in offers.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.price.total <= b.price.total);
            if a.price.total == b.price.total {
                prop_assert!(a.total_duration_minutes() <= b.total_duration_minutes());
                if a.total_duration_minutes() == b.total_duration_minutes() {
                    prop_assert!(a.total_stops() <= b.total_stops());
                }
            }
            prop_assert!(compare_offers(a, b).is_le());
        }
    }

    /// Input order does not affect the ranked result.
    #[test]
    fn prop_rank_is_independent_of_input_order(offers in arb_offers()) {
        let mut forward = offers.clone();
        let mut backward: Vec<FlightOffer> = offers.into_iter().rev().collect();
        rank(&mut forward);
        rank(&mut backward);
        prop_assert_eq!(forward, backward);
    }
}
