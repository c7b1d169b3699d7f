//! Random record factory and the stock perturbation used by the host.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::record::{Record, Roast};

const NAME_PREFIXES: &[&str] = &[
    "Aurora",
    "Lunar",
    "Solar",
    "Nebula",
    "Quasar",
    "Eclipse",
    "Zenith",
    "Celestial",
];

const NAME_SUFFIXES: &[&str] = &[
    "Bloom", "Drift", "Pulse", "Voyage", "Beacon", "Horizon", "Echo", "Current",
];

const ORIGINS: &[&str] = &[
    "Ethiopia",
    "Kenya",
    "Guatemala",
    "Peru",
    "Brazil",
    "Colombia",
    "Costa Rica",
    "Sumatra",
];

const TASTING_PALETTE: &[&str] = &[
    "cocoa",
    "berries",
    "molasses",
    "hibiscus",
    "stone fruit",
    "spice",
    "vanilla",
    "jasmine",
    "maple",
    "black tea",
    "nougat",
    "citrus",
];

/// Number of tasting notes on a generated record.
pub const NOTES_PER_RECORD: usize = 3;

/// Build a random record with a fresh v4 id.
pub fn generate_record<R: Rng + ?Sized>(rng: &mut R) -> Record {
    let name = format!("{} {}", pick(rng, NAME_PREFIXES), pick(rng, NAME_SUFFIXES));
    let roast = Roast::ALL[rng.gen_range(0..Roast::ALL.len())];
    let tasting_notes = TASTING_PALETTE
        .choose_multiple(rng, NOTES_PER_RECORD)
        .map(|note| note.to_string())
        .collect();
    let stock = rng.gen_range(20..65);
    let price = (rng.gen_range(14.0..23.0_f64) * 100.0).round() / 100.0;

    Record::new(
        uuid::Uuid::new_v4().to_string(),
        name,
        pick(rng, ORIGINS),
        roast,
        tasting_notes,
        stock,
        price,
    )
}

/// Stock delta applied by one perturbation tick: -1 or +1 with equal odds.
pub fn perturb_delta<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    if rng.gen_bool(0.5) {
        -1
    } else {
        1
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn generated_records_are_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let record = generate_record(&mut rng);

            prop_assert!(record.validate().is_ok());
            prop_assert!((20..=64).contains(&record.stock));
            prop_assert!((14.0..=23.0).contains(&record.price));
            prop_assert!(((record.price * 100.0).round() / 100.0 - record.price).abs() < 1e-9);

            let notes: HashSet<_> = record.tasting_notes.iter().collect();
            prop_assert_eq!(notes.len(), NOTES_PER_RECORD);
            prop_assert!(ORIGINS.contains(&record.origin.as_str()));
        }

        #[test]
        fn perturb_delta_is_unit(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let delta = perturb_delta(&mut rng);
            prop_assert!(delta == 1 || delta == -1);
        }
    }

    #[test]
    fn generated_ids_are_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = generate_record(&mut rng);
        let b = generate_record(&mut rng);
        assert_ne!(a.id, b.id);
    }
}
