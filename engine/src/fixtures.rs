//! The default catalog a fresh host is seeded with.

use crate::record::{Record, Roast};

/// Seed records, in display order.
pub fn seed_records() -> Vec<Record> {
    vec![
        Record::new(
            "andromeda",
            "Andromeda Blend",
            "Ethiopia & Guatemala",
            Roast::Light,
            notes(&["citrus", "floral", "stone fruit"]),
            34,
            18.5,
        ),
        Record::new(
            "nebula",
            "Nebula Night",
            "Colombia",
            Roast::Medium,
            notes(&["caramel", "cocoa", "hazelnut"]),
            52,
            16.75,
        ),
        Record::new(
            "cosmos",
            "Cosmos Reserve",
            "Kenya",
            Roast::Light,
            notes(&["cranberry", "black tea", "bergamot"]),
            21,
            21.0,
        ),
        Record::new(
            "pulsar",
            "Pulsar Decaf",
            "Peru",
            Roast::Dark,
            notes(&["molasses", "dark chocolate", "smoke"]),
            44,
            17.25,
        ),
        Record::new(
            "zenith",
            "Zenith Espresso",
            "Brazil",
            Roast::Dark,
            notes(&["almond", "toffee", "brown sugar"]),
            63,
            19.5,
        ),
    ]
}

fn notes(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
