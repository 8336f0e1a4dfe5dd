//! Type-aware synthetic replacement values for the `random` method.
//!
//! Values only need to look plausible for the entity type; the policy layer
//! normalizes them to the original span length afterwards.

use rand::seq::SliceRandom;
use rand::Rng;

const FIRST_NAMES: [&str; 8] = [
    "Alex", "Jordan", "Sam", "Priya", "Ravi", "Maria", "Chen", "Fatima",
];

const LAST_NAMES: [&str; 8] = [
    "Taylor", "Patel", "Garcia", "Kim", "Okafor", "Mueller", "Silva", "Nakamura",
];

const ORGANIZATIONS: [&str; 6] = [
    "Northwind Group",
    "Apex Industries",
    "Blue Ridge LLC",
    "Vertex Partners",
    "Summit Holdings",
    "Ironwood Corp",
];

const LOCATIONS: [&str; 6] = [
    "Springfield",
    "Riverside",
    "Fairview",
    "Greenville",
    "Lakewood",
    "Oakdale",
];

pub fn generate<R: Rng + ?Sized>(entity_type: &str, rng: &mut R) -> String {
    match entity_type {
        "PERSON" => {
            let first = FIRST_NAMES.choose(rng).unwrap_or(&"Alex");
            let last = LAST_NAMES.choose(rng).unwrap_or(&"Taylor");
            format!("{first} {last}")
        }
        "EMAIL_ADDRESS" => {
            let first = FIRST_NAMES.choose(rng).unwrap_or(&"Alex").to_lowercase();
            let last = LAST_NAMES.choose(rng).unwrap_or(&"Taylor").to_lowercase();
            format!("{first}.{last}@example.com")
        }
        "PHONE_NUMBER" => format!("555-{:03}-{:04}", rng.gen_range(100..1000), rng.gen_range(0..10000)),
        "AADHAAR" => format!(
            "{:04} {:04} {:04}",
            rng.gen_range(1000..10000),
            rng.gen_range(0..10000),
            rng.gen_range(0..10000)
        ),
        "SSN" => format!(
            "{:03}-{:02}-{:04}",
            rng.gen_range(100..900),
            rng.gen_range(0..100),
            rng.gen_range(0..10000)
        ),
        "CREDIT_CARD" => format!(
            "4{:03} {:04} {:04} {:04}",
            rng.gen_range(0..1000),
            rng.gen_range(0..10000),
            rng.gen_range(0..10000),
            rng.gen_range(0..10000)
        ),
        "PAN" => {
            let letters: String = (0..5).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
            let tail = rng.gen_range(b'A'..=b'Z') as char;
            format!("{letters}{:04}{tail}", rng.gen_range(0..10000))
        }
        "IFSC" => {
            let bank: String = (0..4).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
            format!("{bank}0{:06}", rng.gen_range(0..1000000))
        }
        "ORGANIZATION" => ORGANIZATIONS.choose(rng).unwrap_or(&"Apex Industries").to_string(),
        "LOCATION" => LOCATIONS.choose(rng).unwrap_or(&"Springfield").to_string(),
        "DATE_TIME" => format!(
            "{:02}/{:02}/{}",
            rng.gen_range(1..13),
            rng.gen_range(1..29),
            rng.gen_range(1970..2010)
        ),
        "CUSTOM_ID" => format!("{:010}", rng.gen_range(0u64..10_000_000_000)),
        _ => "REDACTED".to_string(),
    }
}
