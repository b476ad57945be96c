//! Display name assignment.
//!
//! Members get a whimsical animal name that no one else in the room holds.
//! Once the pool runs dry, names fall back to `User` plus four digits.

use rand::seq::IndexedRandom;
use rand::Rng;

/// Pool of display names, in assignment preference order.
pub const NAME_POOL: [&str; 10] = [
    "Red Panda",
    "Blue Whale",
    "Green Turtle",
    "Yellow Canary",
    "Purple Finch",
    "Orange Fox",
    "Silver Wolf",
    "Golden Eagle",
    "Pink Dolphin",
    "Brown Bear",
];

/// Prefix of names handed out once the pool is exhausted.
pub const FALLBACK_PREFIX: &str = "User";

/// Pick a display name not in `in_use`.
///
/// Draws uniformly from the unused pool names. When every pool name is
/// taken, returns a fallback name; fallback collisions are not checked.
pub fn pick_name<R: Rng + ?Sized>(in_use: &[&str], rng: &mut R) -> String {
    let available: Vec<&str> = NAME_POOL
        .iter()
        .copied()
        .filter(|name| !in_use.contains(name))
        .collect();

    match available.choose(rng) {
        Some(name) => (*name).to_string(),
        None => format!("{}{}", FALLBACK_PREFIX, rng.random_range(1000..=9999)),
    }
}

/// Check whether a name comes from the pool.
#[must_use]
pub fn is_pool_name(name: &str) -> bool {
    NAME_POOL.contains(&name)
}
