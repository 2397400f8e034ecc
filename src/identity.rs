//! Pseudonym allocation for anonymous connections
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ADJECTIVES: [&str; 8] = [
    "Silent", "Shadow", "Ghost", "Phantom", "Cipher", "Stealth", "Hidden", "Mystery",
];
pub const NOUNS: [&str; 8] = [
    "Agent", "Walker", "Runner", "Hunter", "Seeker", "Finder", "Observer", "Watcher",
];
/// Exclusive upper bound of the numeric suffix
pub const SUFFIX_BOUND: u16 = 1000;

/// Display name assigned to a connection for its whole lifetime
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pseudonym(String);

impl Pseudonym {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose `<Adjective><Noun><0..1000>` from the given random source.
///
/// Collisions between live connections are possible and tolerated.
pub fn allocate<R: Rng>(rng: &mut R) -> Pseudonym {
    // Both vocabularies are non-empty constants
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or(ADJECTIVES[0]);
    let noun = NOUNS.choose(rng).copied().unwrap_or(NOUNS[0]);
    let suffix = rng.gen_range(0..SUFFIX_BOUND);
    Pseudonym(format!("{}{}{}", adjective, noun, suffix))
}
