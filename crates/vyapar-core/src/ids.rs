//! # Identifier Generator
//!
//! Random business identifiers drawn from the operating system's CSPRNG.
//!
//! ```text
//! generate_id(16, Alphabet::Digits, "")       → "4821907733016254"
//! generate_id(10, Alphabet::Alphanumeric, "T-") → "T-7QX2M9KD"
//! ```
//!
//! The prefix is part of the requested length, but at least one random
//! character is always produced. No uniqueness is promised here: callers
//! rely on a unique constraint at the persistence layer.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ALPHANUMERIC_UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGITS: &[u8] = b"0123456789";

/// Character set used for the random part of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alphabet {
    /// `A-Z` and `0-9`.
    #[default]
    Alphanumeric,
    /// `0-9` only.
    Digits,
}

impl Alphabet {
    fn symbols(self) -> &'static [u8] {
        match self {
            Alphabet::Alphanumeric => ALPHANUMERIC_UPPER,
            Alphabet::Digits => DIGITS,
        }
    }
}

/// Generates an identifier of `length` characters (prefix included).
pub fn generate_id(length: usize, alphabet: Alphabet, prefix: &str) -> String {
    generate_id_with(&mut OsRng, length, alphabet, prefix)
}

/// Same as [`generate_id`] with an explicit entropy source.
///
/// Bounded by `CryptoRng` so a predictable generator cannot be plugged in
/// by accident.
pub fn generate_id_with<R>(rng: &mut R, length: usize, alphabet: Alphabet, prefix: &str) -> String
where
    R: Rng + CryptoRng,
{
    let random_len = length.saturating_sub(prefix.chars().count()).max(1);
    let symbols = alphabet.symbols();

    let mut id = String::with_capacity(prefix.len() + random_len);
    id.push_str(prefix);
    for _ in 0..random_len {
        let idx = rng.gen_range(0..symbols.len());
        id.push(symbols[idx] as char);
    }
    id
}

/// 16-digit numeric transaction identifier.
pub fn transaction_id() -> String {
    generate_id(crate::TRANSACTION_ID_LENGTH, Alphabet::Digits, "")
}

/// 8 random bytes as lowercase hex, stored with every transaction.
pub fn transaction_hash() -> String {
    let bytes: [u8; 8] = OsRng.gen();
    hex::encode(bytes)
}

/// Surrogate key for rows that never leave the database (UUID v4).
pub fn entity_id() -> String {
    Uuid::new_v4().to_string()
}
