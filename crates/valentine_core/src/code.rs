//! Share code generation.
//!
//! A code is two independently drawn base-36 fragments glued together. Nothing
//! coordinates concurrent creators, so uniqueness is probabilistic here and is
//! enforced by the store's unique constraint plus a retry in the create flow.

use rand::rngs::OsRng;
use rand::Rng;

use crate::domain::Code;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Characters per fragment. Two fragments give 36^12 possible codes.
pub const FRAGMENT_LEN: usize = 6;

/// Creates a code from the given random source.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> Code {
    let mut raw = String::with_capacity(FRAGMENT_LEN * 2);
    raw.push_str(&fragment(rng));
    raw.push_str(&fragment(rng));
    Code::from_generated(raw)
}

/// Creates a code from the operating system's CSPRNG.
pub fn random_code() -> Code {
    generate_code(&mut OsRng)
}

fn fragment<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..FRAGMENT_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
