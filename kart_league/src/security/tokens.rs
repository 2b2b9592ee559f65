//! Random tokens and constant-time comparison.

use rand::RngCore;
use subtle::ConstantTimeEq;

/// Random bytes in a token (hex encoded to twice as many characters)
pub const TOKEN_BYTES: usize = 32;

/// Generate a random token of [`TOKEN_BYTES`] bytes as lowercase hex
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare two secrets without leaking where they differ
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Whether a string has the shape of a generated token
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Short, non-reversible fingerprint of a token for logs
pub fn fingerprint(token: &str) -> String {
    token.chars().take(6).collect::<String>() + "…"
}
