//! Random message payloads.

/// Alphabet payload characters are drawn from: ASCII letters, digits and space.
pub const PAYLOAD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";

/// Returns a string of exactly `size` characters drawn uniformly from
/// [`PAYLOAD_ALPHABET`].
///
/// Every character is single-byte ASCII, so the byte length equals `size`.
pub fn generate_message(size: usize) -> String {
    let mut rng = fastrand::Rng::new();
    (0..size)
        .map(|_| PAYLOAD_ALPHABET[rng.usize(..PAYLOAD_ALPHABET.len())] as char)
        .collect()
}
