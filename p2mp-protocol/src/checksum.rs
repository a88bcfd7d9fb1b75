//! Payload Checksum
//!
//! 16-bit checksum in the Internet-checksum family: the payload is summed
//! as big-endian 16-bit words with wrapping 16-bit addition and the result
//! is inverted. An odd trailing byte acts as the high byte of a word whose
//! low byte is zero. The header is never covered; both sides run the same
//! function and verification is a plain equality check.

/// Compute the 16-bit checksum of a payload.
///
/// Wrapping 16-bit word summation without end-around carry, followed by
/// one's-complement inversion. Pure and deterministic; `checksum(&[])` is
/// `!0` == 0xFFFF.
pub fn checksum(payload: &[u8]) -> u16 {
    let mut sum: u16 = 0;

    let mut words = payload.chunks_exact(2);
    for pair in &mut words {
        sum = sum.wrapping_add(u16::from_be_bytes([pair[0], pair[1]]));
    }

    if let [last] = words.remainder() {
        sum = sum.wrapping_add((*last as u16) << 8);
    }

    !sum
}

/// Check a stored checksum against the payload it claims to cover.
#[inline]
pub fn verify(payload: &[u8], stored: u16) -> bool {
    checksum(payload) == stored
}
