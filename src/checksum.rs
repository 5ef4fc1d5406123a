//! Payload integrity via Adler-32.
//!
//! The container header stamps an Adler-32 of the *decompressed* payload.
//! The same routine validates inbound containers and stamps outbound ones,
//! so it must match the classic algorithm bit-for-bit.

/// Largest prime below 2^16, per the Adler-32 definition.
const ADLER_MOD: u32 = 65521;

/// Computes the Adler-32 checksum of a byte span.
///
/// Two 16-bit accumulators (`a` starting at 1, `b` at 0) are updated per
/// byte modulo 65521 and combined as `(b << 16) | a`. The full span is
/// always consumed; callers compare the result afterwards, there is no early
/// termination on mismatch.
pub fn adler32(bytes: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for &byte in bytes {
        a = (a + u32::from(byte)) % ADLER_MOD;
        b = (b + a) % ADLER_MOD;
    }

    (b << 16) | a
}
