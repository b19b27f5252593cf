//! The payload pattern of a transfer.
//!
//! The stream repeats the ten decimal digits, so every byte can be checked by its offset alone.

const DIGIT: &[u8; 10] = b"0123456789";

/// Fill `buf` with the pattern starting at stream offset `offset`.
pub fn init(buf: &mut [u8], offset: usize) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = DIGIT[(offset + i) % DIGIT.len()];
    }
}

/// Find the first byte of `buf` deviating from the pattern at `offset`.
pub fn verify(buf: &[u8], offset: usize) -> Option<usize> {
    buf.iter()
        .enumerate()
        .position(|(i, &byte)| byte != DIGIT[(offset + i) % DIGIT.len()])
        .map(|i| offset + i)
}
