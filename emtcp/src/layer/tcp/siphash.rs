//! Initial sequence numbers after rfc6528.
//!
//! A keyed SipHash-2-4 over the connection identity is added to a clock running at 250 kHz, as
//! recommended by rfc793. The hash function is from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use crate::time::Instant;
use crate::wire::{Ipv4Address, TcpSeqNumber};

/// Keyed generator of initial sequence numbers.
///
/// > ISN = M + SipHash-2-4(key, remote address, generation, local port, remote port)
///
/// The local address is not hashed, a node has only one. The generation of the socket slot is,
/// so that a slot reopened towards the same remote within one clock step starts from a new
/// number anyway.
#[derive(Clone, Copy, Debug)]
pub struct IsnGenerator {
    k0: u64,
    k1: u64,
}

/// The internal state `v0..v3` of one SipHash computation.
struct Sip([u64; 4]);

impl IsnGenerator {
    /// Derive a key from a fresh `RandomState` of the standard library.
    #[cfg(feature = "std")]
    pub fn from_std_hash() -> Self {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let state = RandomState::new();
        let derive = |word: u64| {
            let mut hasher = state.build_hasher();
            hasher.write_u64(word);
            hasher.finish()
        };
        IsnGenerator::from_key(derive(0), derive(1))
    }

    /// Use 16 secret bytes as the key.
    ///
    /// They should come from a real source of entropy, such as a hardware generator sampled at
    /// boot.
    pub fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let mut k0 = [0; 8];
        let mut k1 = [0; 8];
        k0.copy_from_slice(&bytes[..8]);
        k1.copy_from_slice(&bytes[8..]);
        IsnGenerator::from_key(u64::from_le_bytes(k0), u64::from_le_bytes(k1))
    }

    /// Use a fixed key, for reproducible runs.
    pub fn from_key(k0: u64, k1: u64) -> Self {
        IsnGenerator { k0, k1 }
    }

    /// The initial sequence number of a connection opened at `time`.
    pub fn get_isn(
        &self,
        local_port: u16,
        remote: Ipv4Address,
        remote_port: u16,
        generation: u32,
        time: Instant,
    ) -> TcpSeqNumber {
        // Twelve message bytes, the length goes into the top byte of the last word.
        let words = [
            u64::from(remote.to_network_integer()) | u64::from(generation) << 32,
            u64::from(local_port) | u64::from(remote_port) << 16 | 12_u64 << 56,
        ];
        let hash = Sip::hash(self.k0, self.k1, &words);
        TcpSeqNumber(hash as i32) + (time.total_millis() / 4) as usize
    }
}

impl Sip {
    fn new(k0: u64, k1: u64) -> Self {
        Sip([
            k0 ^ 0x736f_6d65_7073_6575,
            k1 ^ 0x646f_7261_6e64_6f6d,
            k0 ^ 0x6c79_6765_6e65_7261,
            k1 ^ 0x7465_6462_7974_6573,
        ])
    }

    /// Hash message words already in little endian order, length byte included.
    fn hash(k0: u64, k1: u64, words: &[u64]) -> u64 {
        let mut sip = Sip::new(k0, k1);
        for &word in words {
            sip.0[3] ^= word;
            sip.rounds(2);
            sip.0[0] ^= word;
        }
        sip.0[2] ^= 0xff;
        sip.rounds(4);
        let [v0, v1, v2, v3] = sip.0;
        v0 ^ v1 ^ v2 ^ v3
    }

    fn rounds(&mut self, count: usize) {
        let [mut v0, mut v1, mut v2, mut v3] = self.0;
        for _ in 0..count {
            v0 = v0.wrapping_add(v1);
            v2 = v2.wrapping_add(v3);
            v1 = v1.rotate_left(13) ^ v0;
            v3 = v3.rotate_left(16) ^ v2;
            v0 = v0.rotate_left(32);

            v2 = v2.wrapping_add(v1);
            v0 = v0.wrapping_add(v3);
            v1 = v1.rotate_left(17) ^ v2;
            v3 = v3.rotate_left(21) ^ v0;
            v2 = v2.rotate_left(32);
        }
        self.0 = [v0, v1, v2, v3];
    }
}
