//! Simulates packet loss.
//!
//! Every segment put on the wire asks the model for its fate. Losses are drawn uniformly, each
//! loss may extend into a burst of consecutive ones.

/// Simple pseudo-random loss.
#[derive(Copy, Clone, Debug, Hash)]
pub struct Loss {
    /// Segments with a roll below the threshold are dropped, `None` never drops.
    threshold: Option<u32>,
    /// Length of a burst started by a drop.
    burst: u32,
    /// Drops left in the current burst.
    pending: u32,
    /// The current prng state.
    ///
    /// Xoroshiro256**, yes this is far too good.
    prng: Xoroshiro256,
}

#[derive(Copy, Clone, Debug, Hash)]
pub struct Xoroshiro256 {
    state: [u64; 4],
}

impl Loss {
    /// A link that never loses anything.
    pub fn none() -> Self {
        Loss {
            threshold: None,
            burst: 1,
            pending: 0,
            prng: Xoroshiro256::new(0),
        }
    }

    /// A uniform loss simulator, `rate` is the probability of a drop.
    pub fn uniform(rate: f64, seed: u64) -> Self {
        let threshold = if rate > 0.0 {
            Some((rate.min(1.0) * f64::from(u32::max_value())) as u32)
        } else {
            None
        };

        Loss {
            threshold,
            prng: Xoroshiro256::new(seed),
            ..Loss::none()
        }
    }

    /// Drop `len` consecutive segments whenever a drop is rolled.
    pub fn with_burst(self, len: u32) -> Self {
        Loss {
            burst: len.max(1),
            ..self
        }
    }

    /// Determine the fate for the next packet, `true` if it is lost.
    pub fn drops(&mut self) -> bool {
        if self.pending > 0 {
            self.pending -= 1;
            return true;
        }

        let threshold = match self.threshold {
            Some(threshold) => threshold,
            None => return false,
        };

        if self.roll() < threshold {
            self.pending = self.burst - 1;
            true
        } else {
            false
        }
    }

    fn roll(&mut self) -> u32 {
        (self.prng.next_u64() >> 32) as u32
    }
}

impl Xoroshiro256 {
    /// Expand the seed with splitmix64, the all-zero state is a fixpoint.
    pub fn new(seed: u64) -> Self {
        let mut x = seed;
        let mut state = [0; 4];
        for word in state.iter_mut() {
            x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = x;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            *word = z ^ (z >> 31);
        }
        Xoroshiro256 { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result_starstar = s[1]
            .wrapping_mul(5)
            .rotate_left(7)
            .wrapping_mul(9);

        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;

        s[3] = s[3].rotate_left(45);

        result_starstar
    }
}
