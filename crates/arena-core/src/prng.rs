//! Deterministic pseudo-random number generation.
//!
//! [`Prng`] is a `xoroshiro128+` generator: not cryptographically secure,
//! used only to drive gameplay/state simulation where reproducibility across
//! runs matters more than statistical rigor. [`RootSeed`] derives
//! subsystem-labeled child generators from a single world seed so that, for
//! example, AI decisions and effect-spawn sampling draw from independent
//! streams without either one perturbing the other's sequence.

/// Stateful `xoroshiro128+` pseudo-random number generator for deterministic
/// timelines.
///
/// Identical seeds produce identical sequences as long as each process
/// consumes random numbers in the same order.
#[derive(Debug, Clone, Copy)]
pub struct Prng {
    state: [u64; 2],
}

impl Prng {
    /// Constructs a PRNG from two 64-bit seeds.
    #[must_use]
    pub fn from_seed(seed0: u64, seed1: u64) -> Self {
        let mut state = [seed0, seed1];
        if state[0] == 0 && state[1] == 0 {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    /// Constructs a PRNG from a single 64-bit seed via `SplitMix64` expansion.
    #[must_use]
    pub fn from_seed_u64(seed: u64) -> Self {
        fn splitmix64(state: &mut u64) -> u64 {
            *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = *state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        let mut sm_state = seed;
        let state = [splitmix64(&mut sm_state), splitmix64(&mut sm_state)];
        Self::from_seed(state[0], state[1])
    }

    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Returns the next float in `[0, 1)`.
    #[must_use]
    pub fn next_f32(&mut self) -> f32 {
        let raw = self.next_u64();
        let bits = ((raw >> 41) as u32) | 0x3f80_0000;
        f32::from_bits(bits) - 1.0
    }

    /// Returns the next integer in the inclusive range `[min, max]`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    pub fn next_int(&mut self, min: i32, max: i32) -> i32 {
        debug_assert!(min <= max, "invalid range: {min}..={max}");
        let span = (i64::from(max) - i64::from(min)) as u64 + 1;
        if span == 1 {
            return min;
        }

        let value = if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let bound = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < bound {
                    break candidate % span;
                }
            }
        };

        (value as i64 + i64::from(min)) as i32
    }

    /// Returns the next float uniformly distributed in `[min, max)`.
    pub fn next_range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

/// Root seed for a simulation run; derives deterministic, subsystem-labeled
/// child generators so independent subsystems don't perturb each other's
/// random sequence.
#[derive(Debug, Clone, Copy)]
pub struct RootSeed(u64, u64);

impl RootSeed {
    /// Builds a root seed from an arbitrary string (e.g. a harness name),
    /// hashed with `blake3` into two 64-bit words.
    #[must_use]
    pub fn from_str_seed(seed: &str) -> Self {
        let hash = blake3::hash(seed.as_bytes());
        let bytes = hash.as_bytes();
        let lo = u64::from_le_bytes(bytes[0..8].try_into().unwrap_or_default());
        let hi = u64::from_le_bytes(bytes[8..16].try_into().unwrap_or_default());
        Self(lo, hi)
    }

    /// Builds a root seed directly from two 64-bit words.
    #[must_use]
    pub fn from_words(lo: u64, hi: u64) -> Self {
        Self(lo, hi)
    }

    /// Derives a deterministic child [`Prng`] for the named subsystem.
    ///
    /// The same `label` always yields the same child sequence for a given
    /// root seed; different labels yield independent sequences.
    #[must_use]
    pub fn derive(&self, label: &str) -> Prng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.0.to_le_bytes());
        hasher.update(&self.1.to_le_bytes());
        hasher.update(label.as_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();
        let lo = u64::from_le_bytes(bytes[0..8].try_into().unwrap_or_default());
        let hi = u64::from_le_bytes(bytes[8..16].try_into().unwrap_or_default());
        Prng::from_seed(lo, hi)
    }
}
