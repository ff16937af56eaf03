//! Rolling hashes over a fixed-size sliding byte window.
//!
//! Both hashers are pure integer arithmetic. The prime, the substitution
//! table and the `u64` word width are part of the chunk boundary format:
//! changing any of them moves every boundary and defeats deduplication
//! against previously stored content.

/// Multiplier for the Rabin-Karp polynomial. Fixed; see module docs.
pub const RABIN_KARP_PRIME: u64 = 153_191;

/// Seed for the BuzHash substitution table generator. Fixed; see module docs.
const BUZHASH_SEED: u64 = 0x0123_4567_89AB_CDEF;

/// Substitution table for [`BuzHash`], generated at compile time.
pub static BUZHASH_TABLE: [u64; 256] = buzhash_table();

const fn buzhash_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut state = BUZHASH_SEED;
    let mut i = 0;
    while i < 256 {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        table[i] = state;
        i += 1;
    }
    table
}

/// Incremental hash over the last `window_size` bytes of input.
pub trait RollingHash {
    /// Reset the hasher to the given full window and return its hash.
    fn init(&mut self, window: &[u8]) -> u64;

    /// Slide the window by one byte: drop `outgoing`, append `incoming`.
    fn roll(&mut self, outgoing: u8, incoming: u8) -> u64;

    /// Current hash value.
    fn value(&self) -> u64;
}

/// Polynomial rolling hash, `Σ b[i]·P^(N-1-i)` modulo 2^64.
#[derive(Clone, Debug)]
pub struct RabinKarp {
    hash: u64,
    /// `P^N`, computed once per [`init`](RollingHash::init).
    pow_n: u64,
}

impl RabinKarp {
    pub fn new() -> Self {
        Self { hash: 0, pow_n: 1 }
    }
}

impl Default for RabinKarp {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash for RabinKarp {
    fn init(&mut self, window: &[u8]) -> u64 {
        let mut hash = 0u64;
        let mut pow_n = 1u64;
        for &byte in window {
            hash = hash.wrapping_mul(RABIN_KARP_PRIME).wrapping_add(byte as u64);
            pow_n = pow_n.wrapping_mul(RABIN_KARP_PRIME);
        }
        self.hash = hash;
        self.pow_n = pow_n;
        hash
    }

    fn roll(&mut self, outgoing: u8, incoming: u8) -> u64 {
        self.hash = self
            .hash
            .wrapping_mul(RABIN_KARP_PRIME)
            .wrapping_sub(self.pow_n.wrapping_mul(outgoing as u64))
            .wrapping_add(incoming as u64);
        self.hash
    }

    fn value(&self) -> u64 {
        self.hash
    }
}

/// Table-driven cyclic polynomial hash.
///
/// `hash' = rotl(hash, 1) ^ rotl(T[outgoing], N) ^ T[incoming]`. The byte
/// leaving the window has been rotated once per byte that followed it, so
/// its contribution is removed at rotation offset `N`.
#[derive(Clone, Debug)]
pub struct BuzHash {
    hash: u64,
    window_size: u32,
}

impl BuzHash {
    pub fn new() -> Self {
        Self {
            hash: 0,
            window_size: 0,
        }
    }
}

impl Default for BuzHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash for BuzHash {
    fn init(&mut self, window: &[u8]) -> u64 {
        let mut hash = 0u64;
        for &byte in window {
            hash = hash.rotate_left(1) ^ BUZHASH_TABLE[byte as usize];
        }
        self.hash = hash;
        self.window_size = window.len() as u32;
        hash
    }

    fn roll(&mut self, outgoing: u8, incoming: u8) -> u64 {
        self.hash = self.hash.rotate_left(1)
            ^ BUZHASH_TABLE[outgoing as usize].rotate_left(self.window_size)
            ^ BUZHASH_TABLE[incoming as usize];
        self.hash
    }

    fn value(&self) -> u64 {
        self.hash
    }
}
