use crate::NumberSet;
use lotto_core::config::{DRAWN_NUMBERS, MAX_NUMBER};
use lotto_core::Seed;
use sha2::{Digest, Sha256};

/// Derives the winning numbers of a round from an oracle seed.
///
/// Partial Fisher-Yates over `1..=90`: step `i` hashes `(seed, i)` with SHA-256,
/// reduces the digest into `i..90` and swaps that slot into position `i`. Swaps
/// never produce duplicates, so no rejection loop is needed, and the same seed
/// always yields the same set.
pub fn draw(seed: &Seed) -> NumberSet {
    let mut domain: [u8; MAX_NUMBER as usize] = std::array::from_fn(|i| i as u8 + 1);

    for i in 0..DRAWN_NUMBERS {
        let j = i + step_index(seed, i, domain.len() - i);
        domain.swap(i, j);
    }

    let mut drawn = NumberSet::new();
    for &n in &domain[..DRAWN_NUMBERS] {
        let added = drawn.add(n);
        debug_assert!(added.is_ok(), "swapped prefix holds distinct in-range values");
    }
    drawn
}

/// Uniform value in `0..bound` taken from `SHA-256(seed || step)`.
fn step_index(seed: &Seed, step: usize, bound: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update((step as u64).to_be_bytes());
    let digest = hasher.finalize();

    // digest as a big-endian 256-bit integer, reduced modulo `bound`
    let bound = bound as u64;
    let rem = digest
        .iter()
        .fold(0u64, |acc, &byte| (acc * 256 + u64::from(byte)) % bound);
    rem as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(byte: u8) -> Seed {
        Seed::from_bytes([byte; 32])
    }

    #[test]
    fn test_draw_is_deterministic() {
        for byte in 0..32u8 {
            assert_eq!(draw(&seed(byte)), draw(&seed(byte)));
        }
    }

    #[test]
    fn test_draws_six_distinct_in_range() {
        for byte in 0..=255u8 {
            let drawn = draw(&seed(byte));
            assert_eq!(drawn.size(), DRAWN_NUMBERS);
            assert!(drawn.iter().all(|n| (1..=90).contains(&n)));
        }
    }

    #[test]
    fn test_different_seeds_spread_over_domain() {
        let mut seen = NumberSet::new();
        for byte in 0..=255u8 {
            for n in draw(&seed(byte)).iter() {
                if !seen.contains(n) {
                    let _ = seen.add(n);
                }
            }
        }
        // 256 draws of 6 cover far more than a handful of the 90 numbers
        assert!(seen.size() > 60);
    }

    #[test]
    fn test_step_index_in_bounds() {
        for step in 0..DRAWN_NUMBERS {
            let bound = 90 - step;
            assert!(step_index(&seed(9), step, bound) < bound);
        }
    }
}
