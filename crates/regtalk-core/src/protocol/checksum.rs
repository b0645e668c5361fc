//! CRC-16 over 16-bit words
//!
//! Reflected CRC-16 with polynomial `0x8408` (bit-reversed `0x1021`) and seed
//! `0xFFFF`. Each word is folded in whole and then shifted through 16 rounds,
//! so the result depends on word values rather than on their byte order on
//! the wire.

/// Initial CRC register value
pub const SEED: u16 = 0xFFFF;

/// Reflected polynomial
pub const POLY: u16 = 0x8408;

/// Compute the CRC of a sequence of words.
pub fn compute(words: &[u16]) -> u16 {
    words.iter().fold(SEED, |crc, &word| {
        let mut crc = crc ^ word;
        for _ in 0..16 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
        crc
    })
}

/// Check `words` against an expected CRC.
pub fn verify(words: &[u16], expected: u16) -> bool {
    compute(words) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_seed() {
        assert_eq!(compute(&[]), 0xFFFF);
    }

    #[test]
    fn test_golden_value() {
        assert_eq!(compute(&[0xAA55, 0x0001, 0x1000, 0x0000]), 0x5813);
    }

    #[test]
    fn test_deterministic() {
        let words = [0xAA55, 0x0001, 0x9000, 0xABCD];
        assert_eq!(compute(&words), compute(&words));
        assert_eq!(compute(&words), 0x35F4);
    }

    #[test]
    fn test_verify() {
        let words = [0xAA55, 0x0001, 0x1000, 0x0000];
        assert!(verify(&words, 0x5813));
        assert!(!verify(&words, 0x5812));
    }

    #[test]
    fn test_word_order_matters() {
        assert_ne!(compute(&[0x0001, 0x0002]), compute(&[0x0002, 0x0001]));
    }
}
