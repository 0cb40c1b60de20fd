use crate::domain::card::{CARD_NUMBER_LEN, CardNumber};
use crate::domain::ports::CardNumberGenerator;
use rand::Rng;

/// Issuer prefix every generated number starts with.
const ISSUER_PREFIX: [u8; 2] = [2, 2];

/// Draws random Luhn-valid numbers under a fixed issuer prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCardNumbers;

impl CardNumberGenerator for RandomCardNumbers {
    fn generate(&self) -> CardNumber {
        let mut rng = rand::thread_rng();
        let mut payload = [0u8; CARD_NUMBER_LEN - 1];
        payload[..ISSUER_PREFIX.len()].copy_from_slice(&ISSUER_PREFIX);
        for digit in payload.iter_mut().skip(ISSUER_PREFIX.len()) {
            *digit = rng.gen_range(0..10);
        }
        CardNumber::from_payload(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_numbers_are_valid() {
        let generator = RandomCardNumbers;
        for _ in 0..100 {
            let number = generator.generate();
            assert!(CardNumber::parse(number.as_str()).is_ok());
            assert!(number.as_str().starts_with("22"));
        }
    }
}
