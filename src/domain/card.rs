use super::account::AccountId;
use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CARD_NUMBER_LEN: usize = 16;

/// A 16-digit card number carrying a valid Luhn check digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != CARD_NUMBER_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::invalid(format!(
                "card number must be {CARD_NUMBER_LEN} digits"
            )));
        }
        if luhn_sum(digits.bytes().map(|b| b - b'0')) % 10 != 0 {
            return Err(WalletError::invalid("card number fails checksum"));
        }
        Ok(Self(digits))
    }

    /// Completes a 15-digit payload with its check digit.
    pub fn from_payload(payload: [u8; CARD_NUMBER_LEN - 1]) -> Self {
        let partial = luhn_sum(payload.iter().copied().chain(std::iter::once(0)));
        let check = (10 - partial % 10) % 10;
        let digits = payload
            .iter()
            .chain(std::iter::once(&(check as u8)))
            .map(|d| char::from(b'0' + d % 10))
            .collect();
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, the only part that ends up in logs.
    pub fn masked(&self) -> String {
        format!("****{}", &self.0[CARD_NUMBER_LEN - 4..])
    }
}

/// Luhn sum over digits given most significant first.
fn luhn_sum(digits: impl DoubleEndedIterator<Item = u8>) -> u32 {
    digits
        .rev()
        .enumerate()
        .map(|(i, d)| {
            let d = u32::from(d);
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}

impl TryFrom<String> for CardNumber {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CardNumber> for String {
    fn from(number: CardNumber) -> Self {
        number.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handle that resolves to an account when initiating transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub number: CardNumber,
    pub account: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(number: CardNumber, account: AccountId) -> Self {
        Self {
            number,
            account,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_valid_numbers() {
        let number = CardNumber::parse("4111 1111 1111 1111").unwrap();
        assert_eq!(number.as_str(), "4111111111111111");
        assert_eq!(number.masked(), "****1111");
    }

    #[test]
    fn test_parse_rejects_bad_checksum_and_shape() {
        assert!(CardNumber::parse("4111111111111112").is_err());
        assert!(CardNumber::parse("411111111111111").is_err());
        assert!(CardNumber::parse("41111111111111a1").is_err());
        assert!(CardNumber::parse("").is_err());
    }

    #[test]
    fn test_from_payload_produces_parseable_number() {
        let number = CardNumber::from_payload([4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(number.as_str(), "4111111111111111");

        let other = CardNumber::from_payload([5, 5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(CardNumber::parse(other.as_str()).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: CardNumber = serde_json::from_str("\"4111111111111111\"").unwrap();
        assert_eq!(ok.as_str(), "4111111111111111");
        assert!(serde_json::from_str::<CardNumber>("\"1234\"").is_err());
    }
}
