use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

uuid_id!(
    /// Storage-assigned identifier of an account.
    AccountId,
    "account id"
);

uuid_id!(
    /// Internal identifier of the user owning accounts.
    OwnerId,
    "owner id"
);

/// Currencies an account can be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Rub,
    Egp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Rub => "RUB",
            Self::Egp => "EGP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "RUB" => Ok(Self::Rub),
            "EGP" => Ok(Self::Egp),
            _ => Err(WalletError::invalid(format!("unsupported currency `{s}`"))),
        }
    }
}

/// A strictly positive monetary amount carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(WalletError::invalid("amount must be positive"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = WalletError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Funds held by an account. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(WalletError::invalid("balance cannot be negative"));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Fails rather than overflow the decimal range.
    pub fn credit(self, amount: Amount) -> Result<Self> {
        self.0
            .checked_add(amount.value())
            .map(Self)
            .ok_or_else(|| WalletError::invalid("balance overflow"))
    }

    pub fn debit(self, amount: Amount) -> Result<Self> {
        if self.covers(amount) {
            self.0
                .checked_sub(amount.value())
                .map(Self)
                .ok_or_else(|| WalletError::invalid("balance overflow"))
        } else {
            Err(WalletError::InsufficientFunds {
                requested: amount.value(),
                available: self.0,
            })
        }
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = WalletError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// A balance-bearing ledger entry in a single currency.
///
/// The currency and owner are fixed at creation; the balance only moves
/// through [`Account::deposit`] and [`Account::withdraw`], which storage
/// invokes inside a unit of work.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub owner: OwnerId,
    pub name: String,
    pub currency: Currency,
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh, empty account. The id is assigned here and kept by storage.
    pub fn open(owner: OwnerId, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            id: AccountId::new(),
            owner,
            name: name.into(),
            currency,
            balance: Balance::ZERO,
            created_at: Utc::now(),
        }
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.balance.credit(amount)?;
        Ok(())
    }

    /// Withdraws `amount`, leaving the balance untouched when it does not cover it.
    pub fn withdraw(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.balance.debit(amount)?;
        Ok(())
    }

    pub fn ensure_owned_by(&self, owner: OwnerId) -> Result<()> {
        if self.owner == owner {
            Ok(())
        } else {
            Err(WalletError::Forbidden(format!(
                "account {} belongs to another user",
                self.id
            )))
        }
    }

    pub fn ensure_covers(&self, amount: Amount) -> Result<()> {
        self.balance.debit(amount).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(WalletError::InvalidArgument(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(WalletError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_balance_rejects_negative_values() {
        assert!(Balance::new(dec!(-0.01)).is_err());
        assert_eq!(Balance::new(dec!(0)).unwrap(), Balance::ZERO);
        let parsed: std::result::Result<Balance, _> = serde_json::from_str("\"-5\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_account_deposit() {
        let mut account = Account::open(OwnerId::new(), "main", Currency::Usd);
        account.deposit(amount(dec!(10.0))).unwrap();
        assert_eq!(account.balance.value(), dec!(10.0));
    }

    #[test]
    fn test_account_withdraw_success() {
        let mut account = Account::open(OwnerId::new(), "main", Currency::Usd);
        account.deposit(amount(dec!(10.0))).unwrap();

        account.withdraw(amount(dec!(4.0))).unwrap();
        assert_eq!(account.balance.value(), dec!(6.0));
    }

    #[test]
    fn test_account_withdraw_insufficient() {
        let mut account = Account::open(OwnerId::new(), "main", Currency::Usd);
        account.deposit(amount(dec!(10.0))).unwrap();

        let result = account.withdraw(amount(dec!(20.0)));
        assert!(matches!(
            result,
            Err(WalletError::InsufficientFunds { requested, available })
                if requested == dec!(20.0) && available == dec!(10.0)
        ));
        assert_eq!(account.balance.value(), dec!(10.0));
    }

    #[test]
    fn test_withdraw_entire_balance_reaches_zero() {
        let mut account = Account::open(OwnerId::new(), "main", Currency::Usd);
        account.deposit(amount(dec!(7.5))).unwrap();
        account.withdraw(amount(dec!(7.5))).unwrap();
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_deposit_past_decimal_range_is_rejected() {
        let mut account = Account::open(OwnerId::new(), "main", Currency::Usd);
        account.deposit(amount(Decimal::MAX)).unwrap();

        let err = account.deposit(amount(dec!(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(account.balance.value(), Decimal::MAX);
    }

    #[test]
    fn test_ownership_check() {
        let owner = OwnerId::new();
        let account = Account::open(owner, "main", Currency::Eur);
        assert!(account.ensure_owned_by(owner).is_ok());
        let err = account.ensure_owned_by(OwnerId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" EGP ".parse::<Currency>().unwrap(), Currency::Egp);
        assert!("JPY".parse::<Currency>().is_err());
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
    }
}
