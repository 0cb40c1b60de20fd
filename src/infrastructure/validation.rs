use crate::config::EngineConfig;
use crate::domain::account::{Amount, Currency};
use crate::domain::card::CardNumber;
use crate::domain::ports::Validator;
use crate::domain::request::{
    CreateTransactionRequest, OpenAccountCommand, OpenAccountRequest, RollbackRequest,
    TransactionCommand, TransactionOrder,
};
use crate::domain::transaction::{TransactionId, TransactionType};
use crate::error::{Result, WalletError};
use rust_decimal::Decimal;

/// Validates request records against limits taken from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct RuleValidator {
    min_amount: Decimal,
    max_scale: u32,
    max_name_len: usize,
}

impl RuleValidator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_amount: config.min_amount,
            max_scale: config.max_amount_scale,
            max_name_len: config.max_account_name_len,
        }
    }

    fn amount(&self, value: Decimal) -> Result<Amount> {
        let amount = Amount::new(value)?;
        if value < self.min_amount {
            return Err(WalletError::invalid(format!(
                "amount must be at least {}",
                self.min_amount
            )));
        }
        if value.normalize().scale() > self.max_scale {
            return Err(WalletError::invalid(format!(
                "amount allows at most {} decimal places",
                self.max_scale
            )));
        }
        Ok(amount)
    }
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Validator for RuleValidator {
    fn validate_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<TransactionCommand> {
        let amount = self.amount(request.amount)?;
        let transaction_type: TransactionType = request.transaction_type.parse()?;
        let from = CardNumber::parse(&request.from_card)?;

        let order = match (transaction_type, request.to_card.as_deref()) {
            (TransactionType::Transfer, Some(to)) => TransactionOrder::Transfer {
                from,
                to: CardNumber::parse(to)?,
            },
            (TransactionType::Transfer, None) => {
                return Err(WalletError::invalid("to_card is required for transfers"));
            }
            (TransactionType::Deposit, None) => TransactionOrder::Deposit { card: from },
            (TransactionType::Withdrawal, None) => TransactionOrder::Withdrawal { card: from },
            (TransactionType::Deposit | TransactionType::Withdrawal, Some(_)) => {
                return Err(WalletError::invalid(format!(
                    "to_card is not accepted for {transaction_type}"
                )));
            }
        };
        Ok(TransactionCommand { amount, order })
    }

    fn validate_rollback(&self, request: &RollbackRequest) -> Result<TransactionId> {
        request.transaction_id.parse()
    }

    fn validate_open_account(&self, request: &OpenAccountRequest) -> Result<OpenAccountCommand> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(WalletError::invalid("account name is required"));
        }
        if name.chars().count() > self.max_name_len {
            return Err(WalletError::invalid(format!(
                "account name exceeds {} characters",
                self.max_name_len
            )));
        }
        let currency: Currency = request.currency.parse()?;
        Ok(OpenAccountCommand {
            name: name.to_string(),
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CARD_A: &str = "4111111111111111";
    const CARD_B: &str = "5500000000000004";

    fn request(amount: Decimal, ty: &str, to: Option<&str>) -> CreateTransactionRequest {
        CreateTransactionRequest {
            amount,
            transaction_type: ty.to_string(),
            from_card: CARD_A.to_string(),
            to_card: to.map(str::to_string),
        }
    }

    #[test]
    fn test_valid_transfer() {
        let command = RuleValidator::default()
            .validate_transaction(&request(dec!(12.50), "transfer", Some(CARD_B)))
            .unwrap();
        assert_eq!(command.amount.value(), dec!(12.50));
        assert!(matches!(command.order, TransactionOrder::Transfer { .. }));
    }

    #[test]
    fn test_amount_rules() {
        let validator = RuleValidator::default();
        for amount in [dec!(0), dec!(-3), dec!(0.001), dec!(0.005)] {
            assert!(
                validator
                    .validate_transaction(&request(amount, "deposit", None))
                    .is_err(),
                "{amount} should be rejected"
            );
        }
        // Trailing zeros do not count towards the scale limit.
        assert!(
            validator
                .validate_transaction(&request(dec!(1.5000), "deposit", None))
                .is_ok()
        );
    }

    #[test]
    fn test_to_card_required_iff_transfer() {
        let validator = RuleValidator::default();
        assert!(
            validator
                .validate_transaction(&request(dec!(1), "transfer", None))
                .is_err()
        );
        assert!(
            validator
                .validate_transaction(&request(dec!(1), "deposit", Some(CARD_B)))
                .is_err()
        );
        assert!(
            validator
                .validate_transaction(&request(dec!(1), "withdrawal", None))
                .is_ok()
        );
    }

    #[test]
    fn test_unknown_type_and_bad_card() {
        let validator = RuleValidator::default();
        assert!(
            validator
                .validate_transaction(&request(dec!(1), "chargeback", None))
                .is_err()
        );
        let mut bad_card = request(dec!(1), "deposit", None);
        bad_card.from_card = "1234".to_string();
        assert!(validator.validate_transaction(&bad_card).is_err());
    }

    #[test]
    fn test_rollback_id_must_be_uuid() {
        let validator = RuleValidator::default();
        assert!(
            validator
                .validate_rollback(&RollbackRequest::new("not-a-uuid"))
                .is_err()
        );
        let id = TransactionId::new();
        assert_eq!(
            validator
                .validate_rollback(&RollbackRequest::new(id))
                .unwrap(),
            id
        );
    }

    #[test]
    fn test_open_account_rules() {
        let validator = RuleValidator::default();
        let ok = validator
            .validate_open_account(&OpenAccountRequest::new("  savings ", "eur"))
            .unwrap();
        assert_eq!(ok.name, "savings");
        assert_eq!(ok.currency, Currency::Eur);
        assert!(
            validator
                .validate_open_account(&OpenAccountRequest::new("", "USD"))
                .is_err()
        );
        assert!(
            validator
                .validate_open_account(&OpenAccountRequest::new("x".repeat(65), "USD"))
                .is_err()
        );
        assert!(
            validator
                .validate_open_account(&OpenAccountRequest::new("main", "BTC"))
                .is_err()
        );
    }
}
