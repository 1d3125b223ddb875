use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Reasons a transaction, block or chain is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid amount (zero)")]
    InvalidAmount,

    #[error("Invalid hash")]
    InvalidHash,

    #[error("from wallet address is required")]
    MissingFromAddress,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Must have previous tx hash")]
    MissingPrevTxHash,

    #[error("Cannot generate hash: fromAddress, amount or prevTxHash missing")]
    UnsignableHash,

    #[error("Cannot verify this input: missing signature")]
    MissingSignature,

    #[error("Invalid tx input signature")]
    InvalidSignature,

    #[error("Invalid hash (empty)")]
    EmptyHash,

    #[error("Invalid tx output: owner tx hash {found} does not match {expected}")]
    OutputMisattributed { expected: String, found: String },

    #[error("Invalid tx due to inputs/outputs: {0}")]
    InvalidTransaction(String),

    #[error("Invalid fee tx: fee transactions have no inputs")]
    FeeTransactionWithInputs,

    #[error("Invalid transaction(s): {0}")]
    InvalidTransactions(String),

    #[error("Invalid block: no transactions")]
    EmptyTransactions,

    #[error("Invalid block: missing fee transaction")]
    MissingFeeTransaction,

    #[error("Invalid block: too many fee transactions")]
    MultipleFeeTransactions,

    #[error("Invalid fee transaction: different from miner")]
    FeeMismatch,

    #[error("Invalid index")]
    InvalidIndex,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Invalid previous hash")]
    InvalidPreviousHash,

    #[error("Not mined")]
    NotMined,

    #[error("Invalid proof of work")]
    InvalidProofOfWork,

    #[error("There is no next block info")]
    NoOutstandingTemplate,

    #[error("The block must contain the next block info transactions")]
    MissingTransactions,

    #[error("The block contains unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("The block contains transaction {0} more than once")]
    DuplicateTransaction(String),

    #[error("Transaction {0} was already submitted")]
    TransactionExists(String),

    #[error("This wallet has a pending transaction")]
    PendingTransactionExists,

    #[error("Fee transactions are created by miners only")]
    UnexpectedFeeTransaction,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("invalid block #{index}: {reason}")]
    InvalidBlock { index: u64, reason: Box<ValidationError> },
}

/// Uniform `{success, message}` outcome handed to callers outside the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Validation {
    pub success: bool,
    pub message: String,
}

impl Validation {
    pub fn ok(message: impl Into<String>) -> Self {
        Validation {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(error: &ValidationError) -> Self {
        Validation {
            success: false,
            message: error.to_string(),
        }
    }
}

impl From<Result<String, ValidationError>> for Validation {
    fn from(result: Result<String, ValidationError>) -> Self {
        match result {
            Ok(message) => Validation::ok(message),
            Err(err) => Validation::failed(&err),
        }
    }
}

impl From<Result<(), ValidationError>> for Validation {
    fn from(result: Result<(), ValidationError>) -> Self {
        result.map(|_| String::new()).into()
    }
}

/// Joins the messages of several failures into one
pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_from_result() {
        let ok: Validation = Ok::<_, ValidationError>("abc".to_string()).into();
        assert!(ok.success);
        assert_eq!(ok.message, "abc");

        let empty: Validation = Ok::<(), ValidationError>(()).into();
        assert!(empty.success);
        assert!(empty.message.is_empty());

        let failed: Validation = Err::<String, _>(ValidationError::InvalidIndex).into();
        assert!(!failed.success);
        assert_eq!(failed.message, "Invalid index");
    }

    #[test]
    fn test_nested_block_error_message() {
        let err = ValidationError::InvalidBlock {
            index: 3,
            reason: Box::new(ValidationError::InvalidPreviousHash),
        };
        assert_eq!(err.to_string(), "invalid block #3: Invalid previous hash");
    }
}
