use solana_pubkey::Pubkey;

/// Errors raised on the settlement path.
///
/// Every failure aborts the whole operation before the first write, so
/// ledger state after an error is exactly what it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid payment amount")]
    InvalidAmount,

    #[error("Combined fee and tithe rates exceed 10000 bps")]
    InvalidRate,

    #[error("Payment ID exceeds {0} bytes")]
    PaymentIdTooLong(usize),

    #[error("Escrow balance {available} is less than the payment amount {required}")]
    InsufficientEscrowBalance { available: u64, required: u64 },

    #[error("Payment '{0}' is already settled")]
    DuplicatePayment(String),

    #[error("Facilitator config is already initialized")]
    AlreadyInitialized,

    #[error("Caller is not the config authority")]
    Unauthorized,

    #[error("Account {0} not found on the ledger")]
    AccountNotFound(Pubkey),

    #[error("Account {0} holds the wrong token mint")]
    MintMismatch(Pubkey),

    #[error("Account address already in use")]
    AccountInUse,

    #[error("No receipt exists for payment '{0}'")]
    ReceiptNotFound(String),

    #[error("Facilitator config is not initialized")]
    ConfigNotFound,

    #[error("Arithmetic overflow")]
    MathOverflow,

    #[error("Could not derive an off-curve address")]
    AddressDerivation,

    #[error("Corrupt on-ledger record: {0}")]
    CorruptRecord(&'static str),

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
