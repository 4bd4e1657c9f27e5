//! The facilitator's settlement engine.
//!
//! Every operation here runs as one ledger transaction: all
//! preconditions are checked against a consistent snapshot before the
//! first write, so a failed call leaves no partial effect.

use std::{collections::HashMap, sync::Arc};

use bon::Builder;
use chrono::Utc;
use sha2::{Digest, Sha256};
use solana_pubkey::Pubkey;
use solana_signature::Signature;

use crate::{
    address,
    errors::{Error, Result},
    ledger::{Ledger, LedgerState, TokenAccount},
    split::split,
    state::{FacilitatorConfig, MAX_PAYMENT_ID_LEN, PaymentReceipt},
};

/// Parameters for one settlement attempt.
#[derive(Builder, Debug, Clone)]
pub struct SettleParams {
    /// Caller-supplied unique identifier; the idempotency key.
    #[builder(into)]
    pub payment_id: String,
    /// Gross amount in smallest token units.
    pub amount: u64,
    /// Recipient identity for the seller share.
    pub seller: Pubkey,
    /// Payer identity, when the caller tracks one.
    pub buyer: Option<Pubkey>,
    /// Destination identity for the protocol fee.
    pub protocol_treasury: Pubkey,
}

/// Authority-gated configuration update. Unset fields keep their value.
#[derive(Builder, Debug, Clone, Copy, Default)]
pub struct RateUpdate {
    pub fee_bps: Option<u16>,
    pub tithe_bps: Option<u16>,
    pub impact_treasury: Option<Pubkey>,
}

pub struct SettlementEngine {
    ledger: Arc<Ledger>,
    program_id: Pubkey,
    mint: Pubkey,
    config_address: Pubkey,
    config_bump: u8,
    escrow_authority: Pubkey,
    escrow_token_account: Pubkey,
}

impl SettlementEngine {
    /// Binds an engine to a ledger and token mint, deriving the config
    /// and escrow addresses and creating the escrow token account if it
    /// does not exist yet.
    pub fn new(ledger: Arc<Ledger>, mint: Pubkey) -> Result<Self> {
        Self::with_program_id(ledger, mint, address::FACILITATOR_PROGRAM_ID)
    }

    pub fn with_program_id(ledger: Arc<Ledger>, mint: Pubkey, program_id: Pubkey) -> Result<Self> {
        let (config_address, config_bump) =
            address::config_address(&program_id).ok_or(Error::AddressDerivation)?;
        let (escrow_authority, _) =
            address::escrow_authority(&program_id).ok_or(Error::AddressDerivation)?;
        let escrow_token_account = address::token_account_address(&escrow_authority, &mint);

        match ledger.create_token_account(escrow_token_account, mint, escrow_authority) {
            Ok(()) | Err(Error::AccountInUse) => {}
            Err(err) => return Err(err),
        }

        Ok(SettlementEngine {
            ledger,
            program_id,
            mint,
            config_address,
            config_bump,
            escrow_authority,
            escrow_token_account,
        })
    }

    /// Creates the singleton config record. Re-invocation fails with
    /// `AlreadyInitialized` and changes nothing.
    pub fn initialize(
        &self,
        authority: Pubkey,
        impact_treasury: Pubkey,
        fee_bps: u16,
        tithe_bps: u16,
    ) -> Result<()> {
        if u64::from(fee_bps) + u64::from(tithe_bps) > crate::split::BPS_DENOMINATOR {
            return Err(Error::InvalidRate);
        }

        let config = FacilitatorConfig {
            authority,
            impact_treasury,
            fee_bps,
            tithe_bps,
            total_payments: 0,
            total_volume: 0,
            bump: self.config_bump,
        };

        self.ledger.transact(|state| {
            state
                .create_record(self.config_address, config.to_bytes())
                .map_err(|err| match err {
                    Error::AccountInUse => Error::AlreadyInitialized,
                    other => other,
                })
        })?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Facilitator initialized: tithe={} bps, fee={} bps, impact_treasury={}",
            tithe_bps,
            fee_bps,
            impact_treasury,
        );

        Ok(())
    }

    /// Settles one payment out of escrow into the three-way split and
    /// writes the receipt. Callable by anyone; the split is fixed by the
    /// config, so settlement is mechanical rather than governed.
    pub fn settle_payment(&self, params: SettleParams) -> Result<Signature> {
        if params.amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if params.payment_id.len() > MAX_PAYMENT_ID_LEN {
            return Err(Error::PaymentIdTooLong(MAX_PAYMENT_ID_LEN));
        }

        let (receipt_address, _) =
            address::payment_receipt_address(&params.payment_id, &self.program_id)
                .ok_or(Error::AddressDerivation)?;

        let receipt = self.ledger.transact(|state| {
            // Validation phase: no writes until every check has passed.
            if state.record(&receipt_address).is_some() {
                return Err(Error::DuplicatePayment(params.payment_id.clone()));
            }

            let config_bytes = state
                .record(&self.config_address)
                .ok_or(Error::ConfigNotFound)?;
            let mut config = FacilitatorConfig::from_bytes(config_bytes)?;

            let shares = split(params.amount, config.fee_bps, config.tithe_bps)?;

            let escrow = state.token_account(&self.escrow_token_account)?;
            if escrow.balance < params.amount {
                return Err(Error::InsufficientEscrowBalance {
                    available: escrow.balance,
                    required: params.amount,
                });
            }

            let mut staged: HashMap<Pubkey, TokenAccount> = HashMap::new();
            debit(
                state,
                &mut staged,
                &self.escrow_token_account,
                &self.mint,
                params.amount,
            )?;
            credit(
                state,
                &mut staged,
                &params.seller,
                &self.mint,
                shares.recipient_amount,
            )?;
            credit(
                state,
                &mut staged,
                &config.impact_treasury,
                &self.mint,
                shares.tithe_amount,
            )?;
            credit(
                state,
                &mut staged,
                &params.protocol_treasury,
                &self.mint,
                shares.fee_amount,
            )?;

            config.total_payments = config
                .total_payments
                .checked_add(1)
                .ok_or(Error::MathOverflow)?;
            config.total_volume = config
                .total_volume
                .checked_add(params.amount)
                .ok_or(Error::MathOverflow)?;

            let receipt = PaymentReceipt {
                payment_id: params.payment_id.clone(),
                amount: params.amount,
                seller: params.seller,
                buyer: params.buyer.unwrap_or_default(),
                tithe_amount: shares.tithe_amount,
                fee_amount: shares.fee_amount,
                timestamp: Utc::now().timestamp(),
                settled: true,
            };

            // Commit phase: plain inserts only, nothing left to fail.
            for (account_address, account) in staged {
                state.put_token_account(account_address, account);
            }
            state.create_record(receipt_address, receipt.to_bytes())?;
            state.write_record(self.config_address, config.to_bytes());

            Ok(receipt)
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Payment settled: id='{}', seller={}, recipient_amount={}, tithe={}, fee={}",
            receipt.payment_id,
            receipt.seller,
            receipt.amount - receipt.tithe_amount - receipt.fee_amount,
            receipt.tithe_amount,
            receipt.fee_amount,
        );

        Ok(settlement_signature(&receipt.payment_id))
    }

    /// Updates rates and/or the tithe destination. The caller must be
    /// the current config authority.
    pub fn update_rates(&self, authority: Pubkey, update: RateUpdate) -> Result<()> {
        self.ledger.transact(|state| {
            let config_bytes = state
                .record(&self.config_address)
                .ok_or(Error::ConfigNotFound)?;
            let mut config = FacilitatorConfig::from_bytes(config_bytes)?;

            if config.authority != authority {
                return Err(Error::Unauthorized);
            }

            let fee_bps = update.fee_bps.unwrap_or(config.fee_bps);
            let tithe_bps = update.tithe_bps.unwrap_or(config.tithe_bps);
            if u64::from(fee_bps) + u64::from(tithe_bps) > crate::split::BPS_DENOMINATOR {
                return Err(Error::InvalidRate);
            }

            config.fee_bps = fee_bps;
            config.tithe_bps = tithe_bps;
            if let Some(impact_treasury) = update.impact_treasury {
                config.impact_treasury = impact_treasury;
            }

            state.write_record(self.config_address, config.to_bytes());
            Ok(())
        })
    }

    /// Hands the config over to a new authority.
    pub fn transfer_authority(&self, current: Pubkey, new_authority: Pubkey) -> Result<()> {
        self.ledger.transact(|state| {
            let config_bytes = state
                .record(&self.config_address)
                .ok_or(Error::ConfigNotFound)?;
            let mut config = FacilitatorConfig::from_bytes(config_bytes)?;

            if config.authority != current {
                return Err(Error::Unauthorized);
            }

            config.authority = new_authority;
            state.write_record(self.config_address, config.to_bytes());
            Ok(())
        })
    }

    pub fn config(&self) -> Result<FacilitatorConfig> {
        let bytes = self
            .ledger
            .record(&self.config_address)
            .ok_or(Error::ConfigNotFound)?;
        FacilitatorConfig::from_bytes(&bytes)
    }

    pub fn is_settled(&self, payment_id: &str) -> bool {
        self.receipt(payment_id).is_ok()
    }

    pub fn receipt(&self, payment_id: &str) -> Result<PaymentReceipt> {
        let (receipt_address, _) = address::payment_receipt_address(payment_id, &self.program_id)
            .ok_or(Error::AddressDerivation)?;
        let bytes = self
            .ledger
            .record(&receipt_address)
            .ok_or_else(|| Error::ReceiptNotFound(payment_id.to_string()))?;
        PaymentReceipt::from_bytes(&bytes)
    }

    pub fn escrow_authority(&self) -> Pubkey {
        self.escrow_authority
    }

    /// Address of the pre-funded escrow token account.
    pub fn escrow_token_account(&self) -> Pubkey {
        self.escrow_token_account
    }

    pub fn escrow_balance(&self) -> Result<u64> {
        self.ledger.balance(&self.escrow_token_account)
    }
}

/// Stages a debit without touching the ledger. Reads through earlier
/// staged writes so repeated addresses accumulate correctly.
fn debit(
    state: &LedgerState,
    staged: &mut HashMap<Pubkey, TokenAccount>,
    account_address: &Pubkey,
    mint: &Pubkey,
    amount: u64,
) -> Result<()> {
    let mut account = staged_account(state, staged, account_address, mint)?;
    account.balance = account
        .balance
        .checked_sub(amount)
        .ok_or(Error::MathOverflow)?;
    staged.insert(*account_address, account);
    Ok(())
}

/// Stages a credit towards `owner`'s token account for `mint`, creating
/// the account if it does not exist yet.
fn credit(
    state: &LedgerState,
    staged: &mut HashMap<Pubkey, TokenAccount>,
    owner: &Pubkey,
    mint: &Pubkey,
    amount: u64,
) -> Result<()> {
    let account_address = address::token_account_address(owner, mint);
    let mut account = match staged.get(&account_address) {
        Some(account) => *account,
        None => state
            .token_account(&account_address)
            .unwrap_or(TokenAccount {
                mint: *mint,
                owner: *owner,
                balance: 0,
            }),
    };
    if account.mint != *mint {
        return Err(Error::MintMismatch(account_address));
    }
    account.balance = account
        .balance
        .checked_add(amount)
        .ok_or(Error::MathOverflow)?;
    staged.insert(account_address, account);
    Ok(())
}

fn staged_account(
    state: &LedgerState,
    staged: &HashMap<Pubkey, TokenAccount>,
    account_address: &Pubkey,
    mint: &Pubkey,
) -> Result<TokenAccount> {
    let account = match staged.get(account_address) {
        Some(account) => *account,
        None => state.token_account(account_address)?,
    };
    if account.mint != *mint {
        return Err(Error::MintMismatch(*account_address));
    }
    Ok(account)
}

/// Deterministic confirmation identifier for a settled payment.
pub(crate) fn settlement_signature(payment_id: &str) -> Signature {
    let mut bytes = [0u8; 64];
    let first: [u8; 32] = Sha256::new()
        .chain_update(b"x402-settlement-1")
        .chain_update(payment_id.as_bytes())
        .finalize()
        .into();
    let second: [u8; 32] = Sha256::new()
        .chain_update(b"x402-settlement-2")
        .chain_update(payment_id.as_bytes())
        .finalize()
        .into();
    bytes[..32].copy_from_slice(&first);
    bytes[32..].copy_from_slice(&second);
    Signature::from(bytes)
}
