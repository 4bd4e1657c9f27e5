//! Exact three-way division of a gross payment into seller, tithe and
//! protocol-fee shares. Integer arithmetic only; the shares always sum
//! back to the gross amount.

use crate::errors::{Error, Result};

/// 10000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub tithe_amount: u64,
    pub fee_amount: u64,
    pub recipient_amount: u64,
}

/// Floor-divides the tithe and fee shares out of `gross_amount`; the
/// recipient takes the remainder, so no rounding dust is ever left over.
pub fn split(gross_amount: u64, fee_bps: u16, tithe_bps: u16) -> Result<Split> {
    if gross_amount == 0 {
        return Err(Error::InvalidAmount);
    }
    if u64::from(fee_bps) + u64::from(tithe_bps) > BPS_DENOMINATOR {
        return Err(Error::InvalidRate);
    }

    let tithe_amount = gross_amount
        .checked_mul(u64::from(tithe_bps))
        .ok_or(Error::MathOverflow)?
        / BPS_DENOMINATOR;
    let fee_amount = gross_amount
        .checked_mul(u64::from(fee_bps))
        .ok_or(Error::MathOverflow)?
        / BPS_DENOMINATOR;
    let recipient_amount = gross_amount
        .checked_sub(tithe_amount)
        .and_then(|rest| rest.checked_sub(fee_amount))
        .ok_or(Error::MathOverflow)?;

    Ok(Split {
        tithe_amount,
        fee_amount,
        recipient_amount,
    })
}
