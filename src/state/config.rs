use solana_pubkey::Pubkey;

use crate::{
    errors::{Error, Result},
    state::{read_pubkey, read_u8, read_u16, read_u64},
};

pub const CONFIG_DISCRIMINATOR: [u8; 8] = *b"fac:conf";

/// Singleton governance record for one facilitator deployment.
///
/// Created once by `initialize`; mutated only by settlement (the running
/// aggregates) and by authority-gated updates. Never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilitatorConfig {
    /// Identity allowed to change rates or hand over control.
    pub authority: Pubkey,
    /// Destination identity for the tithe share.
    pub impact_treasury: Pubkey,
    pub fee_bps: u16,
    pub tithe_bps: u16,
    /// Incremented exactly once per successful settlement.
    pub total_payments: u64,
    /// Running sum of gross settled amounts.
    pub total_volume: u64,
    /// Bump nonce of the config address derivation.
    pub bump: u8,
}

impl FacilitatorConfig {
    pub const LEN: usize = 8 + 32 + 32 + 2 + 2 + 8 + 8 + 1;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&CONFIG_DISCRIMINATOR);
        data.extend_from_slice(self.authority.as_ref());
        data.extend_from_slice(self.impact_treasury.as_ref());
        data.extend_from_slice(&self.fee_bps.to_le_bytes());
        data.extend_from_slice(&self.tithe_bps.to_le_bytes());
        data.extend_from_slice(&self.total_payments.to_le_bytes());
        data.extend_from_slice(&self.total_volume.to_le_bytes());
        data.push(self.bump);
        data
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(Error::CorruptRecord("config length mismatch"));
        }
        if data[..8] != CONFIG_DISCRIMINATOR {
            return Err(Error::CorruptRecord("config discriminator mismatch"));
        }
        Ok(FacilitatorConfig {
            authority: read_pubkey(data, 8)?,
            impact_treasury: read_pubkey(data, 40)?,
            fee_bps: read_u16(data, 72)?,
            tithe_bps: read_u16(data, 74)?,
            total_payments: read_u64(data, 76)?,
            total_volume: read_u64(data, 84)?,
            bump: read_u8(data, 92)?,
        })
    }
}
