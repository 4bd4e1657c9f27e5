//! Deterministic derivation of the facilitator's ledger addresses.
//!
//! A derived address is the first SHA-256 digest of the seeds, a bump
//! nonce and the program namespace that is not a valid ed25519 point.
//! No private key can exist for such an address, so transfers out of it
//! can only be authorized by logic holding the derivation proof.

use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use solana_pubkey::{Pubkey, pubkey};

/// Namespace that owns the facilitator's derived accounts.
pub const FACILITATOR_PROGRAM_ID: Pubkey = pubkey!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

pub const CONFIG_SEED: &[u8] = b"config";
pub const ESCROW_SEED: &[u8] = b"escrow";
pub const PAYMENT_SEED: &[u8] = b"payment";

const DERIVED_ADDRESS_TAG: &[u8] = b"FacilitatorDerivedAddress";
const TOKEN_ACCOUNT_TAG: &[u8] = b"FacilitatorTokenAccount";

/// Derives an address with no discoverable private key, together with
/// the bump nonce that produced it.
///
/// Searches bumps 255 down to 0 and keeps the first digest that fails
/// ed25519 point decompression. Returns `None` in the (cryptographically
/// negligible) case that every bump lands on the curve.
pub fn try_derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.as_ref());
        hasher.update(DERIVED_ADDRESS_TAG);
        let digest: [u8; 32] = hasher.finalize().into();
        if VerifyingKey::from_bytes(&digest).is_err() {
            return Some((Pubkey::new_from_array(digest), bump));
        }
    }
    None
}

/// The singleton configuration record address.
pub fn config_address(program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    try_derive_address(&[CONFIG_SEED], program_id)
}

/// The non-signing escrow authority.
pub fn escrow_authority(program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    try_derive_address(&[ESCROW_SEED], program_id)
}

/// The receipt address for one payment id. Distinct payment ids map to
/// distinct addresses; re-deriving for an already-settled id targets the
/// same address and the ledger refuses to recreate it.
pub fn payment_receipt_address(payment_id: &str, program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    try_derive_address(&[PAYMENT_SEED, payment_id.as_bytes()], program_id)
}

/// The token account held by `owner` for `mint`. This derivation has no
/// off-curve requirement; it only needs to be stable.
pub fn token_account_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_ref());
    hasher.update(mint.as_ref());
    hasher.update(TOKEN_ACCOUNT_TAG);
    Pubkey::new_from_array(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = payment_receipt_address("pay-001", &FACILITATOR_PROGRAM_ID).unwrap();
        let b = payment_receipt_address("pay-001", &FACILITATOR_PROGRAM_ID).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_payment_ids_do_not_collide() {
        let a = payment_receipt_address("pay-001", &FACILITATOR_PROGRAM_ID).unwrap();
        let b = payment_receipt_address("pay-002", &FACILITATOR_PROGRAM_ID).unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_roles_do_not_collide() {
        let config = config_address(&FACILITATOR_PROGRAM_ID).unwrap().0;
        let escrow = escrow_authority(&FACILITATOR_PROGRAM_ID).unwrap().0;
        assert_ne!(config, escrow);
    }

    #[test]
    fn test_derived_address_is_off_curve() {
        let (address, _) = escrow_authority(&FACILITATOR_PROGRAM_ID).unwrap();
        assert!(VerifyingKey::from_bytes(&address.to_bytes()).is_err());
    }

    #[test]
    fn test_token_account_depends_on_owner_and_mint() {
        let owner = Pubkey::new_from_array([1; 32]);
        let other = Pubkey::new_from_array([2; 32]);
        let mint = Pubkey::new_from_array([3; 32]);
        assert_eq!(
            token_account_address(&owner, &mint),
            token_account_address(&owner, &mint)
        );
        assert_ne!(
            token_account_address(&owner, &mint),
            token_account_address(&other, &mint)
        );
    }
}
