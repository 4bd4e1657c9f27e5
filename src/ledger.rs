//! In-process stand-in for the settlement network's ledger.
//!
//! Token accounts and typed records live behind one mutex; an engine
//! operation takes the guard once, validates everything, and only then
//! writes, so concurrent settlements serialize on the shared escrow
//! balance and a record-creation race resolves to exactly one winner.

use std::collections::HashMap;

use parking_lot::Mutex;
use solana_pubkey::Pubkey;

use crate::errors::{Error, Result};

/// A fungible token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub balance: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    token_accounts: HashMap<Pubkey, TokenAccount>,
    records: HashMap<Pubkey, Vec<u8>>,
}

impl LedgerState {
    pub(crate) fn token_account(&self, address: &Pubkey) -> Result<TokenAccount> {
        self.token_accounts
            .get(address)
            .copied()
            .ok_or(Error::AccountNotFound(*address))
    }

    pub(crate) fn record(&self, address: &Pubkey) -> Option<&[u8]> {
        self.records.get(address).map(Vec::as_slice)
    }

    /// Insert-if-absent. An existing account at `address` is a hard
    /// conflict, never an overwrite.
    pub(crate) fn create_record(&mut self, address: Pubkey, data: Vec<u8>) -> Result<()> {
        if self.records.contains_key(&address) {
            return Err(Error::AccountInUse);
        }
        self.records.insert(address, data);
        Ok(())
    }

    /// Overwrites an existing record in place.
    pub(crate) fn write_record(&mut self, address: Pubkey, data: Vec<u8>) {
        self.records.insert(address, data);
    }

    pub(crate) fn put_token_account(&mut self, address: Pubkey, account: TokenAccount) {
        self.token_accounts.insert(address, account);
    }
}

/// Shared atomic-commit key/value ledger.
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn create_token_account(&self, address: Pubkey, mint: Pubkey, owner: Pubkey) -> Result<()> {
        let mut state = self.state.lock();
        if state.token_accounts.contains_key(&address) {
            return Err(Error::AccountInUse);
        }
        state.put_token_account(
            address,
            TokenAccount {
                mint,
                owner,
                balance: 0,
            },
        );
        Ok(())
    }

    /// Credits freshly minted tokens to an existing account.
    pub fn mint_to(&self, address: &Pubkey, amount: u64) -> Result<()> {
        let mut state = self.state.lock();
        let mut account = state.token_account(address)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(Error::MathOverflow)?;
        state.put_token_account(*address, account);
        Ok(())
    }

    pub fn balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.state.lock().token_account(address)?.balance)
    }

    pub fn token_account(&self, address: &Pubkey) -> Result<TokenAccount> {
        self.state.lock().token_account(address)
    }

    pub fn record(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.state.lock().record(address).map(<[u8]>::to_vec)
    }

    /// Runs `f` as one ledger transaction. The callback must validate
    /// completely before its first write; any `Err` it returns must
    /// leave the state untouched.
    pub(crate) fn transact<T>(&self, f: impl FnOnce(&mut LedgerState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        f(&mut state)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}
