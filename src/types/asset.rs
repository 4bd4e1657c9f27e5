use solana_pubkey::{Pubkey, pubkey};

/// The single fungible token a facilitator deployment settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub mint: Pubkey,
    pub decimals: u8,
    pub name: &'static str,
    pub symbol: &'static str,
}

pub const USDC_DEVNET: TokenInfo = TokenInfo {
    mint: pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    decimals: 6,
    name: "USD Coin",
    symbol: "USDC",
};

pub const USDC: TokenInfo = TokenInfo {
    mint: pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    decimals: 6,
    name: "USD Coin",
    symbol: "USDC",
};
