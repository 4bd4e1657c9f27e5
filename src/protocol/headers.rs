//! ASCII `key=value` header formats for the challenge and proof legs.
//!
//! Values are single tokens; parsers skip tokens without an `=` (such as
//! the leading `x402` / `x402-pay` marker) and ignore unknown keys.

use std::{fmt::Display, str::FromStr};

use bon::Builder;
use solana_pubkey::Pubkey;

use crate::{protocol::ProtocolError, types::TokenAmount};

pub const PROTOCOL_VERSION: &str = "0";
pub const SCHEME_PAY: &str = "pay";
pub const NETWORK_SOLANA: &str = "solana";

/// Header carrying the payment challenge on a 402 response.
pub const CHALLENGE_HEADER: &str = "x-payment-required";
/// Header carrying the client's proof of payment.
pub const PROOF_HEADER: &str = "x-402-pay";
/// Header carrying the gate's settlement summary on success.
pub const SETTLEMENT_HEADER: &str = "x-payment-response";

/// Structured payment challenge, as issued by a resource gate.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ChallengeHeader {
    #[builder(default = PROTOCOL_VERSION.to_string(), into)]
    pub version: String,
    #[builder(default = SCHEME_PAY.to_string(), into)]
    pub scheme: String,
    #[builder(default = NETWORK_SOLANA.to_string(), into)]
    pub network: String,
    #[builder(into)]
    pub max_amount: TokenAmount,
    #[builder(into)]
    pub resource: String,
    #[builder(into)]
    pub description: Option<String>,
    pub recipient: Option<Pubkey>,
}

impl Display for ChallengeHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x402 version={} scheme={} network={} x-solana-max_amount={} x-solana-resource={}",
            self.version, self.scheme, self.network, self.max_amount, self.resource
        )?;
        if let Some(description) = &self.description {
            write!(f, " x-solana-description={description}")?;
        }
        if let Some(recipient) = &self.recipient {
            write!(f, " recipient={recipient}")?;
        }
        Ok(())
    }
}

impl FromStr for ChallengeHeader {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params = parse_tokens(s);
        let require = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .ok_or(ProtocolError::InvalidChallenge)
        };
        let lookup = |keys: &[&str]| {
            params
                .iter()
                .find(|(k, _)| keys.contains(k))
                .map(|(_, v)| v.to_string())
        };

        let max_amount = lookup(&["x-solana-max_amount", "maxAmount"])
            .unwrap_or_else(|| "0".to_string())
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidChallenge)?;
        let recipient = match lookup(&["recipient"]) {
            Some(value) => Some(
                value
                    .parse::<Pubkey>()
                    .map_err(|_| ProtocolError::InvalidChallenge)?,
            ),
            None => None,
        };

        Ok(ChallengeHeader {
            version: require("version")?,
            scheme: require("scheme")?,
            network: require("network")?,
            max_amount: TokenAmount(max_amount),
            resource: lookup(&["x-solana-resource", "resource"]).unwrap_or_default(),
            description: lookup(&["x-solana-description", "description"]),
            recipient,
        })
    }
}

/// Proof of payment, presented by the client on the retried request.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ProofHeader {
    #[builder(default = PROTOCOL_VERSION.to_string(), into)]
    pub version: String,
    #[builder(default = SCHEME_PAY.to_string(), into)]
    pub scheme: String,
    #[builder(default = NETWORK_SOLANA.to_string(), into)]
    pub network: String,
    /// Confirmation identifier of the submitted transfer.
    #[builder(into)]
    pub transaction_hash: String,
    /// Idempotency key of the settlement the gate should look up.
    #[builder(into)]
    pub payment_id: Option<String>,
}

impl Display for ProofHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x402-pay version={} scheme={} network={} transaction_hash={}",
            self.version, self.scheme, self.network, self.transaction_hash
        )?;
        if let Some(payment_id) = &self.payment_id {
            write!(f, " payment_id={payment_id}")?;
        }
        Ok(())
    }
}

impl FromStr for ProofHeader {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params = parse_tokens(s);
        let require = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .ok_or(ProtocolError::InvalidProof)
        };

        Ok(ProofHeader {
            version: require("version")?,
            scheme: require("scheme")?,
            network: require("network")?,
            transaction_hash: require("transaction_hash")?,
            payment_id: params
                .iter()
                .find(|(k, _)| *k == "payment_id")
                .map(|(_, v)| v.to_string()),
        })
    }
}

fn parse_tokens(s: &str) -> Vec<(&str, &str)> {
    s.split_ascii_whitespace()
        .filter_map(|token| token.split_once('='))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}
