//! Seller-side resource gate.
//!
//! A [`ResourceGate`] fronts one priced resource: it answers every
//! request with either `402 Payment Required` plus a challenge header,
//! or `200 OK` once a valid proof settles through the facilitator. The
//! gate is transport-agnostic; callers map a [`GateDecision`] onto
//! their HTTP framework of choice.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bon::Builder;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

use crate::{
    errors::{Error, Result},
    protocol::headers::{ChallengeHeader, ProofHeader},
    settlement::{SettleParams, SettlementEngine},
    state::PaymentReceipt,
    types::TokenAmount,
};

/// Everything the gate needs to answer for one resource.
#[derive(Builder)]
pub struct ResourceGate {
    pub engine: Arc<SettlementEngine>,
    /// Price in smallest token units.
    #[builder(into)]
    pub price: TokenAmount,
    #[builder(into)]
    pub resource: String,
    #[builder(into)]
    pub description: Option<String>,
    pub seller: Pubkey,
    pub protocol_treasury: Pubkey,
}

/// The gate's verdict on one request.
#[derive(Debug)]
pub enum GateDecision {
    /// Serve the resource; attach `header` under
    /// [`SETTLEMENT_HEADER`](crate::protocol::headers::SETTLEMENT_HEADER).
    Grant {
        status: StatusCode,
        header: String,
        receipt: PaymentReceipt,
    },
    /// Refuse with the challenge under the 402 header.
    Challenge {
        status: StatusCode,
        header: String,
    },
}

/// Body of the settlement response header, base64(JSON)-encoded the
/// same way the payment-response header travels on the buyer side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResponse {
    pub payment_id: String,
    pub signature: String,
    pub amount: TokenAmount,
    pub recipient_amount: TokenAmount,
    pub tithe_amount: TokenAmount,
    pub fee_amount: TokenAmount,
}

impl ResourceGate {
    /// Decide a request. `proof` is the raw value of the proof header,
    /// if the client sent one.
    pub fn decide(&self, proof: Option<&str>) -> Result<GateDecision> {
        let Some(raw) = proof else {
            return self.challenge();
        };
        let Ok(proof) = raw.parse::<ProofHeader>() else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Rejecting malformed proof header");
            return self.challenge();
        };
        let Some(payment_id) = proof.payment_id else {
            return self.challenge();
        };

        // A replayed proof for an already-settled payment is still a
        // valid grant; the receipt proves the split happened once.
        if !self.engine.is_settled(&payment_id) {
            let params = SettleParams::builder()
                .payment_id(payment_id.clone())
                .amount(self.price.raw())
                .seller(self.seller)
                .protocol_treasury(self.protocol_treasury)
                .build();
            match self.engine.settle_payment(params) {
                Ok(_) | Err(Error::DuplicatePayment(_)) => {}
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Settlement failed for '{payment_id}': {err}");
                    return self.challenge();
                }
            }
        }

        let receipt = self.engine.receipt(&payment_id)?;
        // A receipt settled below this gate's price does not admit; one
        // engine may back several gates at different prices.
        if receipt.amount < self.price.raw() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Receipt '{}' settled {} below the {} price",
                payment_id,
                receipt.amount,
                self.price,
            );
            return self.challenge();
        }
        let response = SettlementResponse {
            payment_id: receipt.payment_id.clone(),
            signature: settlement_signature_string(&receipt),
            amount: TokenAmount(receipt.amount),
            recipient_amount: TokenAmount(
                receipt
                    .amount
                    .checked_sub(receipt.tithe_amount)
                    .and_then(|n| n.checked_sub(receipt.fee_amount))
                    .ok_or(Error::MathOverflow)?,
            ),
            tithe_amount: TokenAmount(receipt.tithe_amount),
            fee_amount: TokenAmount(receipt.fee_amount),
        };
        let header = BASE64.encode(serde_json::to_vec(&response)?);

        Ok(GateDecision::Grant {
            status: StatusCode::OK,
            header,
            receipt,
        })
    }

    fn challenge(&self) -> Result<GateDecision> {
        let challenge = ChallengeHeader::builder()
            .max_amount(self.price)
            .resource(self.resource.clone())
            .maybe_description(self.description.clone())
            .recipient(self.engine.escrow_authority())
            .build();
        Ok(GateDecision::Challenge {
            status: StatusCode::PAYMENT_REQUIRED,
            header: challenge.to_string(),
        })
    }
}

/// Decode a settlement response header produced by [`ResourceGate`].
pub fn decode_settlement_header(value: &str) -> Result<SettlementResponse> {
    let bytes = BASE64.decode(value)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn settlement_signature_string(receipt: &PaymentReceipt) -> String {
    crate::settlement::settlement_signature(&receipt.payment_id).to_string()
}
