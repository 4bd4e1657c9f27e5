//! The client-side payment flow.
//!
//! One flow instance drives one resource request through
//! `Locked → Requesting → PaymentRequired → Paying → Verifying` and ends
//! in `Unlocked` or `Failed`. The flow suspends at exactly two points:
//! awaiting the wallet signature and awaiting a gate response. Methods
//! take `&mut self`, so no second transition can start while one is
//! pending.

use bon::Builder;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use url::Url;

use crate::{
    protocol::{
        ProtocolError,
        headers::{ChallengeHeader, ProofHeader},
    },
    split::{Split, split},
    types::{TokenInfo, USDC_DEVNET},
};

/// What a resource gate answered for one fetch.
#[derive(Debug, Clone)]
pub enum GateResponse {
    /// 200: the resource body.
    Granted(String),
    /// 402: the raw challenge header value.
    PaymentRequired(String),
}

/// Transport seam towards the resource gate.
pub trait ResourceClient {
    type Error: std::error::Error;

    fn fetch(
        &self,
        resource: &Url,
        proof: Option<&ProofHeader>,
    ) -> impl Future<Output = Result<GateResponse, Self::Error>>;
}

/// Signing seam towards the user's wallet.
pub trait WalletSigner {
    type Error: std::error::Error;

    fn is_connected(&self) -> bool;

    /// Builds, signs and submits a transfer of `amount` smallest units
    /// to `recipient`; resolves once the transfer is confirmed.
    fn transfer(
        &self,
        recipient: &Pubkey,
        amount: u64,
    ) -> impl Future<Output = Result<Signature, Self::Error>>;
}

#[derive(Debug)]
pub enum FlowState {
    Locked,
    Requesting,
    PaymentRequired(ChallengeHeader),
    Paying,
    Verifying,
    Unlocked { body: String },
    Failed(ProtocolError),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Unlocked { .. } | FlowState::Failed(_))
    }
}

/// Client state machine for one paid resource.
#[derive(Builder)]
pub struct PaymentFlow<C: ResourceClient, W: WalletSigner> {
    pub client: C,
    pub wallet: W,
    pub resource: Url,
    /// Rates the client assumes when mirroring the facilitator's split
    /// for display; the authoritative split happens server-side.
    #[builder(default = 1000)]
    pub tithe_bps: u16,
    #[builder(default = 0)]
    pub fee_bps: u16,
    #[builder(default = USDC_DEVNET)]
    pub token: TokenInfo,
    #[builder(skip = FlowState::Locked)]
    state: FlowState,
}

impl<C: ResourceClient, W: WalletSigner> PaymentFlow<C, W> {
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// The challenge amount rendered in display units, once known.
    pub fn display_amount(&self) -> Option<String> {
        match &self.state {
            FlowState::PaymentRequired(challenge) => {
                Some(challenge.max_amount.ui_amount(self.token.decimals))
            }
            _ => None,
        }
    }

    /// Mirrors the facilitator's split for display. The authoritative
    /// split happens server-side out of escrow.
    pub fn preview_split(&self) -> Option<Split> {
        match &self.state {
            FlowState::PaymentRequired(challenge) => {
                split(challenge.max_amount.raw(), self.fee_bps, self.tithe_bps).ok()
            }
            _ => None,
        }
    }

    /// `Locked → Requesting → {PaymentRequired | Unlocked | Failed}`.
    ///
    /// Calling from any other state is refused without touching the
    /// current state.
    pub async fn request_access(&mut self) -> Result<&FlowState, ProtocolError> {
        if !matches!(self.state, FlowState::Locked) {
            return Err(ProtocolError::InvalidTransition);
        }
        if !self.wallet.is_connected() {
            self.state = FlowState::Failed(ProtocolError::WalletNotConnected);
            return Ok(&self.state);
        }

        self.state = FlowState::Requesting;
        self.state = match self.client.fetch(&self.resource, None).await {
            Ok(GateResponse::Granted(body)) => FlowState::Unlocked { body },
            Ok(GateResponse::PaymentRequired(raw)) => match raw.parse::<ChallengeHeader>() {
                Ok(challenge) => FlowState::PaymentRequired(challenge),
                Err(_) => FlowState::Failed(ProtocolError::InvalidChallenge),
            },
            Err(err) => FlowState::Failed(ProtocolError::Network(err.to_string())),
        };
        Ok(&self.state)
    }

    /// `PaymentRequired → Paying → Verifying → {Unlocked | Failed}`.
    ///
    /// Refused without touching the current state unless a challenge is
    /// pending. `payment_id` is the idempotency key for this settlement
    /// attempt; resubmitting with the same id after an unconfirmed
    /// outcome is safe, a fresh id starts a new payment.
    pub async fn pay(
        &mut self,
        payment_id: impl Into<String>,
    ) -> Result<&FlowState, ProtocolError> {
        let challenge = match &self.state {
            FlowState::PaymentRequired(challenge) => challenge.clone(),
            _ => return Err(ProtocolError::InvalidTransition),
        };
        let Some(recipient) = challenge.recipient else {
            self.state = FlowState::Failed(ProtocolError::InvalidChallenge);
            return Ok(&self.state);
        };
        // The client-side transfer mirrors only the seller share; the
        // facilitator executes the full split out of escrow.
        let shares = match split(challenge.max_amount.raw(), self.fee_bps, self.tithe_bps) {
            Ok(shares) => shares,
            Err(_) => {
                self.state = FlowState::Failed(ProtocolError::InvalidChallenge);
                return Ok(&self.state);
            }
        };

        self.state = FlowState::Paying;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Paying {} for resource '{}'",
            challenge.max_amount,
            challenge.resource,
        );

        // Suspension point one: the wallet signature.
        let signature = match self
            .wallet
            .transfer(&recipient, shares.recipient_amount)
            .await
        {
            Ok(signature) => signature,
            Err(err) => {
                self.state = FlowState::Failed(ProtocolError::Wallet(err.to_string()));
                return Ok(&self.state);
            }
        };

        self.state = FlowState::Verifying;
        let proof = ProofHeader::builder()
            .version(challenge.version)
            .scheme(challenge.scheme)
            .network(challenge.network)
            .transaction_hash(signature.to_string())
            .payment_id(payment_id.into())
            .build();

        // Suspension point two: the retried request.
        self.state = match self.client.fetch(&self.resource, Some(&proof)).await {
            Ok(GateResponse::Granted(body)) => FlowState::Unlocked { body },
            Ok(GateResponse::PaymentRequired(_)) => {
                FlowState::Failed(ProtocolError::PaymentNotVerified)
            }
            Err(err) => FlowState::Failed(ProtocolError::Network(err.to_string())),
        };
        Ok(&self.state)
    }

    /// Returns to `Locked`. Only valid from a terminal state, so a flow
    /// cannot be cancelled mid-transfer.
    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        if !self.state.is_terminal() {
            return Err(ProtocolError::InvalidTransition);
        }
        self.state = FlowState::Locked;
        Ok(())
    }
}
