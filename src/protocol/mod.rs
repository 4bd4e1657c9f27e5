//! Buyer-side protocol: the wire header formats and the
//! request → challenge → pay → verify state machine.

pub mod headers;
pub mod machine;

pub use machine::{FlowState, GateResponse, PaymentFlow, ResourceClient, WalletSigner};

/// Errors surfaced to the client flow. Terminal; recovery is an explicit
/// [`PaymentFlow::reset`](machine::PaymentFlow::reset) by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("Malformed payment challenge header")]
    InvalidChallenge,

    #[error("Malformed payment proof header")]
    InvalidProof,

    #[error("Server did not accept the payment proof")]
    PaymentNotVerified,

    #[error("Operation is not valid in the current flow state")]
    InvalidTransition,

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Network error: {0}")]
    Network(String),
}
