//! Settlement engine behavior against a shared in-process ledger.

use std::sync::Arc;

use solana_pubkey::{Pubkey, pubkey};
use x402_tithe::{
    address,
    errors::Error,
    ledger::Ledger,
    settlement::{RateUpdate, SettleParams, SettlementEngine},
    types::USDC_DEVNET,
};

const ONE_USDC: u64 = 1_000_000;

fn pk(byte: u8) -> Pubkey {
    Pubkey::new_from_array([byte; 32])
}

struct Harness {
    ledger: Arc<Ledger>,
    engine: SettlementEngine,
    authority: Pubkey,
    impact_treasury: Pubkey,
    protocol_treasury: Pubkey,
    seller: Pubkey,
}

impl Harness {
    /// Initialized facilitator at the reference rates, escrow funded
    /// with `escrow` units.
    fn new(escrow: u64) -> Self {
        let ledger = Arc::new(Ledger::new());
        let engine = SettlementEngine::new(Arc::clone(&ledger), USDC_DEVNET.mint).unwrap();
        let harness = Harness {
            ledger,
            engine,
            authority: pk(1),
            impact_treasury: pk(2),
            protocol_treasury: pk(3),
            seller: pk(4),
        };
        harness
            .engine
            .initialize(harness.authority, harness.impact_treasury, 100, 1000)
            .unwrap();
        if escrow > 0 {
            harness
                .ledger
                .mint_to(&harness.engine.escrow_token_account(), escrow)
                .unwrap();
        }
        harness
    }

    fn settle(&self, payment_id: &str, amount: u64) -> x402_tithe::errors::Result<()> {
        let params = SettleParams::builder()
            .payment_id(payment_id)
            .amount(amount)
            .seller(self.seller)
            .buyer(pk(5))
            .protocol_treasury(self.protocol_treasury)
            .build();
        self.engine.settle_payment(params).map(|_| ())
    }

    fn balance_of(&self, owner: &Pubkey) -> u64 {
        let account = address::token_account_address(owner, &USDC_DEVNET.mint);
        self.ledger.balance(&account).unwrap_or(0)
    }
}

#[test]
fn test_reference_split_100_usdc() {
    let harness = Harness::new(100 * ONE_USDC);
    harness.settle("order-100", 100 * ONE_USDC).unwrap();

    assert_eq!(harness.balance_of(&harness.seller), 89 * ONE_USDC);
    assert_eq!(harness.balance_of(&harness.impact_treasury), 10 * ONE_USDC);
    assert_eq!(harness.balance_of(&harness.protocol_treasury), ONE_USDC);
    assert_eq!(harness.engine.escrow_balance().unwrap(), 0);

    let receipt = harness.engine.receipt("order-100").unwrap();
    assert!(receipt.settled);
    assert_eq!(receipt.amount, 100 * ONE_USDC);
    assert_eq!(receipt.tithe_amount, 10 * ONE_USDC);
    assert_eq!(receipt.fee_amount, ONE_USDC);
    assert_eq!(receipt.seller, harness.seller);

    let config = harness.engine.config().unwrap();
    assert_eq!(config.total_payments, 1);
    assert_eq!(config.total_volume, 100 * ONE_USDC);
}

#[test]
fn test_settlement_signature_is_deterministic() {
    let a = Harness::new(10 * ONE_USDC);
    let b = Harness::new(10 * ONE_USDC);

    let params = |h: &Harness| {
        SettleParams::builder()
            .payment_id("order-sig")
            .amount(ONE_USDC)
            .seller(h.seller)
            .protocol_treasury(h.protocol_treasury)
            .build()
    };
    let sig_a = a.engine.settle_payment(params(&a)).unwrap();
    let sig_b = b.engine.settle_payment(params(&b)).unwrap();
    assert_eq!(sig_a, sig_b);
}

#[test]
fn test_duplicate_payment_id_rejected_without_side_effects() {
    let harness = Harness::new(10 * ONE_USDC);
    harness.settle("order-dup", ONE_USDC).unwrap();

    let err = harness.settle("order-dup", ONE_USDC).unwrap_err();
    assert!(matches!(err, Error::DuplicatePayment(id) if id == "order-dup"));

    let config = harness.engine.config().unwrap();
    assert_eq!(config.total_payments, 1);
    assert_eq!(config.total_volume, ONE_USDC);
    assert_eq!(harness.engine.escrow_balance().unwrap(), 9 * ONE_USDC);
}

#[test]
fn test_insufficient_escrow_leaves_no_partial_effect() {
    let harness = Harness::new(ONE_USDC);
    let err = harness.settle("order-big", 2 * ONE_USDC).unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientEscrowBalance {
            available,
            required,
        } if available == ONE_USDC && required == 2 * ONE_USDC
    ));

    assert_eq!(harness.engine.escrow_balance().unwrap(), ONE_USDC);
    assert_eq!(harness.balance_of(&harness.seller), 0);
    assert!(!harness.engine.is_settled("order-big"));
    assert_eq!(harness.engine.config().unwrap().total_payments, 0);

    // The failed id is not burned.
    harness.settle("order-big", ONE_USDC).unwrap();
}

#[test]
fn test_settle_before_initialize_fails() {
    let ledger = Arc::new(Ledger::new());
    let engine = SettlementEngine::new(Arc::clone(&ledger), USDC_DEVNET.mint).unwrap();
    ledger.mint_to(&engine.escrow_token_account(), ONE_USDC).unwrap();

    let params = SettleParams::builder()
        .payment_id("order-early")
        .amount(ONE_USDC)
        .seller(pk(4))
        .protocol_treasury(pk(3))
        .build();
    assert!(matches!(
        engine.settle_payment(params),
        Err(Error::ConfigNotFound)
    ));
}

#[test]
fn test_initialize_is_singleton() {
    let harness = Harness::new(0);
    let err = harness
        .engine
        .initialize(pk(9), pk(8), 0, 0)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));

    // First writer's governance survives.
    let config = harness.engine.config().unwrap();
    assert_eq!(config.authority, harness.authority);
    assert_eq!(config.tithe_bps, 1000);
}

#[test]
fn test_initialize_rejects_rates_over_denominator() {
    let ledger = Arc::new(Ledger::new());
    let engine = SettlementEngine::new(ledger, USDC_DEVNET.mint).unwrap();
    assert!(matches!(
        engine.initialize(pk(1), pk(2), 5_001, 5_000),
        Err(Error::InvalidRate)
    ));
}

#[test]
fn test_zero_amount_and_oversized_id_rejected() {
    let harness = Harness::new(10 * ONE_USDC);
    assert!(matches!(
        harness.settle("order-zero", 0),
        Err(Error::InvalidAmount)
    ));
    let long_id = "x".repeat(65);
    assert!(matches!(
        harness.settle(&long_id, ONE_USDC),
        Err(Error::PaymentIdTooLong(64))
    ));
}

#[test]
fn test_seller_doubling_as_impact_treasury_accumulates() {
    let harness = Harness::new(100 * ONE_USDC);
    let params = SettleParams::builder()
        .payment_id("order-alias")
        .amount(100 * ONE_USDC)
        .seller(harness.impact_treasury)
        .protocol_treasury(harness.protocol_treasury)
        .build();
    harness.engine.settle_payment(params).unwrap();

    // 89 seller share + 10 tithe land on the same owner.
    assert_eq!(harness.balance_of(&harness.impact_treasury), 99 * ONE_USDC);
}

#[test]
fn test_update_rates_applies_to_later_settlements_only() {
    let harness = Harness::new(200 * ONE_USDC);
    harness.settle("order-old", 100 * ONE_USDC).unwrap();

    harness
        .engine
        .update_rates(
            harness.authority,
            RateUpdate::builder().tithe_bps(2_000).fee_bps(0).build(),
        )
        .unwrap();
    harness.settle("order-new", 100 * ONE_USDC).unwrap();

    let old = harness.engine.receipt("order-old").unwrap();
    let new = harness.engine.receipt("order-new").unwrap();
    assert_eq!(old.tithe_amount, 10 * ONE_USDC);
    assert_eq!(new.tithe_amount, 20 * ONE_USDC);
    assert_eq!(new.fee_amount, 0);
}

#[test]
fn test_update_rates_requires_authority() {
    let harness = Harness::new(0);
    let err = harness
        .engine
        .update_rates(pk(99), RateUpdate::builder().tithe_bps(0).build())
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
    assert_eq!(harness.engine.config().unwrap().tithe_bps, 1000);
}

#[test]
fn test_update_rates_rejects_sum_over_denominator() {
    let harness = Harness::new(0);
    let err = harness
        .engine
        .update_rates(
            harness.authority,
            RateUpdate::builder().fee_bps(9_500).tithe_bps(600).build(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRate));
}

#[test]
fn test_transfer_authority_hands_over_control() {
    let harness = Harness::new(0);
    let new_authority = pk(42);
    harness
        .engine
        .transfer_authority(harness.authority, new_authority)
        .unwrap();

    // Old authority is locked out, new one governs.
    assert!(matches!(
        harness
            .engine
            .update_rates(harness.authority, RateUpdate::default()),
        Err(Error::Unauthorized)
    ));
    harness
        .engine
        .update_rates(new_authority, RateUpdate::builder().fee_bps(50).build())
        .unwrap();
    assert_eq!(harness.engine.config().unwrap().fee_bps, 50);
}

#[test]
fn test_concurrent_settlements_of_same_id_pick_one_winner() {
    let harness = Arc::new(Harness::new(100 * ONE_USDC));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            std::thread::spawn(move || harness.settle("order-race", 10 * ONE_USDC))
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(outcomes
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(Error::DuplicatePayment(_)))));
    assert_eq!(harness.engine.escrow_balance().unwrap(), 90 * ONE_USDC);
    assert_eq!(harness.engine.config().unwrap().total_payments, 1);
}

#[test]
fn test_engine_reattach_sees_existing_state() {
    let harness = Harness::new(10 * ONE_USDC);
    harness.settle("order-persist", ONE_USDC).unwrap();

    // A second engine over the same ledger derives the same addresses.
    let engine = SettlementEngine::new(Arc::clone(&harness.ledger), USDC_DEVNET.mint).unwrap();
    assert!(engine.is_settled("order-persist"));
    assert_eq!(engine.config().unwrap().total_volume, ONE_USDC);
    assert_eq!(
        engine.escrow_token_account(),
        harness.engine.escrow_token_account()
    );
}

#[test]
fn test_usdc_devnet_mint_constant() {
    assert_eq!(
        USDC_DEVNET.mint,
        pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU")
    );
    assert_eq!(USDC_DEVNET.decimals, 6);
}
