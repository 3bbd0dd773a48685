//! Integration tests for token HTLCs.
//!
//! Tokens live on a `FungibleToken` ledger outside the escrow. These tests
//! check that the escrow pulls through allowances, pushes at settlement,
//! and keeps the contract `Active` whenever the token ledger refuses a
//! transfer.

use std::sync::Arc;

use htlc_contracts::{
    Asset, ContractLedger, EventLog, HtlcError, HtlcEvent, NativeEscrow, NewContract, Preimage,
    TokenEscrow,
};
use htlc_protocol::vault::{FungibleToken, NativeBank, TokenLedger};
use htlc_protocol::{Address, ManualClock};

const NOW: u64 = 1_760_000_000;

struct Harness {
    ledger: Arc<ContractLedger>,
    escrow: TokenEscrow,
    usd: Arc<FungibleToken>,
    clock: Arc<ManualClock>,
    events: Arc<EventLog>,
    alice: Address,
    bob: Address,
}

/// Helper: alice holds 1_000 USD and has approved custody for all of it.
fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let events = Arc::new(EventLog::new());
    let ledger = Arc::new(ContractLedger::new(clock.clone(), events.clone()));
    let escrow = TokenEscrow::new(ledger.clone());
    let usd = Arc::new(FungibleToken::new(Address::new("usd").unwrap()));
    escrow.register_token(usd.clone());

    let alice = Address::new("alice").unwrap();
    let bob = Address::new("bob").unwrap();
    usd.mint(&alice, 1_000).unwrap();
    usd.approve(&alice, escrow.custody(), 1_000);

    Harness {
        ledger,
        escrow,
        usd,
        clock,
        events,
        alice,
        bob,
    }
}

fn usd() -> Address {
    Address::new("usd").unwrap()
}

fn lock(h: &Harness, secret: &Preimage, amount: u64) -> NewContract {
    NewContract {
        receiver: h.bob.clone(),
        amount,
        hashlock: secret.hashlock(),
        timelock: NOW + 3600,
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn creation_pulls_into_custody_and_records_asset() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &secret, 300))
        .unwrap();

    assert_eq!(h.usd.balance_of(&h.alice), 700);
    assert_eq!(h.usd.balance_of(h.escrow.custody()), 300);
    assert_eq!(h.usd.allowance(&h.alice, h.escrow.custody()), 700);

    let c = h.escrow.get_contract(&id).unwrap();
    assert_eq!(c.asset, Asset::Token(usd()));
    assert!(c.is_active());

    assert!(matches!(
        &h.events.events()[..],
        [HtlcEvent::Created { asset: Asset::Token(t), amount: 300, .. }] if *t == usd()
    ));
}

#[test]
fn creation_without_allowance_fails_cleanly() {
    let h = harness();
    h.usd.approve(&h.alice, h.escrow.custody(), 0);
    let err = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &Preimage::random(), 1))
        .unwrap_err();
    assert_eq!(
        err,
        HtlcError::InsufficientAuthorization {
            token: usd(),
            owner: h.alice.clone(),
            allowance: 0,
            requested: 1
        }
    );
    assert!(h.ledger.is_empty());
    assert!(h.events.is_empty());
    assert_eq!(h.usd.balance_of(&h.alice), 1_000);
}

#[test]
fn creation_with_insufficient_balance_is_external_failure() {
    let h = harness();
    h.usd.approve(&h.alice, h.escrow.custody(), 5_000);
    let err = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &Preimage::random(), 2_000))
        .unwrap_err();
    assert!(matches!(err, HtlcError::ExternalTransferFailed { .. }));
    assert!(h.ledger.is_empty());
}

#[test]
fn duplicate_creation_does_not_pull_twice() {
    let h = harness();
    let terms = lock(&h, &Preimage::random(), 100);
    let id = h.escrow.new_contract(&h.alice, &usd(), &terms).unwrap();
    let err = h.escrow.new_contract(&h.alice, &usd(), &terms).unwrap_err();
    assert_eq!(err, HtlcError::DuplicateContract { id });
    assert_eq!(h.usd.balance_of(&h.alice), 900);
    assert_eq!(h.usd.balance_of(h.escrow.custody()), 100);
}

#[test]
fn validation_runs_before_any_pull() {
    let h = harness();
    let mut terms = lock(&h, &Preimage::random(), 0);
    assert!(matches!(
        h.escrow.new_contract(&h.alice, &usd(), &terms),
        Err(HtlcError::InvalidAmount { .. })
    ));
    terms.amount = 5;
    terms.timelock = NOW;
    assert!(matches!(
        h.escrow.new_contract(&h.alice, &usd(), &terms),
        Err(HtlcError::InvalidTimelock { .. })
    ));
    assert_eq!(h.usd.allowance(&h.alice, h.escrow.custody()), 1_000);
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[test]
fn withdraw_pushes_to_receiver() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &secret, 250))
        .unwrap();
    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Ok(250));
    assert_eq!(h.usd.balance_of(&h.bob), 250);
    assert_eq!(h.usd.balance_of(h.escrow.custody()), 0);
    assert_eq!(h.escrow.get_contract(&id).unwrap().secret(), Some(&secret));
}

#[test]
fn refund_pushes_back_to_sender() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &Preimage::random(), 250))
        .unwrap();
    assert!(matches!(
        h.escrow.refund(&id, &h.alice),
        Err(HtlcError::TimelockNotExpired { .. })
    ));
    h.clock.advance(3600);
    assert_eq!(h.escrow.refund(&id, &h.alice), Ok(250));
    assert_eq!(h.usd.balance_of(&h.alice), 1_000);
}

#[test]
fn failed_push_keeps_contract_active_and_secret_unrevealed() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &secret, 10))
        .unwrap();

    h.usd.freeze(&h.bob);
    let err = h.escrow.withdraw(&id, &h.bob, &secret).unwrap_err();
    assert!(matches!(err, HtlcError::ExternalTransferFailed { .. }));

    let c = h.escrow.get_contract(&id).unwrap();
    assert!(c.is_active());
    assert!(c.secret().is_none());
    assert_eq!(h.events.len(), 1, "no withdrawal event for a failed push");
    assert_eq!(h.usd.balance_of(h.escrow.custody()), 10);

    h.usd.unfreeze(&h.bob);
    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Ok(10));
}

#[test]
fn failed_refund_push_can_be_retried() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &Preimage::random(), 10))
        .unwrap();
    h.clock.advance(3600);
    h.usd.freeze(&h.alice);
    assert!(h.escrow.refund(&id, &h.alice).is_err());
    assert!(h.escrow.get_contract(&id).unwrap().is_active());
    h.usd.unfreeze(&h.alice);
    assert_eq!(h.escrow.refund(&id, &h.alice), Ok(10));
}

// ---------------------------------------------------------------------------
// Multiple tokens & mixed escrows
// ---------------------------------------------------------------------------

#[test]
fn contracts_in_different_tokens_stay_separate() {
    let h = harness();
    let eur = Arc::new(FungibleToken::new(Address::new("eur").unwrap()));
    h.escrow.register_token(eur.clone());
    eur.mint(&h.alice, 50).unwrap();
    eur.approve(&h.alice, h.escrow.custody(), 50);

    let s1 = Preimage::random();
    let s2 = Preimage::random();
    let a = h.escrow.new_contract(&h.alice, &usd(), &lock(&h, &s1, 10)).unwrap();
    let b = h
        .escrow
        .new_contract(&h.alice, eur.token(), &lock(&h, &s2, 20))
        .unwrap();

    h.escrow.withdraw(&b, &h.bob, &s2).unwrap();
    assert_eq!(eur.balance_of(&h.bob), 20);
    assert_eq!(h.usd.balance_of(&h.bob), 0);
    assert!(h.escrow.get_contract(&a).unwrap().is_active());
}

#[test]
fn escrows_refuse_each_others_contracts() {
    let h = harness();
    let bank = Arc::new(NativeBank::new());
    bank.credit(&h.alice, 100).unwrap();
    let native = NativeEscrow::new(h.ledger.clone(), bank.clone());

    let secret = Preimage::random();
    let native_id = native.new_contract(&h.alice, &lock(&h, &secret, 5)).unwrap();
    let token_id = h
        .escrow
        .new_contract(&h.alice, &usd(), &lock(&h, &secret, 5))
        .unwrap();

    assert!(matches!(
        h.escrow.withdraw(&native_id, &h.bob, &secret),
        Err(HtlcError::AssetMismatch { .. })
    ));
    assert!(matches!(
        native.withdraw(&token_id, &h.bob, &secret),
        Err(HtlcError::AssetMismatch { .. })
    ));
    assert_eq!(bank.balance_of(&h.bob), 0);
    assert_eq!(h.usd.balance_of(&h.bob), 0);
    assert_eq!(h.ledger.len(), 2);
}

#[test]
fn custody_account_cannot_be_a_party() {
    let h = harness();
    let custody = h.escrow.custody().clone();
    let secret = Preimage::random();
    let honest = h.escrow.new_contract(&h.alice, &usd(), &lock(&h, &secret, 50)).unwrap();

    let err = h
        .escrow
        .new_contract(&custody, &usd(), &lock(&h, &Preimage::random(), 50))
        .unwrap_err();
    assert_eq!(err, HtlcError::CustodyAccount { account: custody.clone() });

    let mut terms = lock(&h, &Preimage::random(), 50);
    terms.receiver = custody.clone();
    let err = h.escrow.new_contract(&h.alice, &usd(), &terms).unwrap_err();
    assert_eq!(err, HtlcError::CustodyAccount { account: custody.clone() });

    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.usd.balance_of(&custody), 50);
    h.escrow.withdraw(&honest, &h.bob, &secret).unwrap();
    assert_eq!(h.usd.balance_of(&h.bob), 50);
}
