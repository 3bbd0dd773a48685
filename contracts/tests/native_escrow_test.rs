//! Integration tests for native-value HTLCs.
//!
//! These walk whole contract lifecycles through the public API: creation,
//! withdraw with the revealed secret, refund after expiry, and the error
//! paths in between. Time is driven by a `ManualClock` so timelock
//! boundaries are exact.

use std::sync::Arc;

use htlc_contracts::{
    ContractLedger, EventLog, HtlcError, HtlcEvent, NativeEscrow, NewContract, Preimage, Role,
    Settlement,
};
use htlc_protocol::vault::NativeBank;
use htlc_protocol::{Address, ManualClock};

const NOW: u64 = 1_760_000_000;

struct Harness {
    escrow: NativeEscrow,
    bank: Arc<NativeBank>,
    clock: Arc<ManualClock>,
    events: Arc<EventLog>,
    alice: Address,
    bob: Address,
}

/// Helper: alice holds 1_000 native units, the clock sits at `NOW`.
fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let events = Arc::new(EventLog::new());
    let ledger = Arc::new(ContractLedger::new(clock.clone(), events.clone()));
    let bank = Arc::new(NativeBank::new());
    let alice = Address::new("alice").unwrap();
    let bob = Address::new("bob").unwrap();
    bank.credit(&alice, 1_000).unwrap();
    Harness {
        escrow: NativeEscrow::new(ledger, bank.clone()),
        bank,
        clock,
        events,
        alice,
        bob,
    }
}

fn lock_for(h: &Harness, secret: &Preimage, amount: u64, timelock: u64) -> NewContract {
    NewContract {
        receiver: h.bob.clone(),
        amount,
        hashlock: secret.hashlock(),
        timelock,
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn new_contract_then_get_contract_is_active_with_inputs() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 7, NOW + 3600))
        .unwrap();

    let c = h.escrow.get_contract(&id).unwrap();
    assert_eq!(c.id, id);
    assert_eq!(c.sender, h.alice);
    assert_eq!(c.receiver, h.bob);
    assert_eq!(c.amount, 7);
    assert_eq!(c.hashlock, secret.hashlock());
    assert_eq!(c.timelock, NOW + 3600);
    assert!(!c.withdrawn());
    assert!(!c.refunded());
    assert_eq!(c.secret(), None);

    match &h.events.events()[..] {
        [HtlcEvent::Created {
            id: event_id,
            sender,
            receiver,
            amount,
            hashlock,
            timelock,
            ..
        }] => {
            assert_eq!(event_id, &id);
            assert_eq!(sender, &h.alice);
            assert_eq!(receiver, &h.bob);
            assert_eq!(*amount, 7);
            assert_eq!(hashlock, &secret.hashlock());
            assert_eq!(*timelock, NOW + 3600);
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn scenario_c_zero_amount_and_past_timelock_rejected() {
    let h = harness();
    let secret = Preimage::random();

    let err = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 0, NOW + 3600))
        .unwrap_err();
    assert_eq!(err, HtlcError::InvalidAmount { amount: 0 });

    let err = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 1, NOW - 1))
        .unwrap_err();
    assert_eq!(
        err,
        HtlcError::InvalidTimelock {
            timelock: NOW - 1,
            now: NOW
        }
    );

    // Nothing moved, nothing recorded.
    assert_eq!(h.bank.balance_of(&h.alice), 1_000);
    assert!(h.events.is_empty());
}

#[test]
fn self_dealing_rejected() {
    let h = harness();
    let mut terms = lock_for(&h, &Preimage::random(), 1, NOW + 60);
    terms.receiver = h.alice.clone();
    let err = h.escrow.new_contract(&h.alice, &terms).unwrap_err();
    assert!(matches!(err, HtlcError::InvalidReceiver { .. }));
}

#[test]
fn custody_account_cannot_open_or_receive_contracts() {
    let h = harness();
    let custody = h.escrow.custody().clone();
    let mallory = Address::new("mallory").unwrap();
    let secret = Preimage::random();
    let honest = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 100, NOW + 3600))
        .unwrap();

    let mine = Preimage::random();
    let err = h
        .escrow
        .new_contract(
            &custody,
            &NewContract {
                receiver: mallory.clone(),
                ..lock_for(&h, &mine, 100, NOW + 3600)
            },
        )
        .unwrap_err();
    assert_eq!(err, HtlcError::CustodyAccount { account: custody.clone() });

    let mut terms = lock_for(&h, &mine, 100, NOW + 3600);
    terms.receiver = custody.clone();
    let err = h.escrow.new_contract(&h.alice, &terms).unwrap_err();
    assert_eq!(err, HtlcError::CustodyAccount { account: custody.clone() });

    assert_eq!(h.bank.balance_of(&custody), 100);
    assert_eq!(h.bank.balance_of(&mallory), 0);
    assert_eq!(h.escrow.withdraw(&honest, &h.bob, &secret), Ok(100));
    assert_eq!(h.bank.balance_of(&h.bob), 100);
}

#[test]
fn identical_parameters_collide_only_within_one_second() {
    let h = harness();
    let secret = Preimage::random();
    let terms = lock_for(&h, &secret, 5, NOW + 3600);

    let first = h.escrow.new_contract(&h.alice, &terms).unwrap();
    let err = h.escrow.new_contract(&h.alice, &terms).unwrap_err();
    assert_eq!(err, HtlcError::DuplicateContract { id: first });
    assert_eq!(h.bank.balance_of(&h.alice), 995, "duplicate must not charge");

    h.clock.advance(1);
    let second = h.escrow.new_contract(&h.alice, &terms).unwrap();
    assert_ne!(first, second);
    assert_eq!(h.bank.balance_of(&h.alice), 990);
}

// ---------------------------------------------------------------------------
// Withdraw
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_immediate_withdraw() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 1, NOW + 3600))
        .unwrap();

    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Ok(1));
    assert_eq!(h.bank.balance_of(&h.bob), 1);

    let c = h.escrow.get_contract(&id).unwrap();
    assert!(c.withdrawn());
    assert!(!c.refunded());
    assert_eq!(c.secret(), Some(&secret));

    assert_eq!(
        h.events.for_contract(&id).last(),
        Some(&HtlcEvent::Withdrawn {
            id,
            preimage: secret
        })
    );
}

#[test]
fn scenario_d_wrong_secret_leaves_contract_usable() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 10, NOW + 3600))
        .unwrap();

    let err = h
        .escrow
        .withdraw(&id, &h.bob, &Preimage::random())
        .unwrap_err();
    assert_eq!(err, HtlcError::InvalidSecret { id });
    assert!(h.escrow.get_contract(&id).unwrap().is_active());

    // Still withdrawable with the right secret.
    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Ok(10));
}

#[test]
fn scenario_d_wrong_secret_then_refund() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 10, NOW + 3600))
        .unwrap();
    assert!(h.escrow.withdraw(&id, &h.bob, &Preimage::random()).is_err());

    h.clock.set(NOW + 3600);
    assert_eq!(h.escrow.refund(&id, &h.alice), Ok(10));
    assert_eq!(h.bank.balance_of(&h.alice), 1_000);
}

#[test]
fn withdraw_by_non_receiver_is_unauthorized() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 10, NOW + 3600))
        .unwrap();

    let err = h.escrow.withdraw(&id, &h.alice, &secret).unwrap_err();
    assert_eq!(
        err,
        HtlcError::Unauthorized {
            id,
            caller: h.alice.clone(),
            required: Role::Receiver
        }
    );
    assert!(h.escrow.get_contract(&id).unwrap().secret().is_none());
}

#[test]
fn late_withdraw_before_refund_is_honored() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 10, NOW + 60))
        .unwrap();
    h.clock.advance(3600);
    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Ok(10));
}

// ---------------------------------------------------------------------------
// Refund
// ---------------------------------------------------------------------------

#[test]
fn scenario_b_refund_before_and_after_expiry() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &Preimage::random(), 100, NOW + 3600))
        .unwrap();
    assert_eq!(h.bank.balance_of(&h.alice), 900);

    h.clock.set(NOW + 10);
    let err = h.escrow.refund(&id, &h.alice).unwrap_err();
    assert_eq!(
        err,
        HtlcError::TimelockNotExpired {
            id,
            timelock: NOW + 3600,
            now: NOW + 10
        }
    );

    h.clock.set(NOW + 3601);
    assert_eq!(h.escrow.refund(&id, &h.alice), Ok(100));
    assert_eq!(h.bank.balance_of(&h.alice), 1_000);

    let c = h.escrow.get_contract(&id).unwrap();
    assert!(c.refunded());
    assert!(!c.withdrawn());
    assert_eq!(h.events.for_contract(&id).last(), Some(&HtlcEvent::Refunded { id }));
}

#[test]
fn refund_before_expiry_rejected_regardless_of_caller() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &Preimage::random(), 1, NOW + 3600))
        .unwrap();
    for caller in [&h.alice, &h.bob] {
        assert!(matches!(
            h.escrow.refund(&id, caller),
            Err(HtlcError::TimelockNotExpired { .. })
        ));
    }
}

#[test]
fn refund_at_exact_timelock_succeeds() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &Preimage::random(), 1, NOW + 100))
        .unwrap();
    h.clock.set(NOW + 100);
    assert_eq!(h.escrow.refund(&id, &h.alice), Ok(1));
}

#[test]
fn refund_by_receiver_after_expiry_is_unauthorized() {
    let h = harness();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &Preimage::random(), 1, NOW + 100))
        .unwrap();
    h.clock.advance(100);
    let err = h.escrow.refund(&id, &h.bob).unwrap_err();
    assert!(matches!(
        err,
        HtlcError::Unauthorized {
            required: Role::Sender,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[test]
fn replayed_transitions_never_pay_twice() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 50, NOW + 100))
        .unwrap();
    h.escrow.withdraw(&id, &h.bob, &secret).unwrap();

    let settled = HtlcError::AlreadySettled {
        id,
        state: Settlement::Withdrawn,
    };
    assert_eq!(h.escrow.withdraw(&id, &h.bob, &secret), Err(settled.clone()));
    h.clock.advance(100);
    assert_eq!(h.escrow.refund(&id, &h.alice), Err(settled));

    assert_eq!(h.bank.balance_of(&h.bob), 50);
    assert_eq!(h.bank.balance_of(&h.alice), 950);
    assert_eq!(h.bank.balance_of(h.escrow.custody()), 0);
    assert_eq!(h.events.for_contract(&id).len(), 2);
}

#[test]
fn refund_replay_reports_refunded() {
    let h = harness();
    let secret = Preimage::random();
    let id = h
        .escrow
        .new_contract(&h.alice, &lock_for(&h, &secret, 50, NOW + 100))
        .unwrap();
    h.clock.advance(100);
    h.escrow.refund(&id, &h.alice).unwrap();

    let err = h.escrow.withdraw(&id, &h.bob, &secret).unwrap_err();
    assert_eq!(
        err,
        HtlcError::AlreadySettled {
            id,
            state: Settlement::Refunded
        }
    );
}

#[test]
fn unknown_contract_everywhere() {
    let h = harness();
    let ghost = htlc_contracts::ContractId::from_bytes([0xee; 32]);
    assert_eq!(
        h.escrow.get_contract(&ghost),
        Err(HtlcError::UnknownContract { id: ghost })
    );
    assert_eq!(
        h.escrow.withdraw(&ghost, &h.bob, &Preimage::random()),
        Err(HtlcError::UnknownContract { id: ghost })
    );
    assert_eq!(
        h.escrow.refund(&ghost, &h.alice),
        Err(HtlcError::UnknownContract { id: ghost })
    );
}
