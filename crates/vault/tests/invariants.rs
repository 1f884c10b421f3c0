//! Property and scenario tests across the whole dispatch path

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use tranchevault_core::{Amount, TrancheId};
use tranchevault_vault::{
    handle, ClaimStatus, Envelope, Operation, Reply, VaultConfig, VaultError, VaultState,
};

fn units(n: u64) -> Amount {
    Amount::from_units(n)
}

fn send(
    state: &mut VaultState,
    config: &VaultConfig,
    sender: &str,
    at: DateTime<Utc>,
    op: Operation,
) -> Result<Reply, VaultError> {
    handle(state, config, &Envelope::new(sender, at, op)).result
}

#[test]
fn test_breaker_trips_on_third_half_cap_claim() {
    let config = VaultConfig::default();
    let mut state = VaultState::new(&config).unwrap();
    let t0 = Utc::now();

    send(&mut state, &config, "whale", t0, Operation::Deposit {
        tranche: TrancheId::Eqt,
        amount: units(3_000_000),
    })
    .unwrap();

    let claim = |r: &str| Operation::ApplyClaim {
        amount: units(500_000),
        claim_ref: r.to_string(),
    };

    assert!(send(&mut state, &config, "claims_processor", t0, claim("c-1")).is_ok());
    assert!(send(&mut state, &config, "claims_processor", t0 + Duration::hours(1), claim("c-2")).is_ok());

    let before = state.clone();
    let err = send(&mut state, &config, "claims_processor", t0 + Duration::hours(2), claim("c-3"))
        .unwrap_err();
    assert_eq!(err.code(), "circuit_breaker_triggered");
    assert_eq!(state, before);

    // A fresh window accepts the same claim
    let later = t0 + Duration::hours(24) + Duration::seconds(1);
    let reply = send(&mut state, &config, "claims_processor", later, claim("c-3")).unwrap();
    assert!(matches!(
        reply,
        Reply::Claim(receipt) if receipt.status == ClaimStatus::Paid
    ));
    assert_eq!(state.total_capital(), units(1_500_000));
}

#[test]
fn test_insolvent_claim_leaves_consistent_state() {
    let config = VaultConfig::default();
    let mut state = VaultState::new(&config).unwrap();
    let now = Utc::now();

    send(&mut state, &config, "alice", now, Operation::Deposit {
        tranche: TrancheId::Snr,
        amount: units(10),
    })
    .unwrap();
    send(&mut state, &config, "alice", now, Operation::Withdraw {
        tranche: TrancheId::Snr,
        amount: units(4),
        on_behalf_of: None,
    })
    .unwrap();

    let reply = send(&mut state, &config, "claims_processor", now, Operation::ApplyClaim {
        amount: units(100),
        claim_ref: "flood".to_string(),
    })
    .unwrap();

    // Reserved capital for the in-flight withdrawal is untouched
    match reply {
        Reply::Claim(receipt) => {
            assert_eq!(receipt.absorbed, units(6));
            assert_eq!(receipt.status, ClaimStatus::Insolvent { shortfall: units(94) });
        }
        other => panic!("unexpected reply {:?}", other),
    }
    assert_eq!(state.tranche_capital(TrancheId::Snr), units(4));
    assert!(state.paused());
    assert!(state.verify_invariants().is_ok());
}

#[derive(Debug, Clone)]
enum Step {
    Deposit { who: usize, tranche: usize, amount: u64 },
    Withdraw { who: usize, tranche: usize, amount: u64 },
    Confirm { success: bool },
    Claim { amount: u64 },
    Premium { amount: u64 },
    Sweep,
    Advance { hours: i64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..3usize, 0..6usize, 1..1_000u64)
            .prop_map(|(who, tranche, amount)| Step::Deposit { who, tranche, amount }),
        (0..3usize, 0..6usize, 1..1_000u64)
            .prop_map(|(who, tranche, amount)| Step::Withdraw { who, tranche, amount }),
        any::<bool>().prop_map(|success| Step::Confirm { success }),
        (1..2_000u64).prop_map(|amount| Step::Claim { amount }),
        (1..1_000u64).prop_map(|amount| Step::Premium { amount }),
        Just(Step::Sweep),
        (1..48i64).prop_map(|hours| Step::Advance { hours }),
    ]
}

const DEPOSITORS: [&str; 3] = ["alice", "bob", "carol"];

proptest! {
    #[test]
    fn prop_capital_is_conserved(steps in prop::collection::vec(step(), 1..40)) {
        let config = VaultConfig { protocol_fee_bps: 100, ..VaultConfig::default() };
        let mut state = VaultState::new(&config).unwrap();
        let mut now = Utc::now();
        let mut expected = Amount::ZERO;
        let mut pending: HashMap<u64, Amount> = HashMap::new();
        let mut claim_no = 0u64;

        for step in steps {
            let (sender, op) = match step {
                Step::Deposit { who, tranche, amount } => (DEPOSITORS[who], Operation::Deposit {
                    tranche: TrancheId::ALL[tranche],
                    amount: units(amount),
                }),
                Step::Withdraw { who, tranche, amount } => (DEPOSITORS[who], Operation::Withdraw {
                    tranche: TrancheId::ALL[tranche],
                    amount: units(amount),
                    on_behalf_of: None,
                }),
                Step::Confirm { success } => match pending.keys().min() {
                    Some(seq_no) => ("float_manager", Operation::ConfirmPayout { seq_no: *seq_no, success }),
                    None => continue,
                },
                Step::Claim { amount } => {
                    claim_no += 1;
                    ("claims_processor", Operation::ApplyClaim {
                        amount: units(amount),
                        claim_ref: format!("claim-{}", claim_no),
                    })
                }
                Step::Premium { amount } => ("float_manager", Operation::DistributePremium {
                    amount: units(amount),
                    allocation: None,
                }),
                Step::Sweep => ("admin", Operation::SweepExpired),
                Step::Advance { hours } => {
                    now += Duration::hours(hours);
                    continue;
                }
            };

            let handled = handle(&mut state, &config, &Envelope::new(sender, now, op));
            match handled.result {
                Ok(Reply::Deposited { amount, .. }) => {
                    expected = expected.checked_add(&amount).unwrap();
                }
                Ok(Reply::PremiumDistributed(split)) => {
                    let net = split.amount.checked_sub(&split.protocol_fee).unwrap();
                    expected = expected.checked_add(&net).unwrap();
                }
                Ok(Reply::Claim(receipt)) => {
                    expected = expected.checked_sub(&receipt.absorbed).unwrap();
                    if !matches!(receipt.status, ClaimStatus::Paid) {
                        send(&mut state, &config, "admin", now, Operation::Unpause).unwrap();
                    }
                }
                Ok(Reply::WithdrawalPending { seq_no, amount, .. }) => {
                    pending.insert(seq_no, amount);
                }
                Ok(Reply::PayoutSettled { seq_no, paid }) => {
                    let amount = pending.remove(&seq_no).unwrap();
                    if paid {
                        expected = expected.checked_sub(&amount).unwrap();
                    }
                }
                Ok(Reply::Swept { rolled_back }) => {
                    for seq_no in rolled_back {
                        pending.remove(&seq_no);
                    }
                }
                Ok(_) | Err(_) => {}
            }

            prop_assert!(state.verify_invariants().is_ok(), "{:?}", state.verify_invariants());
            prop_assert!(!state.reentrancy_guard());
            prop_assert_eq!(state.total_capital(), expected);
            prop_assert!(state.breaker().window_losses() <= state.breaker().loss_cap());
        }
    }
}
