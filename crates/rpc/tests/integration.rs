//! Integration tests for the TrancheVault application context
//!
//! These drive the vault through the actor and journal, then reopen the
//! data directory to check that replay rebuilds the same state.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use tranchevault_bus::PayoutConfirmer;
use tranchevault_core::{Amount, TrancheId};
use tranchevault_events::EventReader;
use tranchevault_rpc::{AppContext, CommitError};
use tranchevault_vault::{Envelope, Operation, Query, QueryResponse, Reply, VaultConfig};

fn units(n: u64) -> Amount {
    Amount::from_units(n)
}

/// Deposit → premium → claim → withdraw → confirm, then replay
#[tokio::test]
async fn test_full_workflow_and_replay() {
    let temp_dir = TempDir::new().unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let mut ctx = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    assert_eq!(ctx.last_sequence(), 0);

    let steps = vec![
        Envelope::new("alice", t0, Operation::Deposit { tranche: TrancheId::Btc, amount: units(100) }),
        Envelope::new("bob", t0, Operation::Deposit { tranche: TrancheId::Eqt, amount: units(50) }),
        Envelope::new("float_manager", t0 + Duration::days(1), Operation::DistributePremium {
            amount: units(10),
            allocation: None,
        }),
        Envelope::new("claims_processor", t0 + Duration::days(2), Operation::ApplyClaim {
            amount: units(30),
            claim_ref: "storm-1".to_string(),
        }),
        Envelope::new("alice", t0 + Duration::days(3), Operation::Withdraw {
            tranche: TrancheId::Btc,
            amount: units(40),
            on_behalf_of: None,
        }),
    ];
    for envelope in steps {
        ctx.commit(envelope).await.unwrap();
    }

    let committed = ctx
        .commit(Envelope::new(
            "float_manager",
            t0 + Duration::days(3),
            Operation::ConfirmPayout { seq_no: 1, success: true },
        ))
        .await
        .unwrap();
    assert_eq!(committed.reply, Reply::PayoutSettled { seq_no: 1, paid: true });
    assert_eq!(committed.sequence, Some(6));

    // 150 deposited + 10 premium - 30 claim - 40 paid out
    let at = t0 + Duration::days(4);
    assert_eq!(
        ctx.query(at, Query::TotalCapital).await.unwrap(),
        QueryResponse::Amount(units(90))
    );

    let original = ctx.shutdown().await.unwrap();
    assert_eq!(EventReader::from_directory(temp_dir.path().join("journal")).unwrap().count().unwrap(), 6);

    let reopened = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    assert_eq!(reopened.last_sequence(), 6);
    let replayed = reopened.shutdown().await.unwrap();
    assert_eq!(replayed, original);
}

#[tokio::test]
async fn test_rejected_operation_is_not_journaled() {
    let temp_dir = TempDir::new().unwrap();
    let mut ctx = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();

    let result = ctx
        .commit(Envelope::new("mallory", Utc::now(), Operation::Pause))
        .await;
    match result {
        Err(CommitError::Vault(e)) => assert_eq!(e.code(), "unauthorized"),
        other => panic!("unexpected {:?}", other.map(|c| c.reply)),
    }
    assert_eq!(ctx.last_sequence(), 0);
}

#[tokio::test]
async fn test_report_is_not_journaled() {
    let temp_dir = TempDir::new().unwrap();
    let mut ctx = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();

    let committed = ctx
        .commit(Envelope::new("float_manager", Utc::now(), Operation::RequestReport))
        .await
        .unwrap();
    assert_eq!(committed.reply, Reply::ReportSent);
    assert_eq!(committed.sequence, None);
    assert_eq!(committed.outbound.len(), 1);
}

#[tokio::test]
async fn test_backdated_commit_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let day_two = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
    let day_one = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let mut ctx = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    for at in [day_two, day_one] {
        ctx.commit(Envelope::new("alice", at, Operation::Deposit {
            tranche: TrancheId::Snr,
            amount: units(10),
        }))
        .await
        .unwrap();
    }
    let original = ctx.shutdown().await.unwrap();

    let mut reopened = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    assert_eq!(reopened.last_sequence(), 2);
    let committed = reopened
        .commit(Envelope::new("admin", day_one, Operation::Pause))
        .await
        .unwrap();
    assert_eq!(committed.sequence, Some(3));

    let replayed = reopened.shutdown().await.unwrap();
    assert_eq!(replayed.total_capital(), original.total_capital());
    assert!(replayed.paused());
}

#[tokio::test]
async fn test_collaborator_answers_are_journaled() {
    let temp_dir = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    let mut ctx = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    ctx.register(Arc::new(PayoutConfirmer::new("float_manager")));

    ctx.commit(Envelope::new("alice", at, Operation::Deposit {
        tranche: TrancheId::Btc,
        amount: units(10),
    }))
    .await
    .unwrap();
    let committed = ctx
        .commit(Envelope::new("alice", at, Operation::Withdraw {
            tranche: TrancheId::Btc,
            amount: units(4),
            on_behalf_of: None,
        }))
        .await
        .unwrap();

    assert_eq!(committed.follow_ups.len(), 1);
    assert_eq!(committed.follow_ups[0].reply, Reply::PayoutSettled { seq_no: 1, paid: true });
    assert_eq!(committed.follow_ups[0].sequence, Some(3));

    let records = EventReader::from_directory(ctx.journal_path()).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].envelope.at, at);
    assert_eq!(records[2].envelope.op, Operation::ConfirmPayout { seq_no: 1, success: true });

    let original = ctx.shutdown().await.unwrap();
    assert_eq!(original.total_capital(), units(6));

    // Replay needs no collaborator: the confirmation is in the journal
    let reopened = AppContext::new(temp_dir.path(), VaultConfig::default()).await.unwrap();
    let replayed = reopened.shutdown().await.unwrap();
    assert_eq!(replayed, original);
}
