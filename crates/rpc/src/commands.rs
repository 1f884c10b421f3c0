//! CLI commands

use chrono::{DateTime, Utc};
use tranchevault_core::{AccountId, Amount, TrancheId};
use tranchevault_vault::{
    ClaimStatus, Envelope, Operation, Outbound, Query, QueryResponse, Reply, VaultReport,
};

use crate::context::{AppContext, Committed};

/// Who sends and when
pub struct Caller {
    pub sender: AccountId,
    pub at: DateTime<Utc>,
}

async fn submit(ctx: &mut AppContext, caller: &Caller, op: Operation) -> Result<Committed, anyhow::Error> {
    let envelope = Envelope::new(caller.sender.clone(), caller.at, op);
    let committed = ctx.commit(envelope).await?;
    for message in &committed.outbound {
        print_outbound(message);
    }
    for follow_up in &committed.follow_ups {
        match &follow_up.reply {
            Reply::PayoutSettled { seq_no, paid: true } => {
                println!("   ✅ payout #{} confirmed (seq: {})", seq_no, sequence(follow_up));
            }
            _ => println!("   ↪ follow-up committed (seq: {})", sequence(follow_up)),
        }
    }
    Ok(committed)
}

fn print_outbound(message: &Outbound) {
    match message {
        Outbound::PayoutRequest { seq_no, depositor, tranche, amount, .. } => {
            println!("   → payout request #{}: {} {} to {}", seq_no, amount, tranche, depositor);
        }
        Outbound::ProtocolInsolvency { claim_ref, shortfall, .. } => {
            println!("   ⚠️  insolvency on claim {}: {} unpaid", claim_ref, shortfall);
        }
        Outbound::PauseChanged { paused, .. } => {
            println!("   → vault {}", if *paused { "paused" } else { "unpaused" });
        }
        other => println!("   → message to {}", other.recipient()),
    }
}

fn sequence(committed: &Committed) -> String {
    committed
        .sequence
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Deposit into a tranche
pub async fn deposit(
    ctx: &mut AppContext,
    caller: &Caller,
    tranche: TrancheId,
    amount: Amount,
) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, Operation::Deposit { tranche, amount }).await?;
    if let Reply::Deposited { units, tranche_capital, .. } = &committed.reply {
        println!(
            "✅ Deposited {} into {} for {} ({} units, tranche capital {}, seq: {})",
            amount,
            tranche,
            caller.sender,
            units,
            tranche_capital,
            sequence(&committed)
        );
    }
    Ok(())
}

/// Start a withdrawal
pub async fn withdraw(
    ctx: &mut AppContext,
    caller: &Caller,
    tranche: TrancheId,
    amount: Amount,
    on_behalf_of: Option<AccountId>,
) -> Result<(), anyhow::Error> {
    let op = Operation::Withdraw {
        tranche,
        amount,
        on_behalf_of,
    };
    let committed = submit(ctx, caller, op).await?;
    if let Reply::WithdrawalPending { seq_no, .. } = &committed.reply {
        println!(
            "⏳ Withdrawal #{} of {} from {} pending payout (seq: {})",
            seq_no,
            amount,
            tranche,
            sequence(&committed)
        );
    }
    Ok(())
}

/// Confirm (or fail) a pending payout
pub async fn confirm(
    ctx: &mut AppContext,
    caller: &Caller,
    seq_no: u64,
    success: bool,
) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, Operation::ConfirmPayout { seq_no, success }).await?;
    if let Reply::PayoutSettled { paid, .. } = committed.reply {
        if paid {
            println!("✅ Withdrawal #{} settled", seq_no);
        } else {
            println!("↩️  Withdrawal #{} rolled back", seq_no);
        }
    }
    Ok(())
}

/// Apply an insurance claim
pub async fn claim(
    ctx: &mut AppContext,
    caller: &Caller,
    amount: Amount,
    claim_ref: &str,
) -> Result<(), anyhow::Error> {
    let op = Operation::ApplyClaim {
        amount,
        claim_ref: claim_ref.to_string(),
    };
    let committed = submit(ctx, caller, op).await?;
    if let Reply::Claim(receipt) = &committed.reply {
        for draw in &receipt.draws {
            println!("   {} absorbed {} ({} → {})", draw.tranche, draw.drawn, draw.capital_before, draw.capital_after);
        }
        match &receipt.status {
            ClaimStatus::Paid => println!("✅ Claim {} paid: {}", claim_ref, receipt.absorbed),
            ClaimStatus::Insolvent { shortfall } => println!(
                "❌ Claim {} exceeds capital: paid {}, unpaid {}",
                claim_ref, receipt.absorbed, shortfall
            ),
            ClaimStatus::Rejected { code } => println!("❌ Claim {} rejected: {}", claim_ref, code),
        }
    }
    Ok(())
}

/// Distribute a premium across tranches
pub async fn premium(
    ctx: &mut AppContext,
    caller: &Caller,
    amount: Amount,
    allocation: Option<[u8; 6]>,
) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, Operation::DistributePremium { amount, allocation }).await?;
    if let Reply::PremiumDistributed(split) = &committed.reply {
        println!("✅ Premium {} distributed (protocol fee {})", split.amount, split.protocol_fee);
        for (tranche, share) in &split.shares {
            println!("   {:<9} +{}", tranche.to_string(), share);
        }
    }
    Ok(())
}

/// Record sold coverage
pub async fn coverage(ctx: &mut AppContext, caller: &Caller, amount: Amount) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, Operation::RecordCoverage { amount }).await?;
    if let Reply::CoverageRecorded { total_coverage_sold } = committed.reply {
        println!("✅ Coverage recorded, total sold {}", total_coverage_sold);
    }
    Ok(())
}

/// Pause or unpause the vault
pub async fn set_paused(ctx: &mut AppContext, caller: &Caller, paused: bool) -> Result<(), anyhow::Error> {
    let op = if paused { Operation::Pause } else { Operation::Unpause };
    submit(ctx, caller, op).await?;
    println!("✅ Vault {}", if paused { "paused" } else { "unpaused" });
    Ok(())
}

/// Replace the float manager or claims processor
pub async fn set_address(ctx: &mut AppContext, caller: &Caller, op: Operation) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, op).await?;
    if let Reply::AddressUpdated { role, address } = committed.reply {
        println!("✅ {} is now {}", role, address);
    }
    Ok(())
}

/// Set or clear a tranche withdrawal lock
pub async fn lock(
    ctx: &mut AppContext,
    caller: &Caller,
    tranche: TrancheId,
    amount: Amount,
    until: Option<DateTime<Utc>>,
) -> Result<(), anyhow::Error> {
    submit(ctx, caller, Operation::SetTrancheLock { tranche, amount, until }).await?;
    match until {
        Some(until) => println!("🔒 {} keeps {} until {}", tranche, amount, until),
        None => println!("🔓 {} unlocked", tranche),
    }
    Ok(())
}

/// Cancel a pending withdrawal
pub async fn cancel(ctx: &mut AppContext, caller: &Caller, seq_no: u64) -> Result<(), anyhow::Error> {
    submit(ctx, caller, Operation::CancelPending { seq_no }).await?;
    println!("↩️  Withdrawal #{} cancelled", seq_no);
    Ok(())
}

/// Roll back expired withdrawals
pub async fn sweep(ctx: &mut AppContext, caller: &Caller) -> Result<(), anyhow::Error> {
    let committed = submit(ctx, caller, Operation::SweepExpired).await?;
    if let Reply::Swept { rolled_back } = committed.reply {
        println!("✅ Swept {} expired withdrawal(s) {:?}", rolled_back.len(), rolled_back);
    }
    Ok(())
}

/// Print the vault report
pub async fn status(ctx: &AppContext, at: DateTime<Utc>, json: bool) -> Result<(), anyhow::Error> {
    let QueryResponse::Report(report) = ctx.query(at, Query::Report).await? else {
        anyhow::bail!("unexpected query response");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &VaultReport) {
    println!("📊 Vault at {}{}", report.at, if report.paused { " (PAUSED)" } else { "" });
    println!("   total capital      {}", report.total_capital);
    println!("   premiums           {}", report.accumulated_premiums);
    println!("   losses             {}", report.accumulated_losses);
    println!("   protocol earned    {}", report.protocol_earned_capital);
    println!("   coverage sold      {}", report.total_coverage_sold);
    if !report.unpaid_shortfall.is_zero() {
        println!("   unpaid shortfall   {}", report.unpaid_shortfall);
    }
    println!("   pending payouts    {}", report.pending_count);
    println!();
    println!("   {:<9} {:>20} {:>16} {:>12} {:>10}", "TRANCHE", "CAPITAL", "RESERVED", "NAV", "APY bps");
    for t in &report.tranches {
        println!(
            "   {:<9} {:>20} {:>16} {:>12} {:>10}",
            t.tranche.to_string(),
            t.capital.to_string(),
            t.reserved.to_string(),
            t.nav.to_string(),
            t.current_apy_bps.round_dp(0).to_string()
        );
    }
}

/// Print NAV for one tranche or all of them
pub async fn nav(ctx: &AppContext, at: DateTime<Utc>, tranche: Option<TrancheId>) -> Result<(), anyhow::Error> {
    let tranches = match tranche {
        Some(id) => vec![id],
        None => TrancheId::ALL.to_vec(),
    };
    for id in tranches {
        if let QueryResponse::Nav(nav) = ctx.query(at, Query::TrancheNav { tranche: id }).await? {
            println!("{:<9} {}", id.to_string(), nav);
        }
    }
    Ok(())
}

/// Print a depositor's position
pub async fn position(
    ctx: &AppContext,
    at: DateTime<Utc>,
    depositor: AccountId,
    tranche: TrancheId,
) -> Result<(), anyhow::Error> {
    let query = Query::DepositorPosition {
        depositor: depositor.clone(),
        tranche,
    };
    match ctx.query(at, query).await? {
        QueryResponse::Position(Some(p)) => println!(
            "💰 {} in {}: {} units since {}, NAV {}, value {}",
            p.depositor, p.tranche, p.units, p.deposited_at, p.nav, p.value
        ),
        _ => println!("{} holds nothing in {}", depositor, tranche),
    }
    Ok(())
}
