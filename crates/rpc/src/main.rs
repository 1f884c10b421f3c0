//! TrancheVault CLI - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tranchevault_bus::PayoutConfirmer;
use tranchevault_core::{AccountId, Amount, TrancheId};
use tranchevault_rpc::commands::{self, Caller};
use tranchevault_rpc::AppContext;
use tranchevault_vault::{Operation, VaultConfig};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tranchevault")]
#[command(about = "TrancheVault - tranched insurance capital vault", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Vault configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account sending the operation
    #[arg(short, long, default_value = "admin")]
    sender: String,

    /// Logical time of the operation (RFC 3339); now when omitted
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Pay withdrawals at once, acting as the float manager
    #[arg(long)]
    auto_confirm: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deposit into a tranche
    Deposit {
        /// BTC, SNR, MEZZ, JNR, JNR_PLUS or EQT
        tranche: TrancheId,
        amount: Amount,
    },

    /// Start a withdrawal (settled by `confirm`)
    Withdraw {
        tranche: TrancheId,
        amount: Amount,
        /// Withdraw for another depositor (admin / float manager)
        #[arg(long)]
        on_behalf_of: Option<String>,
    },

    /// Confirm a payout requested by a withdrawal
    Confirm {
        seq_no: u64,
        /// Report the payout as failed and roll the withdrawal back
        #[arg(long)]
        failed: bool,
    },

    /// Apply an insurance claim through the loss waterfall
    Claim {
        amount: Amount,
        /// Claim reference; generated when omitted
        #[arg(long)]
        claim_ref: Option<String>,
    },

    /// Distribute a premium across tranches
    Premium {
        amount: Amount,
        /// Six comma-separated percentages, senior first
        #[arg(long, value_delimiter = ',', num_args = 6)]
        allocation: Option<Vec<u8>>,
    },

    /// Record coverage sold
    Coverage { amount: Amount },

    /// Pause the vault
    Pause,

    /// Unpause the vault
    Unpause,

    /// Replace the float manager
    SetFloatManager { address: String },

    /// Replace the claims processor
    SetClaimsProcessor { address: String },

    /// Set a tranche withdrawal lock, or clear it without --until
    Lock {
        tranche: TrancheId,
        amount: Amount,
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },

    /// Cancel a pending withdrawal
    Cancel { seq_no: u64 },

    /// Roll back expired withdrawals
    Sweep,

    /// Show the vault report
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show tranche NAV
    Nav { tranche: Option<TrancheId> },

    /// Show a depositor's position
    Position { depositor: String, tranche: TrancheId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => VaultConfig::from_file(path)?,
        None => VaultConfig::default(),
    };
    let mut ctx = AppContext::new(&cli.data, config).await?;
    if cli.auto_confirm {
        let float_manager = ctx.vault().snapshot().await?.roles().float_manager.clone();
        ctx.register(Arc::new(PayoutConfirmer::new(float_manager)));
    }

    let caller = Caller {
        sender: cli.sender.parse::<AccountId>()?,
        at: cli.at.unwrap_or_else(Utc::now),
    };

    match cli.command {
        Commands::Deposit { tranche, amount } => {
            commands::deposit(&mut ctx, &caller, tranche, amount).await?;
        }

        Commands::Withdraw {
            tranche,
            amount,
            on_behalf_of,
        } => {
            let on_behalf_of = on_behalf_of.map(|s| s.parse::<AccountId>()).transpose()?;
            commands::withdraw(&mut ctx, &caller, tranche, amount, on_behalf_of).await?;
        }

        Commands::Confirm { seq_no, failed } => {
            commands::confirm(&mut ctx, &caller, seq_no, !failed).await?;
        }

        Commands::Claim { amount, claim_ref } => {
            let claim_ref = claim_ref.unwrap_or_else(|| Uuid::new_v4().to_string());
            commands::claim(&mut ctx, &caller, amount, &claim_ref).await?;
        }

        Commands::Premium { amount, allocation } => {
            let allocation = match allocation {
                Some(pcts) => Some(
                    <[u8; 6]>::try_from(pcts)
                        .map_err(|_| anyhow::anyhow!("allocation needs six percentages"))?,
                ),
                None => None,
            };
            commands::premium(&mut ctx, &caller, amount, allocation).await?;
        }

        Commands::Coverage { amount } => {
            commands::coverage(&mut ctx, &caller, amount).await?;
        }

        Commands::Pause => commands::set_paused(&mut ctx, &caller, true).await?,

        Commands::Unpause => commands::set_paused(&mut ctx, &caller, false).await?,

        Commands::SetFloatManager { address } => {
            let op = Operation::SetFloatManager {
                address: address.parse()?,
            };
            commands::set_address(&mut ctx, &caller, op).await?;
        }

        Commands::SetClaimsProcessor { address } => {
            let op = Operation::SetClaimsProcessor {
                address: address.parse()?,
            };
            commands::set_address(&mut ctx, &caller, op).await?;
        }

        Commands::Lock {
            tranche,
            amount,
            until,
        } => {
            commands::lock(&mut ctx, &caller, tranche, amount, until).await?;
        }

        Commands::Cancel { seq_no } => commands::cancel(&mut ctx, &caller, seq_no).await?,

        Commands::Sweep => commands::sweep(&mut ctx, &caller).await?,

        Commands::Status { json } => commands::status(&ctx, caller.at, json).await?,

        Commands::Nav { tranche } => commands::nav(&ctx, caller.at, tranche).await?,

        Commands::Position { depositor, tranche } => {
            commands::position(&ctx, caller.at, depositor.parse()?, tranche).await?;
        }
    }

    ctx.shutdown().await?;
    Ok(())
}
