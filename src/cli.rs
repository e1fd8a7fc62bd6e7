//! Administrative CLI over the cycle accounting core.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::TransactionType;
use crate::ports::{LedgerRepository, ShareoutInsert};
use crate::services::{
    ContributionCalculator, CycleAggregator, CycleLifecycle, LedgerService, PerformanceService,
    ShareoutEngine,
};

#[derive(Parser)]
#[command(name = "vsla-core")]
#[command(about = "VSLA cycle accounting and share-out engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cycle lifecycle commands
    #[command(subcommand)]
    Cycle(CycleCommands),

    /// Ledger transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Share-out commands
    #[command(subcommand)]
    Shareout(ShareoutCommands),

    /// Reporting commands
    #[command(subcommand)]
    Report(ReportCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),
}

#[derive(Subcommand)]
pub enum CycleCommands {
    /// Open a new cycle
    Open {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        name: String,
        /// Start date (RFC 3339); defaults to now
        #[arg(long)]
        start_date: Option<DateTime<Utc>>,
    },
    /// Lock an active cycle for share-out, freezing its aggregates
    Lock {
        #[arg(long)]
        tenant: Uuid,
        #[arg(value_name = "CYCLE_ID")]
        cycle_id: Uuid,
        /// End date (RFC 3339); defaults to now
        #[arg(long)]
        end_date: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a pending ledger transaction
    Record {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        member: Uuid,
        /// share_purchase | welfare_contribution | penalty_fine | loan_issuance | loan_repayment
        #[arg(long = "type")]
        transaction_type: TransactionType,
        #[arg(long)]
        amount: BigDecimal,
        /// Share count (share purchases only)
        #[arg(long)]
        shares: Option<i64>,
    },
    /// Approve a pending transaction
    Approve {
        #[arg(long)]
        tenant: Uuid,
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
    /// Reject a pending transaction
    Reject {
        #[arg(long)]
        tenant: Uuid,
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum ShareoutCommands {
    /// Preview a member's expected share-out (non-persisting)
    Preview {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        member: Uuid,
    },
    /// Finalize one member's share-out (idempotent)
    Finalize {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        member: Uuid,
    },
    /// Finalize every eligible member of a locked cycle
    FinalizeCycle {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Cycle-wide totals recomputed from the ledger
    Totals {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
    },
    /// One member's contribution summary
    Contribution {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long)]
        member: Uuid,
    },
    /// Derived cycle performance ratios
    Performance {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        cycle: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn run(command: Commands, repo: Arc<dyn LedgerRepository>) -> anyhow::Result<()> {
    match command {
        Commands::Cycle(cmd) => {
            let lifecycle = CycleLifecycle::new(repo);
            match cmd {
                CycleCommands::Open {
                    tenant,
                    name,
                    start_date,
                } => {
                    let cycle = lifecycle
                        .open_cycle(tenant, name, start_date.unwrap_or_else(Utc::now))
                        .await?;
                    print_json(&cycle)?;
                }
                CycleCommands::Lock {
                    tenant,
                    cycle_id,
                    end_date,
                } => {
                    let cycle = lifecycle.lock_cycle(tenant, cycle_id, end_date).await?;
                    print_json(&cycle)?;
                }
            }
        }
        Commands::Tx(cmd) => {
            let ledger = LedgerService::new(repo);
            match cmd {
                TxCommands::Record {
                    tenant,
                    cycle,
                    member,
                    transaction_type,
                    amount,
                    shares,
                } => {
                    let tx = ledger
                        .record_transaction(tenant, cycle, member, transaction_type, amount, shares)
                        .await?;
                    print_json(&tx)?;
                }
                TxCommands::Approve { tenant, tx_id } => {
                    let tx = ledger.approve(tenant, tx_id).await?;
                    print_json(&tx)?;
                }
                TxCommands::Reject { tenant, tx_id } => {
                    let tx = ledger.reject(tenant, tx_id).await?;
                    print_json(&tx)?;
                }
            }
        }
        Commands::Shareout(cmd) => {
            let engine = ShareoutEngine::new(repo);
            match cmd {
                ShareoutCommands::Preview {
                    tenant,
                    cycle,
                    member,
                } => {
                    let preview = engine.expected_shareout(tenant, cycle, member).await?;
                    print_json(&preview)?;
                }
                ShareoutCommands::Finalize {
                    tenant,
                    cycle,
                    member,
                } => match engine.finalize_shareout(tenant, cycle, member).await? {
                    ShareoutInsert::Created(record) => {
                        println!("created:");
                        print_json(&record)?;
                    }
                    ShareoutInsert::Existing(record) => {
                        println!("already computed:");
                        print_json(&record)?;
                    }
                },
                ShareoutCommands::FinalizeCycle { tenant, cycle } => {
                    let records = engine.finalize_cycle(tenant, cycle).await?;
                    print_json(&records)?;
                }
            }
        }
        Commands::Report(cmd) => match cmd {
            ReportCommands::Totals { tenant, cycle } => {
                let totals = CycleAggregator::new(repo)
                    .compute_cycle_totals(tenant, cycle)
                    .await?;
                print_json(&totals)?;
            }
            ReportCommands::Contribution {
                tenant,
                cycle,
                member,
            } => {
                let summary = ContributionCalculator::new(repo)
                    .compute_member_contribution(tenant, cycle, member)
                    .await?;
                print_json(&summary)?;
            }
            ReportCommands::Performance { tenant, cycle } => {
                let performance = PerformanceService::new(repo)
                    .cycle_performance(tenant, cycle)
                    .await?;
                print_json(&performance)?;
            }
        },
        Commands::Db(DbCommands::Migrate) => {
            // Handled in main before the repository is constructed.
            unreachable!("db migrate is dispatched in main");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
