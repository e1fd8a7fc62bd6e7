pub mod aggregator;
pub mod allocation;
pub mod contribution;
pub mod ledger;
pub mod lifecycle;
pub mod performance;
pub mod shareout;

pub use aggregator::{CycleAggregator, CycleTotals};
pub use contribution::{ContributionCalculator, MemberContribution};
pub use ledger::LedgerService;
pub use lifecycle::CycleLifecycle;
pub use performance::{CyclePerformance, PerformanceService};
pub use shareout::ShareoutEngine;
