pub mod cycle;
pub mod shareout;
pub mod transaction;

pub use cycle::{Cycle, CycleStatus};
pub use shareout::{ExpectedShareout, Shareout};
pub use transaction::{ApprovalStatus, Transaction, TransactionType};
