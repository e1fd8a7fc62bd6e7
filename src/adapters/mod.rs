pub mod memory_ledger_repository;
pub mod postgres_ledger_repository;

pub use memory_ledger_repository::MemoryLedgerRepository;
pub use postgres_ledger_repository::PostgresLedgerRepository;
