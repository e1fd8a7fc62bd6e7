//! VSLA cycle accounting and share-out core.
//!
//! Tracks member contributions (shares, welfare, penalties) and loans on an
//! append-only ledger, aggregates them per cycle, and distributes the pooled
//! fund back to members proportionally to share ownership, net of outstanding
//! loans, with at-most-once finalization per member.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod notify;
pub mod ports;
pub mod services;
pub mod validation;
