//! Background jobs.

mod scheduler;

pub use scheduler::start_reconciliation;
