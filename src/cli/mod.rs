//! Command-line interface for accrual-sync.
//!
//! Provides commands for running the scheduler, running a single cycle,
//! and applying the database schema.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, SchedulerArgs};
