//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::state::VersionRecord;

/// Tuning knobs for the update-coordination engine
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Persisted builds below this value force an update unconditionally
    pub min_build_to_force_update: u32,
    /// How long the countdown runs before an optional update fires
    pub countdown_duration: Duration,
    /// How long without interaction counts the user as inactive
    pub inactivity_threshold: Duration,
    /// Maximum number of postpones before an update is forced through
    pub max_postpone_count: u32,
    /// UI-settle delay before a forced update fires
    pub update_delay: Duration,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            min_build_to_force_update: 150,
            countdown_duration: Duration::from_millis(60_000),
            inactivity_threshold: Duration::from_millis(30_000),
            max_postpone_count: 3,
            update_delay: Duration::from_millis(3_000),
        }
    }
}

/// CLI argument parsing structure for the demo binary
#[derive(Parser)]
#[command(name = "versynch")]
#[command(about = "Coordinate version checks and cache invalidation for a simulated client session")]
#[command(version = "2.1.0")]
pub struct Config {
    /// Version string the host application was shipped with
    #[arg(long, default_value = "2.1.0")]
    pub app_version: String,

    /// Build number the host application was shipped with
    #[arg(long, default_value = "210")]
    pub build: u32,

    /// Persisted builds below this value force an update
    #[arg(long, default_value = "150")]
    pub min_build_to_force_update: u32,

    /// Countdown duration before auto-updating, in milliseconds
    #[arg(long, default_value = "60000")]
    pub countdown_ms: u64,

    /// Inactivity threshold, in milliseconds
    #[arg(long, default_value = "30000")]
    pub inactivity_ms: u64,

    /// Maximum number of times the update can be postponed
    #[arg(long, default_value = "3")]
    pub max_postpone_count: u32,

    /// Delay before a forced update fires, in milliseconds
    #[arg(long, default_value = "3000")]
    pub update_delay_ms: u64,

    /// Path of the persisted version store
    #[arg(long, default_value = "versynch-store.json")]
    pub store_path: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// The version record the host application presents to the checker
    pub fn current_record(&self) -> VersionRecord {
        VersionRecord::new(self.app_version.clone(), self.build)
    }

    /// Engine options derived from the CLI flags
    pub fn options(&self) -> UpdateOptions {
        UpdateOptions {
            min_build_to_force_update: self.min_build_to_force_update,
            countdown_duration: Duration::from_millis(self.countdown_ms),
            inactivity_threshold: Duration::from_millis(self.inactivity_ms),
            max_postpone_count: self.max_postpone_count,
            update_delay: Duration::from_millis(self.update_delay_ms),
        }
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
