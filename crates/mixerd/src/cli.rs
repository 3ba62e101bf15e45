use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "mixerd", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Per-app volume preference database path
    #[arg(long, default_value = "mixer-prefs.sqlite")]
    pub prefs_db: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track active media sessions reported by a session manifest
    Track {
        /// JSON manifest listing the live session set
        manifest: PathBuf,

        /// Print wire-encoded snapshot entries to stdout after each refresh
        #[arg(long)]
        wire: bool,
    },

    /// Manage persisted per-app volume preferences
    Prefs {
        #[command(subcommand)]
        cmd: PrefsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// List all stored preferences
    List,

    /// Show the stored preference for one package
    Get { package: String },

    /// Store volume level and mute flag for a package
    Set {
        package: String,

        /// Volume in percent
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: u8,

        /// Mute the package
        #[arg(long)]
        muted: bool,
    },

    /// Remove the stored preference for a package
    Unset { package: String },
}
