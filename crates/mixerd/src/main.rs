//! Volume mixer daemon: tracks active media playback sessions on the
//! host and reports the live set to UI consumers.
//!
//! ## Modes
//! - `track`: follow a session manifest and report every snapshot change.
//! - `prefs`: manage persisted per-app volume preferences.

mod cli;
mod config;
mod file_source;
mod prefs;
mod runtime;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,mixerd=info")
        }))
        .init();

    match args.cmd {
        cli::Command::Track { manifest, wire } => runtime::run_track(
            config::TrackConfig {
                manifest,
                prefs_db: args.prefs_db,
                emit_wire: wire,
            },
            true,
        ),
        cli::Command::Prefs { cmd } => run_prefs(&args.prefs_db, cmd),
    }
}

fn run_prefs(db_path: &std::path::Path, cmd: cli::PrefsCommand) -> Result<()> {
    let store = prefs::PrefsStore::open(db_path)?;
    match cmd {
        cli::PrefsCommand::List => {
            for pref in store.list()? {
                print_pref(&pref);
            }
        }
        cli::PrefsCommand::Get { package } => match store.get(&package)? {
            Some(pref) => print_pref(&pref),
            None => println!("no preference stored for {package}"),
        },
        cli::PrefsCommand::Set {
            package,
            volume,
            muted,
        } => {
            store.upsert(&prefs::VolumePreference {
                package: package.clone(),
                volume_level: volume,
                muted,
            })?;
            tracing::info!(package = %package, volume, muted, "preference stored");
        }
        cli::PrefsCommand::Unset { package } => {
            if store.delete(&package)? {
                tracing::info!(package = %package, "preference removed");
            } else {
                tracing::warn!(package = %package, "no preference stored");
            }
        }
    }
    Ok(())
}

fn print_pref(pref: &prefs::VolumePreference) {
    println!(
        "{}\t{}%\t{}",
        pref.package,
        pref.volume_level,
        if pref.muted { "muted" } else { "unmuted" }
    );
}
