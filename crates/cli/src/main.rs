//! Line-oriented driver: load a world fixture, then run commands from stdin.

mod command;
mod render;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use command::{Command, HELP};
use depot_infra::{DepotConfig, InMemoryNetwork, StorageSession, WorldFixture};

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(about = "Browse and move items across aggregated storage backends")]
struct Cli {
    /// World fixture to load (also read from `DEPOT_WORLD`).
    #[arg(env = "DEPOT_WORLD")]
    world: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    depot_observability::init();

    let path = cli.world.display();
    let json = std::fs::read_to_string(&cli.world).with_context(|| format!("failed to read world fixture {path}"))?;
    let fixture = WorldFixture::from_json_str(&json).with_context(|| format!("invalid world fixture {path}"))?;
    tracing::info!(fixture = %path, containers = fixture.containers.len(), "world fixture loaded");

    let mut config = DepotConfig::from_env().context("invalid DEPOT_* configuration")?;
    if config.local_actor.is_none() {
        config.local_actor = Some(fixture.local_actor.clone());
    }

    let network = InMemoryNetwork::from_fixture(&fixture, config.local_slots).context("failed to build world")?;
    let local = network.local_inventory()?;
    let mut session = StorageSession::new(Arc::new(network), Arc::new(local), config);

    let summary = session.refresh().context("initial scan failed")?;
    println!("{}", render::refresh(&summary));

    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = run(&mut session, command, &mut out) {
            // Routing/backend failures abort the command, not the driver.
            writeln!(out, "error: {e:#}")?;
        }
    }

    Ok(())
}

fn run(session: &mut StorageSession, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Refresh => writeln!(out, "{}", render::refresh(&session.refresh()?))?,
        Command::List => {
            for row in render::rows(&session.view()) {
                writeln!(out, "{row}")?;
            }
        }
        Command::Search(text) => {
            session.set_search(text);
            for row in render::rows(&session.view()) {
                writeln!(out, "{row}")?;
            }
        }
        Command::Sort(mode) => {
            session.set_sort_mode(mode);
            for row in render::rows(&session.view()) {
                writeln!(out, "{row}")?;
            }
        }
        Command::Withdraw { item, count } => {
            let identity = session
                .resolve_item(&item)
                .with_context(|| format!("no stored item matches `{item}`"))?;
            let outcome = session.withdraw(&identity, count)?;
            writeln!(out, "{}", render::withdrawal(&outcome))?;
        }
        Command::DepositAll => {
            let report = session.deposit_all()?;
            writeln!(out, "{}", render::deposit(&report))?;
        }
        Command::Usage => writeln!(out, "{}", render::usage(&session.usage()?))?,
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}
