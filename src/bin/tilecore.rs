use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tilecore::actor;
use tilecore::actor::reactor::{self, Event, Reactor};
use tilecore::common::config::{Config, config_file};
use tilecore::common::log;
use tracing::{info, warn};

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration file and report every issue found.
    Check,
    /// Replay a recorded session and print the final render tree as JSON.
    Replay { file: PathBuf },
    /// Read events from stdin, one RON value per line, and print every
    /// response as a JSON line. The final render tree is printed at the end.
    Run {
        /// Record events to the specified file path. Overwrites the file if
        /// it exists.
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let result = match opt.command {
        Commands::Check => check(&config_path),
        Commands::Replay { file } => replay(&file),
        Commands::Run { record } => {
            load_config(&config_path).and_then(|config| run(config, record.as_deref()))
        }
    };
    if let Err(err) = result {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Config::read(path).with_context(|| format!("reading {}", path.display()))
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = Config::read(path).with_context(|| format!("reading {}", path.display()))?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
        return Ok(());
    }
    for issue in &issues {
        eprintln!("{issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}

fn replay(file: &Path) -> anyhow::Result<()> {
    let reactor = reactor::replay(file, |_, _| {})?;
    println!("{}", serde_json::to_string_pretty(&reactor.layout().render_tree())?);
    Ok(())
}

fn run(config: Config, record: Option<&Path>) -> anyhow::Result<()> {
    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!("invalid config:\n{}", issues.join("\n"));
    }

    let (responses_tx, mut responses) = actor::channel();
    let reactor = Reactor::new(config, reactor::Record::new(record)?).with_responses(responses_tx);
    let (events_tx, render_rx, reactor_thread) = reactor.spawn()?;

    let printer = std::thread::spawn(move || {
        while let Some((_span, response)) = responses.blocking_recv() {
            match serde_json::to_string(&response) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(%err, "could not encode response"),
            }
        }
    });

    for (idx, line) in std::io::stdin().lock().lines().enumerate() {
        let line = line?;
        if reactor::is_blank_or_comment(&line) {
            continue;
        }
        match ron::de::from_str::<Event>(&line) {
            Ok(event) => events_tx.send(event),
            Err(err) => warn!(line = idx + 1, %err, "skipping malformed event"),
        }
    }
    drop(events_tx);

    if reactor_thread.join().is_err() {
        anyhow::bail!("reactor thread panicked");
    }
    let _ = printer.join();
    let tree = render_rx.borrow().clone();
    println!("{}", serde_json::to_string_pretty(&*tree)?);
    Ok(())
}
