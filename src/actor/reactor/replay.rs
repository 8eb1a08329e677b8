use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use tracing::warn;

use super::{Event, Reactor};
use crate::common::config::Config;

/// Writes the config and then every event the reactor sees, one RON value
/// per line, so a session can be replayed exactly.
pub struct Record {
    file: Option<BufWriter<File>>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => Some(BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            )),
            None => None,
        };
        Ok(Self { file })
    }

    pub fn disabled() -> Self { Self { file: None } }

    pub(super) fn start(&mut self, config: &Config) {
        let Some(file) = self.file.as_mut() else { return };
        if let Err(err) = write_line(file, config) {
            warn!(%err, "recording stopped");
            self.file = None;
        }
    }

    pub(super) fn on_event(&mut self, event: &Event) {
        let Some(file) = self.file.as_mut() else { return };
        if let Err(err) = write_line(file, event) {
            warn!(%err, "recording stopped");
            self.file = None;
        }
    }
}

fn write_line(file: &mut BufWriter<File>, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let line = ron::ser::to_string(value)?;
    writeln!(file, "{line}")?;
    file.flush()?;
    Ok(())
}

/// Blank lines and `//` comments are allowed in hand-written event scripts.
pub fn is_blank_or_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with("//")
}

/// Feeds a recording back through a fresh reactor. `on_event` sees each
/// event after it has been applied.
pub fn replay(path: &Path, mut on_event: impl FnMut(&Reactor, &Event)) -> anyhow::Result<Reactor> {
    let file = BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?);
    let mut lines = file.lines();
    let config: Config = match lines.next() {
        Some(line) => ron::de::from_str(&line?).context("reading recorded config")?,
        None => anyhow::bail!("{} is empty", path.display()),
    };
    let mut reactor = Reactor::new(config, Record::disabled());
    for (idx, line) in lines.enumerate() {
        let line = line?;
        if is_blank_or_comment(&line) {
            continue;
        }
        let event: Event = ron::de::from_str(&line)
            .with_context(|| format!("line {} of {}", idx + 2, path.display()))?;
        let _ = reactor.handle_event(event.clone());
        on_event(&reactor, &event);
    }
    Ok(reactor)
}
