//! Regenerating build files only when they are stale.

use crate::fs::Timestamp;
use crate::marker::Store;
use crate::stale::{Freshness, Tracker};
use crate::{load, trace, watch};
use anyhow::{anyhow, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything the regeneration wrapper and watcher need, passed explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Dependency dump written by the generator, checked after regenerating.
    pub graph: Option<PathBuf>,
    /// Files and directories whose changes affect generation.
    pub watch_roots: Vec<PathBuf>,
    /// Which files under directory roots are relevant.
    pub filter: watch::Filter,
    /// Where the staleness marker lives.
    pub marker_dir: PathBuf,
    /// Command line of the generator, e.g. ["gn", "gen", "out/bazel"].
    pub command: Vec<String>,
    /// Identifies the configuration; a change forces regeneration.
    pub fingerprint: Vec<u8>,
    pub poll_interval: Duration,
}

impl Config {
    pub fn new(marker_dir: impl Into<PathBuf>, fingerprint: Vec<u8>) -> Self {
        Config {
            graph: None,
            watch_roots: Vec::new(),
            filter: watch::Filter::default(),
            marker_dir: marker_dir.into(),
            command: Vec::new(),
            fingerprint,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn store(&self) -> Store {
        Store::new(&self.marker_dir)
    }
}

/// The default fingerprint: the absolute path of the generator's output
/// directory, so pointing at a different output directory regenerates.
pub fn default_fingerprint(out_dir: &Path) -> anyhow::Result<Vec<u8>> {
    let abs = std::env::current_dir()?.join(out_dir);
    let s = abs
        .to_str()
        .ok_or_else(|| anyhow!("non-utf8 output directory {:?}", abs))?;
    Ok(s.as_bytes().to_vec())
}

/// Runs the regeneration step.
pub trait Invoker {
    /// Returns Ok(false) when the step ran but failed.
    fn invoke(&mut self) -> anyhow::Result<bool>;
}

/// Invoker that runs an external command.
pub struct CommandInvoker {
    argv: Vec<String>,
}

impl CommandInvoker {
    pub fn new(argv: Vec<String>) -> anyhow::Result<Self> {
        if argv.is_empty() {
            bail!("no command given");
        }
        Ok(CommandInvoker { argv })
    }

    /// Run the command to completion and return its exit code.  A command
    /// killed by a signal reports 1.
    pub fn run(&self) -> anyhow::Result<i32> {
        log::info!("running {}", self.argv.join(" "));
        let status = std::process::Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .status()
            .map_err(|err| anyhow!("spawn {:?}: {}", self.argv[0], err))?;
        Ok(status.code().unwrap_or(1))
    }
}

impl Invoker for CommandInvoker {
    fn invoke(&mut self) -> anyhow::Result<bool> {
        let code = self.run()?;
        if code != 0 {
            log::error!("{} failed with exit code {}", self.argv[0], code);
        }
        Ok(code == 0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegenResult {
    /// Marker was fresh; nothing ran.
    UpToDate,
    /// The invoker ran and succeeded; the marker is fresh again.
    Regenerated,
    /// The invoker ran and failed; the marker stays stale.
    Failed,
}

/// Regenerate if the marker is stale, recording success.
pub fn ensure_fresh(config: &Config, invoker: &mut dyn Invoker) -> anyhow::Result<RegenResult> {
    let mut tracker = Tracker::open(config.store());
    let reason = match tracker.freshness(&config.fingerprint) {
        Freshness::Fresh => return Ok(RegenResult::UpToDate),
        Freshness::Stale(reason) => reason,
    };
    log::info!("{}", reason);

    // Stamp before running, so inputs edited while the generator runs leave
    // the marker stale.
    let started = Timestamp::now();
    if !trace::scope("regen.invoke", || invoker.invoke())? {
        return Ok(RegenResult::Failed);
    }
    if let Some(graph) = &config.graph {
        let graph = load::read(graph)?;
        log::info!("regenerated build describes {} targets", graph.len());
    }
    tracker.record_validated(&config.fingerprint, started)?;
    Ok(RegenResult::Regenerated)
}
