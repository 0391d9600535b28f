//! The watcher notices changes to files that affect build generation and
//! reports them to the staleness tracker.
//!
//! It polls: each pass walks the watch roots, stats every relevant file (in
//! parallel) and diffs the result against the previous pass.  The watcher only
//! ever calls Tracker::record_modification; deciding what that means is left
//! to the stale module.

use crate::fs::{FileSystem, MTime, Timestamp};
use crate::signal;
use crate::stale::Tracker;
use crate::trace;
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which files under a directory root affect generation.  Roots that name a
/// file are always relevant.
#[derive(Debug, Clone)]
pub struct Filter {
    pub names: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            names: vec!["BUILD.gn".to_owned()],
            extensions: vec!["gni".to_owned()],
        }
    }
}

impl Filter {
    pub fn matches(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.names.iter().any(|n| n == name) {
                return true;
            }
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub path: PathBuf,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        };
        write!(f, "{} {}", kind, self.path.display())
    }
}

enum Observed {
    Absent,
    /// The stat failed; keep whatever the previous pass recorded.
    Unknown,
    Unchanged,
    Changed(Event, Timestamp),
}

pub struct Watcher<'a, F: FileSystem> {
    fs: &'a F,
    roots: Vec<PathBuf>,
    filter: Filter,
    /// mtimes from the previous poll.
    seen: DashMap<PathBuf, Timestamp>,
    primed: bool,
}

impl<'a, F: FileSystem> Watcher<'a, F> {
    pub fn new(fs: &'a F, roots: Vec<PathBuf>, filter: Filter) -> Self {
        Watcher {
            fs,
            roots,
            filter,
            seen: DashMap::new(),
            primed: false,
        }
    }

    /// Collect relevant files under path.  A directory that cannot be listed
    /// is skipped for this pass and noted in `unreadable`.
    fn walk(
        &self,
        path: &Path,
        is_root: bool,
        out: &mut Vec<PathBuf>,
        unreadable: &mut Vec<PathBuf>,
    ) {
        match self.fs.children(path) {
            Ok(Some(entries)) => {
                for entry in entries {
                    self.walk(&entry, false, out, unreadable);
                }
            }
            Ok(None) => {
                if is_root || self.filter.matches(path) {
                    out.push(path.to_owned());
                }
            }
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
                unreadable.push(path.to_owned());
            }
        }
    }

    /// Compare one file against the previous pass.  Does not update the
    /// snapshot; poll does that once every stat has finished.
    fn observe(&self, path: &Path) -> Observed {
        let mtime = match self.fs.stat(path) {
            Ok(MTime::Missing) => return Observed::Absent,
            Ok(MTime::Stamp(t)) => t,
            Err(err) => {
                log::warn!("stat {}: {}", path.display(), err);
                return Observed::Unknown;
            }
        };
        let kind = match self.seen.get(path).map(|prev| *prev) {
            None => EventKind::Created,
            Some(prev) if prev != mtime => EventKind::Modified,
            Some(_) => return Observed::Unchanged,
        };
        let event = Event {
            kind,
            path: path.to_owned(),
        };
        Observed::Changed(event, mtime)
    }

    /// Scan once, returning changes since the previous scan, sorted by path.
    /// The first scan only records a baseline and reports nothing.
    ///
    /// Files that cannot be read this pass, and files under directories that
    /// cannot be listed, keep their previous state and are compared again on
    /// the next pass.
    pub fn poll(&mut self) -> Vec<Event> {
        let mut paths = Vec::new();
        let mut unreadable = Vec::new();
        for root in &self.roots {
            self.walk(root, true, &mut paths, &mut unreadable);
        }
        paths.sort();
        paths.dedup();

        let this: &Self = self;
        let observed: Vec<Observed> = trace::scope("watch.stat", || {
            paths.par_iter().map(|path| this.observe(path)).collect()
        });

        let mut present = FxHashSet::default();
        let mut events = Vec::new();
        for (path, obs) in paths.iter().zip(observed) {
            match obs {
                Observed::Absent => continue,
                Observed::Unknown | Observed::Unchanged => {}
                Observed::Changed(event, mtime) => {
                    self.seen.insert(path.clone(), mtime);
                    events.push(event);
                }
            }
            present.insert(path.as_path());
        }

        let gone: Vec<PathBuf> = self
            .seen
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|path| {
                !present.contains(path.as_path())
                    && !unreadable.iter().any(|dir| path.starts_with(dir))
            })
            .collect();
        for path in gone {
            self.seen.remove(&path);
            events.push(Event {
                kind: EventKind::Deleted,
                path,
            });
        }

        if !self.primed {
            self.primed = true;
            return Vec::new();
        }
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }
}

/// Poll until SIGINT, or until `polls` passes have run if given, recording a
/// modification in the tracker for every pass that saw a change.
///
/// A modification is stamped when its pass finishes, which is no earlier than
/// the change was seen.  If the marker cannot be written the change stays
/// pending and is recorded again on the next pass.
pub fn run<F: FileSystem>(
    watcher: &mut Watcher<F>,
    tracker: &mut Tracker,
    interval: Duration,
    polls: Option<usize>,
) {
    signal::register_sigint();
    let mut count = 0;
    let mut pending = false;
    loop {
        let events = trace::scope("watch.poll", || watcher.poll());
        for event in &events {
            log::info!("invalidating due to {}", event);
        }
        if pending || !events.is_empty() {
            match tracker.record_modification(Timestamp::now()) {
                Ok(()) => pending = false,
                Err(err) => {
                    log::error!("recording modification: {}", err);
                    pending = true;
                }
            }
        }
        count += 1;
        if polls.map_or(false, |n| count >= n) || signal::interrupted() {
            break;
        }
        std::thread::sleep(interval);
        if signal::interrupted() {
            break;
        }
    }
    log::debug!("watcher stopping after {} polls", count);
}
