//! Deciding whether generated build files must be regenerated.
//!
//! A marker cycles between stale and fresh for the lifetime of a workspace:
//! it starts stale (never validated), becomes fresh on a successful
//! regeneration, and goes stale again when an input changes afterwards or the
//! configuration fingerprint differs.
//!
//! Writers of the validated record must be serialized externally (one build
//! per workspace at a time).  Unguarded concurrent writers are not detected;
//! whichever rename lands last wins.

use crate::fs::Timestamp;
use crate::marker::{Marker, Store, Validated};

/// Why a regeneration is needed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reason {
    /// No successful regeneration has been recorded (or the record is corrupt).
    NeverValidated,
    /// A watched input changed after the last successful regeneration.
    Modified,
    /// The configuration differs from the one last regenerated with.
    ConfigChanged,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Reason::NeverValidated => "no previous regeneration recorded",
            Reason::Modified => "files affecting the build have been updated",
            Reason::ConfigChanged => "configuration has changed since the last regeneration",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(Reason),
}

/// Evaluate a marker against the current configuration fingerprint.
pub fn freshness(marker: &Marker, fingerprint: &[u8]) -> Freshness {
    let validated = match &marker.last_validated {
        None => return Freshness::Stale(Reason::NeverValidated),
        Some(v) => v,
    };
    if let Some(modified) = marker.last_modified {
        if modified > validated.at {
            return Freshness::Stale(Reason::Modified);
        }
    }
    if validated.fingerprint != fingerprint {
        return Freshness::Stale(Reason::ConfigChanged);
    }
    Freshness::Fresh
}

pub fn is_stale(marker: &Marker, fingerprint: &[u8]) -> bool {
    freshness(marker, fingerprint) != Freshness::Fresh
}

impl Marker {
    /// Advance the modification signal; returns false for an event older than
    /// one already recorded, which leaves the marker unchanged.
    pub fn record_modification(&mut self, observed_at: Timestamp) -> bool {
        match self.last_modified {
            Some(t) if t >= observed_at => false,
            _ => {
                self.last_modified = Some(observed_at);
                true
            }
        }
    }

    pub fn record_validated(&mut self, fingerprint: &[u8], validated_at: Timestamp) {
        self.last_validated = Some(Validated {
            fingerprint: fingerprint.to_vec(),
            at: validated_at,
        });
    }
}

/// A marker plus its persistent store.
pub struct Tracker {
    store: Store,
    marker: Marker,
}

impl Tracker {
    /// Load the marker from a store; missing or corrupt state loads as
    /// never validated.
    pub fn open(store: Store) -> Self {
        let marker = store.load();
        Tracker { store, marker }
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Re-read state written by other processes.
    pub fn reload(&mut self) {
        self.marker = self.store.load();
    }

    pub fn freshness(&self, fingerprint: &[u8]) -> Freshness {
        freshness(&self.marker, fingerprint)
    }

    pub fn is_stale(&self, fingerprint: &[u8]) -> bool {
        is_stale(&self.marker, fingerprint)
    }

    /// Record that a watched input changed at observed_at.  Monotonic: an
    /// out-of-order event never moves the stored time backwards.
    pub fn record_modification(&mut self, observed_at: Timestamp) -> std::io::Result<()> {
        // Another watcher may have advanced the signal since we loaded it.
        if let Some(on_disk) = self.store.load_modified() {
            self.marker.record_modification(on_disk);
        }
        let mut updated = self.marker.clone();
        if updated.record_modification(observed_at) {
            // Only remember what reached disk, so a failed write is retried.
            self.store.write_modified(observed_at)?;
            self.marker = updated;
        }
        Ok(())
    }

    /// Durably record a successful regeneration.  Call only after the
    /// regeneration itself has completed successfully.
    pub fn record_validated(
        &mut self,
        fingerprint: &[u8],
        validated_at: Timestamp,
    ) -> std::io::Result<()> {
        let validated = Validated {
            fingerprint: fingerprint.to_vec(),
            at: validated_at,
        };
        self.store.write_validated(&validated)?;
        self.marker.record_validated(fingerprint, validated_at);
        Ok(())
    }
}
