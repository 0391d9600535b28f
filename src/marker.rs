//! The marker stores what is known about previous regenerations, for
//! determining whether the generated build files are up to date.
//!
//! It lives in a directory holding two small files with separate writers:
//!   modified:  written by the watcher when a relevant input changes.
//!   validated: written by the build wrapper after a regeneration succeeds.
//!
//! Each file is replaced by writing a temporary file in the same directory and
//! renaming it over the old one, so a reader sees either the old or the new
//! contents and never a partial write.  A file that fails to decode is treated
//! as absent, which can only make the marker more stale.

use crate::fs::Timestamp;
use std::io::Write;
use std::path::{Path, PathBuf};

const MODIFIED_MAGIC: &[u8; 4] = b"GNFM";
const VALIDATED_MAGIC: &[u8; 4] = b"GNFV";

/// The configuration that last regenerated successfully, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub fingerprint: Vec<u8>,
    pub at: Timestamp,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Latest time a watched input was observed changing.
    pub last_modified: Option<Timestamp>,
    /// Absent until the first successful regeneration.
    pub last_validated: Option<Validated>,
}

type Result<T> = std::result::Result<T, String>;

/// Little-endian field reader over a fully-read file.
struct BReader<'a> {
    buf: &'a [u8],
}

impl<'a> BReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(format!("truncated: wanted {} bytes, have {}", len, self.buf.len()));
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    fn magic(&mut self, magic: &[u8; 4]) -> Result<()> {
        if self.take(4)? != magic {
            return Err("bad magic".to_owned());
        }
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn finish(&self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(format!("{} trailing bytes", self.buf.len()));
        }
        Ok(())
    }
}

fn decode_modified(buf: &[u8]) -> Result<Timestamp> {
    let mut r = BReader { buf };
    r.magic(MODIFIED_MAGIC)?;
    let t = Timestamp(r.read_u64()?);
    r.finish()?;
    Ok(t)
}

fn encode_modified(t: Timestamp) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12);
    buf.extend_from_slice(MODIFIED_MAGIC);
    buf.extend_from_slice(&t.0.to_le_bytes());
    buf
}

fn decode_validated(buf: &[u8]) -> Result<Validated> {
    let mut r = BReader { buf };
    r.magic(VALIDATED_MAGIC)?;
    let at = Timestamp(r.read_u64()?);
    let len = r.read_u32()? as usize;
    let fingerprint = r.take(len)?.to_vec();
    r.finish()?;
    Ok(Validated { fingerprint, at })
}

fn encode_validated(v: &Validated) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + v.fingerprint.len());
    buf.extend_from_slice(VALIDATED_MAGIC);
    buf.extend_from_slice(&v.at.0.to_le_bytes());
    buf.extend_from_slice(&(v.fingerprint.len() as u32).to_le_bytes());
    buf.extend_from_slice(&v.fingerprint);
    buf
}

/// Read one marker file.  Missing, unreadable and corrupt files all read as
/// absent; only the last two are worth a warning.
fn read_field<T>(path: &Path, decode: fn(&[u8]) -> Result<T>) -> Option<T> {
    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            log::warn!("ignoring unreadable marker {:?}: {}", path, err);
            return None;
        }
    };
    match decode(&buf) {
        Ok(val) => Some(val),
        Err(err) => {
            log::warn!("ignoring corrupt marker {:?}: {}", path, err);
            None
        }
    }
}

/// On-disk location of a marker.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Store { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn modified_path(&self) -> PathBuf {
        self.dir.join("modified")
    }

    fn validated_path(&self) -> PathBuf {
        self.dir.join("validated")
    }

    pub fn load(&self) -> Marker {
        Marker {
            last_modified: self.load_modified(),
            last_validated: read_field(&self.validated_path(), decode_validated),
        }
    }

    pub fn load_modified(&self) -> Option<Timestamp> {
        read_field(&self.modified_path(), decode_modified)
    }

    pub fn write_modified(&self, t: Timestamp) -> std::io::Result<()> {
        self.install(&self.modified_path(), &encode_modified(t))
    }

    pub fn write_validated(&self, v: &Validated) -> std::io::Result<()> {
        self.install(&self.validated_path(), &encode_validated(v))
    }

    /// Atomically replace path with buf.
    fn install(&self, path: &Path, buf: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // The temporary must be on the same file system for rename to be atomic.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}
