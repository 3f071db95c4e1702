use crate::error::CacheError;
use crate::model::{ChannelVector, SyncRecord};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Suffix appended to the hidden cache file name
const CACHE_SUFFIX: &str = ".sync.gz";

/// Location of the cache artifact for an audio source
///
/// `/music/song.mp3` caches to `/music/.song.mp3.sync.gz`.
pub fn cache_path_for(source: &Path) -> PathBuf {
    let file_name = source.file_name().unwrap_or_else(|| source.as_os_str());

    let mut name = OsString::from(".");
    name.push(file_name);
    name.push(CACHE_SUFFIX);

    match source.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Reads and writes recorded channel sequences beside their audio sources
#[derive(Debug, Clone)]
pub struct LightSequenceCache {
    channel_count: usize,
}

impl LightSequenceCache {
    pub fn new(channel_count: usize) -> Self {
        Self { channel_count }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Load the record for `source`
    ///
    /// Returns `Ok(None)` when no cache exists. A cache that exists but
    /// cannot be decoded, or whose rows do not match the channel count,
    /// is `CacheError::Corrupt`.
    pub fn load(&self, source: &Path) -> Result<Option<SyncRecord>, CacheError> {
        let path = cache_path_for(source);

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("Cached sync data file not found: {:?}", path);
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let corrupt = |reason: String| CacheError::Corrupt {
            path: path.clone(),
            reason,
        };

        let mut text = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut text)
            .map_err(|e| corrupt(format!("decompression failed: {}", e)))?;

        let rows = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(n, line)| {
                self.parse_row(line)
                    .map_err(|reason| corrupt(format!("row {}: {}", n + 1, reason)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Err(corrupt("no rows".into()));
        }

        log::debug!("Loaded {} cached rows from {:?}", rows.len(), path);
        Ok(Some(SyncRecord::from_rows(rows)))
    }

    /// Persist `record` for `source`, replacing any previous artifact
    ///
    /// The record is written to a temporary file in the same directory and
    /// renamed into place, so readers see either the old artifact, the new
    /// one, or nothing.
    pub fn store(&self, source: &Path, record: &SyncRecord) -> Result<PathBuf, CacheError> {
        let path = cache_path_for(source);
        let store_err = |source: io::Error| CacheError::Store {
            path: path.clone(),
            source,
        };

        if record.is_empty() {
            return Err(store_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to store an empty record",
            )));
        }
        if let Some(row) = record.rows().iter().find(|r| r.len() != self.channel_count) {
            return Err(store_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("row has {} channels, expected {}", row.len(), self.channel_count),
            )));
        }

        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tmp = NamedTempFile::new_in(&dir).map_err(store_err)?;
        let mut encoder = GzEncoder::new(tmp, Compression::default());
        encoder
            .write_all(encode_rows(record).as_bytes())
            .map_err(store_err)?;
        let tmp = encoder.finish().map_err(store_err)?;
        tmp.as_file().sync_all().map_err(store_err)?;
        tmp.persist(&path).map_err(|e| store_err(e.error))?;

        log::info!(
            "Cached sync data written to {:?} [{} rows]",
            path,
            record.len()
        );
        Ok(path)
    }

    fn parse_row(&self, line: &str) -> Result<ChannelVector, String> {
        let states = line
            .split(',')
            .map(|field| match field.trim() {
                "1" => Ok(true),
                "0" => Ok(false),
                other => Err(format!("invalid field {:?}", other)),
            })
            .collect::<Result<Vec<bool>, String>>()?;

        if states.len() != self.channel_count {
            return Err(format!(
                "{} fields, expected {}",
                states.len(),
                self.channel_count
            ));
        }
        Ok(ChannelVector::new(states))
    }
}

fn encode_rows(record: &SyncRecord) -> String {
    let mut out = String::with_capacity(record.len() * record.channel_count().unwrap_or(0) * 2);
    for row in record.rows() {
        let fields: Vec<&str> = row
            .states()
            .iter()
            .map(|&on| if on { "1" } else { "0" })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
