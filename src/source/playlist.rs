//! Song selection: a fixed file, or a voting playlist
//!
//! Playlist format, one song per line, tab-separated:
//!
//! ```text
//! name<TAB>path[<TAB>voter,voter,...[<TAB>marker]]
//! ```
//!
//! The song with the most votes is played and marked so it is not picked
//! again; with no votes a random song is chosen.

use super::traits::SourceSelector;
use anyhow::{Context, Result};
use fs2::FileExt;
use rand::seq::SliceRandom;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Marker written after the votes of the song chosen to play
pub const PLAYING_MARKER: &str = "playing!";

/// Selector that always yields the same file
#[derive(Debug, Clone)]
pub struct FileSelector {
    path: PathBuf,
}

impl FileSelector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SourceSelector for FileSelector {
    fn select(&self) -> Result<PathBuf> {
        Ok(self.path.clone())
    }
}

/// One line of a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub path: PathBuf,
    /// Distinct non-blank voters, in first-seen order
    pub votes: Vec<String>,
    pub marker: Option<String>,
}

impl PlaylistEntry {
    fn parse(line: &str, line_no: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 || fields.len() > 4 {
            anyhow::bail!(
                "Invalid playlist line {}: expected 2-4 tab-separated fields, found {}",
                line_no,
                fields.len()
            );
        }

        let mut votes: Vec<String> = Vec::new();
        if let Some(raw) = fields.get(2) {
            for voter in raw.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                if !votes.iter().any(|v| v == voter) {
                    votes.push(voter.to_string());
                }
            }
        }

        Ok(Self {
            name: fields[0].to_string(),
            path: PathBuf::from(fields[1]),
            votes,
            marker: fields.get(3).map(|m| m.to_string()),
        })
    }

    fn to_line(&self) -> String {
        let mut line = format!("{}\t{}", self.name, self.path.display());
        match (&self.marker, self.votes.is_empty()) {
            (Some(marker), _) => {
                line.push('\t');
                line.push_str(&self.votes.join(","));
                line.push('\t');
                line.push_str(marker);
            }
            (None, false) => {
                line.push('\t');
                line.push_str(&self.votes.join(","));
            }
            (None, true) => {}
        }
        line
    }

    /// Songs already marked cannot win a vote
    fn eligible(&self) -> bool {
        self.marker.is_none() && !self.votes.is_empty()
    }
}

/// Parse playlist text into entries
pub fn parse_playlist(text: &str) -> Result<Vec<PlaylistEntry>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| PlaylistEntry::parse(line.trim_end_matches('\r'), i + 1))
        .collect()
}

/// Index of the eligible entry with the most votes; later lines win ties
fn most_voted(entries: &[PlaylistEntry]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, entry) in entries.iter().enumerate() {
        if !entry.eligible() {
            continue;
        }
        match best {
            Some(b) if entry.votes.len() < entries[b].votes.len() => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Selector driven by a shared, voted playlist file
#[derive(Debug, Clone)]
pub struct PlaylistSelector {
    path: PathBuf,
}

impl PlaylistSelector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_entries(&self) -> Result<Vec<PlaylistEntry>> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open playlist: {:?}", self.path))?;
        file.lock_shared()
            .with_context(|| format!("Failed to lock playlist: {:?}", self.path))?;

        let mut text = String::new();
        let read = file.read_to_string(&mut text);
        file.unlock()
            .with_context(|| format!("Failed to unlock playlist: {:?}", self.path))?;
        read.with_context(|| format!("Failed to read playlist: {:?}", self.path))?;

        parse_playlist(&text)
    }

    fn write_entries(&self, entries: &[PlaylistEntry]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open playlist for update: {:?}", self.path))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock playlist: {:?}", self.path))?;

        let mut text = String::new();
        for entry in entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        let written = write_all_at_start(&mut file, text.as_bytes());

        file.unlock()
            .with_context(|| format!("Failed to unlock playlist: {:?}", self.path))?;
        written.with_context(|| format!("Failed to update playlist: {:?}", self.path))
    }
}

fn write_all_at_start(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl SourceSelector for PlaylistSelector {
    fn select(&self) -> Result<PathBuf> {
        let mut entries = self.read_entries()?;
        if entries.is_empty() {
            anyhow::bail!("Playlist is empty: {:?}", self.path);
        }

        if let Some(winner) = most_voted(&entries) {
            log::info!(
                "Most votes: {} ({} vote(s))",
                entries[winner].name,
                entries[winner].votes.len()
            );
            entries[winner].marker = Some(PLAYING_MARKER.to_string());
            let chosen = entries[winner].path.clone();
            self.write_entries(&entries)?;
            return Ok(chosen);
        }

        let entry = entries
            .choose(&mut rand::thread_rng())
            .context("Playlist is empty")?;
        log::info!("No votes, randomly chose: {}", entry.name);
        Ok(entry.path.clone())
    }
}
