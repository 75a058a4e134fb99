use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};

use crate::{
    error::TilawahResult,
    quran::{surah_name_en, verse_count},
};

/// Where the generator currently stands in the mushaf, plus the reel
/// history. Persisted as a JSON state file next to the outputs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ProgressState {
    pub surah: u32,
    pub ayah: u32,
    #[serde(default)]
    pub history: Vec<ReelRecord>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            surah: 1,
            ayah: 1,
            history: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ReelRecord {
    pub surah: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub reciter: String,
    pub video_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

pub struct ProgressStore {
    path: PathBuf,
    state: ProgressState,
}

impl ProgressStore {
    /// Opens the store, starting fresh when the file does not exist yet.
    pub fn open(path: &Path) -> TilawahResult<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read progress state '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse progress state '{}'", path.display()))?
        } else {
            ProgressState::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// The next verse window of `count` ayat starting at the stored position.
    pub fn next_verses(&self, count: u32) -> TilawahResult<(u32, u32, u32)> {
        let surah = self.state.surah;
        let start = self.state.ayah;
        let end = (start + count.max(1) - 1).min(verse_count(surah)?);
        Ok((surah, start, end))
    }

    /// Moves the position past `last_ayah`, wrapping to the next surah (and
    /// back to Al-Fatihah after An-Nas).
    pub fn advance(&mut self, surah: u32, last_ayah: u32) -> TilawahResult<()> {
        let count = verse_count(surah)?;
        if last_ayah >= count {
            self.state.surah = if surah >= 114 { 1 } else { surah + 1 };
            self.state.ayah = 1;
        } else {
            self.state.surah = surah;
            self.state.ayah = last_ayah + 1;
        }
        tracing::debug!(
            surah = self.state.surah,
            ayah = self.state.ayah,
            "progress advanced"
        );
        self.save()
    }

    pub fn set_position(&mut self, surah: u32, ayah: u32) -> TilawahResult<()> {
        let count = verse_count(surah)?;
        self.state.surah = surah;
        self.state.ayah = ayah.clamp(1, count);
        self.save()
    }

    pub fn record_reel(&mut self, record: ReelRecord) -> TilawahResult<()> {
        self.state.history.push(record);
        self.save()
    }

    /// Most recent history entries, newest first.
    pub fn history(&self, limit: usize) -> Vec<&ReelRecord> {
        self.state.history.iter().rev().take(limit).collect()
    }

    /// Share of the mushaf already covered, by surah position.
    pub fn percentage_complete(&self) -> f64 {
        let done: u32 = (1..self.state.surah)
            .filter_map(|s| verse_count(s).ok())
            .sum::<u32>()
            + self.state.ayah.saturating_sub(1);
        let total: u32 = (1..=114).filter_map(|s| verse_count(s).ok()).sum();
        f64::from(done) / f64::from(total) * 100.0
    }

    pub fn describe_position(&self) -> String {
        let name = surah_name_en(self.state.surah).unwrap_or("?");
        format!(
            "Surah {} ({}) ayah {}",
            name, self.state.surah, self.state.ayah
        )
    }

    fn save(&self) -> TilawahResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create state dir '{}'", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&self.state).context("serialize progress state")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("write progress state '{}'", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ProgressStore {
        ProgressStore::open(&dir.join("progress.json")).unwrap()
    }

    #[test]
    fn fresh_store_starts_at_the_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!((store.state().surah, store.state().ayah), (1, 1));
        assert_eq!(store.next_verses(3).unwrap(), (1, 1, 3));
    }

    #[test]
    fn next_verses_clamps_to_surah_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.set_position(1, 6).unwrap();
        assert_eq!(store.next_verses(5).unwrap(), (1, 6, 7));
    }

    #[test]
    fn advance_wraps_to_the_next_surah() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.advance(1, 7).unwrap();
        assert_eq!((store.state().surah, store.state().ayah), (2, 1));

        store.advance(2, 100).unwrap();
        assert_eq!((store.state().surah, store.state().ayah), (2, 101));
    }

    #[test]
    fn advance_wraps_around_the_whole_mushaf() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.advance(114, 6).unwrap();
        assert_eq!((store.state().surah, store.state().ayah), (1, 1));
    }

    #[test]
    fn state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = store_in(dir.path());
            store.set_position(18, 10).unwrap();
            store
                .record_reel(ReelRecord {
                    surah: 18,
                    start_ayah: 1,
                    end_ayah: 3,
                    reciter: "alafasy".to_string(),
                    video_path: PathBuf::from("out.mp4"),
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        let reopened = store_in(dir.path());
        assert_eq!((reopened.state().surah, reopened.state().ayah), (18, 10));
        assert_eq!(reopened.history(5).len(), 1);
        assert_eq!(reopened.history(5)[0].end_ayah, 3);
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        for i in 1..=4 {
            store
                .record_reel(ReelRecord {
                    surah: 1,
                    start_ayah: i,
                    end_ayah: i,
                    reciter: "alafasy".to_string(),
                    video_path: PathBuf::from(format!("{i}.mp4")),
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        let recent = store.history(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].start_ayah, 4);
        assert_eq!(recent[1].start_ayah, 3);
    }

    #[test]
    fn percentage_starts_near_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.percentage_complete() < 0.1);
    }
}
