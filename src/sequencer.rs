use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    error::{TilawahError, TilawahResult},
    timing::{WordTexts, WordTiming},
};

/// Everything fetched for one narration unit, before reel placement.
#[derive(Clone, Debug)]
pub struct UnitData {
    pub text: String,
    pub translation: String,
    pub audio_path: PathBuf,
    pub audio_duration: f64,
    pub word_timings: Vec<WordTiming>,
    pub word_texts: WordTexts,
}

/// One placed narration unit. Created by the sequencer, read-only afterwards.
#[derive(Clone, Debug)]
pub struct NarrationUnit {
    /// Ayah number within the reel's surah.
    pub unit_id: u32,
    pub audio_path: PathBuf,
    pub audio_duration: f64,
    pub start_time_in_reel: f64,
    /// `start_time_in_reel + audio_duration + inter_unit_padding`.
    pub segment_end: f64,
    pub text: String,
    pub translation: String,
    pub word_timings: Vec<WordTiming>,
    pub word_texts: WordTexts,
}

impl NarrationUnit {
    /// On-screen lifetime of the unit, padding included.
    pub fn display_duration(&self) -> f64 {
        self.segment_end - self.start_time_in_reel
    }
}

/// The assembled reel: ordered units plus the final total duration.
/// Immutable once handed to the renderer.
#[derive(Clone, Debug, Default)]
pub struct ReelTimeline {
    pub units: Vec<NarrationUnit>,
    pub total_duration: f64,
}

impl ReelTimeline {
    /// The unit on screen at reel time `t`, if any.
    pub fn unit_at(&self, t: f64) -> Option<&NarrationUnit> {
        self.units
            .iter()
            .find(|u| u.start_time_in_reel <= t && t < u.segment_end)
    }
}

/// Fetches narration unit data by index (ayah number). Implementations may
/// block on network or disk; failures are hard failures for the whole reel.
pub trait UnitSource {
    fn fetch(&mut self, index: u32) -> TilawahResult<UnitData>;
}

/// Cooperative cancellation flag, checked between unit fetches.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Duration policy and index range for one assembly run.
#[derive(Clone, Debug)]
pub struct SequencerConfig {
    pub start_index: u32,
    /// Last requested index, inclusive. The actual end may differ.
    pub requested_end_index: u32,
    /// Highest index available from the source (verse count of the surah).
    pub max_index: u32,
    pub min_duration: f64,
    pub max_content_duration: f64,
    pub inter_unit_padding: f64,
    pub lead_in: f64,
    pub trailing_buffer: f64,
}

/// Assembly outcome. `actual_end_index` can fall short of the request (cap)
/// or exceed it (extension to the minimum duration).
#[derive(Clone, Debug)]
pub struct AssembledReel {
    pub timeline: ReelTimeline,
    pub actual_start_index: u32,
    pub actual_end_index: u32,
    pub capped: bool,
}

/// Sequences narration units back to back under the global duration policy:
/// accumulate the requested range, extend while below the minimum, stop
/// before any unit that would break the maximum, and cap the total as a
/// safety net.
pub struct UnitSequencer;

impl UnitSequencer {
    #[tracing::instrument(skip(source, cancel))]
    pub fn assemble(
        source: &mut dyn UnitSource,
        cfg: &SequencerConfig,
        cancel: &CancelToken,
    ) -> TilawahResult<AssembledReel> {
        let mut units: Vec<NarrationUnit> = Vec::new();
        let mut current_time = cfg.lead_in;
        let mut index = cfg.start_index;
        let mut capped = false;

        // ACCUMULATING: fetch the requested range, stopping short of any
        // unit that would push past the maximum.
        while index <= cfg.requested_end_index {
            match Self::try_append(source, cfg, cancel, &mut units, &mut current_time, index)? {
                Appended::Yes => index += 1,
                Appended::WouldExceedMax => {
                    capped = true;
                    tracing::warn!(
                        unit = index,
                        "unit would exceed the maximum duration, stopping early"
                    );
                    break;
                }
            }
        }

        if units.is_empty() {
            return Err(TilawahError::validation(
                "no units fit within the maximum reel duration",
            ));
        }

        let mut total_duration = current_time + cfg.trailing_buffer;

        // EXTENDING: pull more units while below the minimum.
        while total_duration < cfg.min_duration
            && index <= cfg.max_index
            && total_duration < cfg.max_content_duration
        {
            tracing::info!(
                total = total_duration,
                unit = index,
                "below minimum duration, extending"
            );
            match Self::try_append(source, cfg, cancel, &mut units, &mut current_time, index)? {
                Appended::Yes => {
                    index += 1;
                    total_duration = current_time + cfg.trailing_buffer;
                }
                Appended::WouldExceedMax => break,
            }
        }

        // CAPPED: truncate the total, never the already-appended units.
        if total_duration > cfg.max_content_duration {
            tracing::warn!(
                total = total_duration,
                max = cfg.max_content_duration,
                "capping reel duration"
            );
            total_duration = cfg.max_content_duration;
            capped = true;
        }

        // FINALIZED.
        let actual_end_index = units.last().map(|u| u.unit_id).unwrap_or(cfg.start_index);
        tracing::info!(
            units = units.len(),
            total = total_duration,
            "reel assembled"
        );

        Ok(AssembledReel {
            timeline: ReelTimeline {
                units,
                total_duration,
            },
            actual_start_index: cfg.start_index,
            actual_end_index,
            capped,
        })
    }

    fn try_append(
        source: &mut dyn UnitSource,
        cfg: &SequencerConfig,
        cancel: &CancelToken,
        units: &mut Vec<NarrationUnit>,
        current_time: &mut f64,
        index: u32,
    ) -> TilawahResult<Appended> {
        if cancel.is_cancelled() {
            return Err(TilawahError::Cancelled);
        }

        let data = source.fetch(index)?;
        let start = *current_time;
        let segment_end = start + data.audio_duration + cfg.inter_unit_padding;
        let projected = segment_end + cfg.trailing_buffer;

        if !units.is_empty() && projected > cfg.max_content_duration {
            return Ok(Appended::WouldExceedMax);
        }

        tracing::debug!(
            unit = index,
            start,
            duration = data.audio_duration,
            "unit placed"
        );
        units.push(NarrationUnit {
            unit_id: index,
            audio_path: data.audio_path,
            audio_duration: data.audio_duration,
            start_time_in_reel: start,
            segment_end,
            text: data.text,
            translation: data.translation,
            word_timings: data.word_timings,
            word_texts: data.word_texts,
        });
        *current_time = segment_end;
        Ok(Appended::Yes)
    }
}

enum Appended {
    Yes,
    WouldExceedMax,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        durations: Vec<f64>,
        fail_at: Option<u32>,
        fetches: u32,
    }

    impl FixedSource {
        fn new(durations: Vec<f64>) -> Self {
            Self {
                durations,
                fail_at: None,
                fetches: 0,
            }
        }
    }

    impl UnitSource for FixedSource {
        fn fetch(&mut self, index: u32) -> TilawahResult<UnitData> {
            self.fetches += 1;
            if self.fail_at == Some(index) {
                return Err(TilawahError::fetch(format!("1:{index}"), "boom"));
            }
            let duration = self
                .durations
                .get(index as usize - 1)
                .copied()
                .ok_or_else(|| TilawahError::fetch(format!("1:{index}"), "out of range"))?;
            Ok(UnitData {
                text: format!("text {index}"),
                translation: format!("translation {index}"),
                audio_path: PathBuf::from(format!("a{index}.mp3")),
                audio_duration: duration,
                word_timings: Vec::new(),
                word_texts: WordTexts::new(),
            })
        }
    }

    fn cfg(start: u32, end: u32, max_index: u32) -> SequencerConfig {
        SequencerConfig {
            start_index: start,
            requested_end_index: end,
            max_index,
            min_duration: 0.0,
            max_content_duration: 59.0,
            inter_unit_padding: 0.5,
            lead_in: 0.1,
            trailing_buffer: 0.5,
        }
    }

    #[test]
    fn units_are_placed_back_to_back() {
        let mut source = FixedSource::new(vec![4.0, 6.0, 3.0]);
        let reel =
            UnitSequencer::assemble(&mut source, &cfg(1, 3, 3), &CancelToken::new()).unwrap();

        let units = &reel.timeline.units;
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].start_time_in_reel, 0.1);
        assert!((units[0].segment_end - 4.6).abs() < 1e-9);
        assert!((units[1].start_time_in_reel - 4.6).abs() < 1e-9);
        assert!((units[1].segment_end - 11.1).abs() < 1e-9);
        assert!((units[2].start_time_in_reel - 11.1).abs() < 1e-9);
        assert!((reel.timeline.total_duration - 15.1).abs() < 1e-9);
        assert_eq!(reel.actual_end_index, 3);
        assert!(!reel.capped);
    }

    #[test]
    fn stops_before_unit_that_would_exceed_max() {
        let mut source = FixedSource::new(vec![20.0, 20.0, 30.0]);
        let reel =
            UnitSequencer::assemble(&mut source, &cfg(1, 3, 3), &CancelToken::new()).unwrap();

        assert_eq!(reel.timeline.units.len(), 2);
        assert_eq!(reel.actual_end_index, 2);
        assert!(reel.capped);
        assert!(reel.timeline.total_duration <= 59.0);
    }

    #[test]
    fn first_unit_is_always_included_then_capped() {
        // A single unit longer than the maximum still goes in; the total is
        // truncated at render time instead.
        let mut source = FixedSource::new(vec![80.0]);
        let reel =
            UnitSequencer::assemble(&mut source, &cfg(1, 1, 1), &CancelToken::new()).unwrap();

        assert_eq!(reel.timeline.units.len(), 1);
        assert!(reel.capped);
        assert_eq!(reel.timeline.total_duration, 59.0);
    }

    #[test]
    fn extends_until_minimum_is_met() {
        let mut source = FixedSource::new(vec![5.0; 10]);
        let mut config = cfg(1, 2, 10);
        config.min_duration = 30.0;
        let reel = UnitSequencer::assemble(&mut source, &config, &CancelToken::new()).unwrap();

        assert!(reel.timeline.total_duration >= 30.0);
        assert!(reel.actual_end_index > 2);
        assert!(reel.timeline.total_duration <= 59.0);
    }

    #[test]
    fn extension_stops_at_source_exhaustion() {
        let mut source = FixedSource::new(vec![5.0; 3]);
        let mut config = cfg(1, 1, 3);
        config.min_duration = 50.0;
        let reel = UnitSequencer::assemble(&mut source, &config, &CancelToken::new()).unwrap();

        assert_eq!(reel.timeline.units.len(), 3);
        assert!(reel.timeline.total_duration < 50.0);
    }

    #[test]
    fn extension_respects_the_maximum() {
        let mut source = FixedSource::new(vec![10.0; 20]);
        let mut config = cfg(1, 1, 20);
        config.min_duration = 58.0;
        let reel = UnitSequencer::assemble(&mut source, &config, &CancelToken::new()).unwrap();

        assert!(reel.timeline.total_duration <= 59.0);
        for w in reel.timeline.units.windows(2) {
            assert_eq!(w[1].start_time_in_reel, w[0].segment_end);
        }
    }

    #[test]
    fn first_fetch_failure_propagates() {
        let mut source = FixedSource::new(vec![5.0; 3]);
        source.fail_at = Some(1);
        let err = UnitSequencer::assemble(&mut source, &cfg(1, 3, 3), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TilawahError::Fetch { .. }));
    }

    #[test]
    fn mid_sequence_failure_propagates_without_partial_reel() {
        let mut source = FixedSource::new(vec![5.0; 3]);
        source.fail_at = Some(2);
        let err = UnitSequencer::assemble(&mut source, &cfg(1, 3, 3), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TilawahError::Fetch { .. }));
    }

    #[test]
    fn cancellation_is_checked_before_each_fetch() {
        let mut source = FixedSource::new(vec![5.0; 3]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = UnitSequencer::assemble(&mut source, &cfg(1, 3, 3), &cancel).unwrap_err();
        assert!(matches!(err, TilawahError::Cancelled));
        assert_eq!(source.fetches, 0);
    }

    #[test]
    fn unit_at_finds_the_active_unit() {
        let mut source = FixedSource::new(vec![4.0, 6.0]);
        let reel =
            UnitSequencer::assemble(&mut source, &cfg(1, 2, 2), &CancelToken::new()).unwrap();
        let tl = &reel.timeline;

        assert_eq!(tl.unit_at(0.5).unwrap().unit_id, 1);
        assert_eq!(tl.unit_at(5.0).unwrap().unit_id, 2);
        assert!(tl.unit_at(0.0).is_none()); // before the lead-in
        assert!(tl.unit_at(14.0).is_none()); // past the last segment
    }
}
