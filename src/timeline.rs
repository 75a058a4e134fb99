use crate::timing::{WordTexts, WordTiming, joined_text};

/// Minimum on-screen lifetime of a word state, seconds.
const MIN_STATE_SECS: f64 = 0.05;

/// Probe offset used to resolve the states on either side of a page
/// transition instant, seconds.
const TRANSITION_EPSILON: f64 = 0.01;

/// One text-display state: the accumulated words of the current page as of a
/// word-arrival event, and the interval during which that string is shown.
#[derive(Clone, Debug, PartialEq)]
pub struct TextState {
    pub start: f64,
    pub end: f64,
    pub page_index: usize,
    pub display_text: String,
}

/// What should be on screen at a query time `t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameQuery {
    /// Before the first word arrives: nothing to draw.
    Hidden,
    /// A single state, by index into [`TextTimeline::states`].
    Steady(usize),
    /// Inside a crossfade window around a page transition. `blend` runs
    /// 0 -> 1 across the window; 0 is fully the outgoing state, 1 fully the
    /// incoming one. Indices are absent when no state is active on that
    /// side of the transition.
    Blend {
        outgoing: Option<usize>,
        incoming: Option<usize>,
        blend: f32,
    },
}

/// The crossfade-aware display timeline of a single narration unit.
///
/// Built once per unit from sorted word timings; read-only afterwards and
/// safe to share across rendering threads.
#[derive(Clone, Debug)]
pub struct TextTimeline {
    states: Vec<TextState>,
    /// Instants at which `page_index` changes between consecutive states.
    transitions: Vec<f64>,
    crossfade: f64,
}

impl TextTimeline {
    /// Walks timing entries in start order and emits one state per entry,
    /// accumulating the current page's words. The word buffer resets when
    /// the accumulated count crosses a page boundary. Entries without a
    /// text mapping are skipped entirely.
    ///
    /// If nothing could be emitted, falls back to one static state spanning
    /// the whole unit with the complete joined text.
    pub fn build(
        sorted_timings: &[WordTiming],
        words: &WordTexts,
        unit_duration: f64,
        page_size: usize,
        crossfade: f64,
    ) -> Self {
        let mut states: Vec<TextState> = Vec::with_capacity(sorted_timings.len());
        let mut page_words: Vec<&str> = Vec::new();
        let mut accumulated = 0usize;

        for (i, seg) in sorted_timings.iter().enumerate() {
            let Some(text) = words.get(&seg.word_index) else {
                continue;
            };

            accumulated += 1;
            let page_index = (accumulated - 1) / page_size.max(1);
            if (accumulated - 1).is_multiple_of(page_size.max(1)) {
                page_words.clear();
            }
            page_words.push(text.as_str());

            let start = seg.start_ms as f64 / 1000.0;
            let mut end = match sorted_timings.get(i + 1) {
                Some(next) => next.start_ms as f64 / 1000.0,
                None => unit_duration,
            };
            if end - start < MIN_STATE_SECS {
                end = start + MIN_STATE_SECS;
            }

            states.push(TextState {
                start,
                end,
                page_index,
                display_text: page_words.join(" "),
            });
        }

        if states.is_empty() {
            states.push(TextState {
                start: 0.0,
                end: unit_duration,
                page_index: 0,
                display_text: joined_text(words),
            });
        }

        let transitions = states
            .windows(2)
            .filter(|w| w[1].page_index != w[0].page_index)
            .map(|w| w[1].start)
            .collect();

        Self {
            states,
            transitions,
            crossfade,
        }
    }

    pub fn states(&self) -> &[TextState] {
        &self.states
    }

    pub fn transitions(&self) -> &[f64] {
        &self.transitions
    }

    /// The state whose interval contains `t` (first match wins), or the last
    /// state once `t` has passed its start. `None` before the first state.
    pub fn state_at(&self, t: f64) -> Option<&TextState> {
        self.state_index_at(t).map(|i| &self.states[i])
    }

    fn state_index_at(&self, t: f64) -> Option<usize> {
        for (i, s) in self.states.iter().enumerate() {
            if s.start <= t && t < s.end {
                return Some(i);
            }
        }
        match self.states.last() {
            Some(last) if t >= last.start => Some(self.states.len() - 1),
            _ => None,
        }
    }

    /// Resolves the display decision at `t`, including the crossfade blend
    /// around page transitions. Pixel blending itself lives in
    /// [`crate::compose`]; this only decides which strings and what weight.
    pub fn frame_at(&self, t: f64) -> FrameQuery {
        let half = self.crossfade / 2.0;
        if self.crossfade > 0.0 {
            for &instant in &self.transitions {
                if instant - half <= t && t <= instant + half {
                    let blend = ((t - (instant - half)) / self.crossfade).clamp(0.0, 1.0);
                    return FrameQuery::Blend {
                        outgoing: self.state_index_at(instant - TRANSITION_EPSILON),
                        incoming: self.state_index_at(instant + TRANSITION_EPSILON),
                        blend: blend as f32,
                    };
                }
            }
        }

        match self.state_index_at(t) {
            Some(i) => FrameQuery::Steady(i),
            None => FrameQuery::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::WordTexts;

    fn t(i: u32, s: u64, e: u64) -> WordTiming {
        WordTiming {
            word_index: i,
            start_ms: s,
            end_ms: e,
        }
    }

    fn words(n: u32) -> WordTexts {
        (1..=n).map(|i| (i, format!("w{i}"))).collect()
    }

    fn evenly(n: u32, step: u64) -> Vec<WordTiming> {
        (1..=n)
            .map(|i| {
                let start = u64::from(i - 1) * step;
                t(i, start, start + step)
            })
            .collect()
    }

    #[test]
    fn display_text_accumulates_within_a_page() {
        let tl = TextTimeline::build(&evenly(3, 500), &words(3), 2.0, 12, 0.5);
        let texts: Vec<&str> = tl.states().iter().map(|s| s.display_text.as_str()).collect();
        assert_eq!(texts, vec!["w1", "w1 w2", "w1 w2 w3"]);
        for w in tl.states().windows(2) {
            assert!(w[1].display_text.split(' ').count() >= w[0].display_text.split(' ').count());
        }
    }

    #[test]
    fn buffer_resets_when_page_increments() {
        let tl = TextTimeline::build(&evenly(5, 500), &words(5), 3.0, 3, 0.5);
        let s = tl.states();
        assert_eq!(s[2].page_index, 0);
        assert_eq!(s[2].display_text, "w1 w2 w3");
        assert_eq!(s[3].page_index, 1);
        assert_eq!(s[3].display_text, "w4");
        assert_eq!(s[4].display_text, "w4 w5");
    }

    #[test]
    fn words_without_text_are_skipped() {
        let mut w = words(3);
        w.remove(&2);
        let tl = TextTimeline::build(&evenly(3, 500), &w, 2.0, 12, 0.5);
        let texts: Vec<&str> = tl.states().iter().map(|s| s.display_text.as_str()).collect();
        assert_eq!(texts, vec!["w1", "w1 w3"]);
    }

    #[test]
    fn short_intervals_get_the_minimum_floor() {
        let timings = vec![t(1, 0, 10), t(2, 20, 40)];
        let tl = TextTimeline::build(&timings, &words(2), 5.0, 12, 0.5);
        let first = &tl.states()[0];
        assert!((first.end - first.start - 0.05).abs() < 1e-9);
    }

    #[test]
    fn last_state_extends_to_unit_duration() {
        let tl = TextTimeline::build(&evenly(2, 500), &words(2), 7.5, 12, 0.5);
        assert_eq!(tl.states().last().unwrap().end, 7.5);
    }

    #[test]
    fn degenerate_input_falls_back_to_single_static_state() {
        let tl = TextTimeline::build(&[], &words(3), 4.0, 12, 0.5);
        assert_eq!(tl.states().len(), 1);
        let s = &tl.states()[0];
        assert_eq!(s.start, 0.0);
        assert_eq!(s.end, 4.0);
        assert_eq!(s.display_text, "w1 w2 w3");
        assert!(tl.transitions().is_empty());
    }

    #[test]
    fn state_at_scans_and_clamps_to_last() {
        let tl = TextTimeline::build(&evenly(3, 1000), &words(3), 4.0, 12, 0.0);
        assert_eq!(tl.state_at(0.5).unwrap().display_text, "w1");
        assert_eq!(tl.state_at(1.5).unwrap().display_text, "w1 w2");
        // At and beyond the last interval's start, the last state holds.
        assert_eq!(tl.state_at(9.0).unwrap().display_text, "w1 w2 w3");
    }

    #[test]
    fn transition_is_detected_at_page_change() {
        let tl = TextTimeline::build(&evenly(4, 1000), &words(4), 5.0, 2, 0.5);
        assert_eq!(tl.transitions(), &[2.0]);
    }

    #[test]
    fn frame_at_is_steady_outside_the_window() {
        let tl = TextTimeline::build(&evenly(4, 1000), &words(4), 5.0, 2, 0.5);
        assert!(matches!(tl.frame_at(1.0), FrameQuery::Steady(_)));
        assert!(matches!(tl.frame_at(3.5), FrameQuery::Steady(_)));
    }

    #[test]
    fn blend_runs_zero_to_one_and_is_monotonic() {
        let tl = TextTimeline::build(&evenly(4, 1000), &words(4), 5.0, 2, 0.5);
        // Transition at 2.0; window [1.75, 2.25].
        let at = |time: f64| match tl.frame_at(time) {
            FrameQuery::Blend { blend, .. } => blend,
            other => panic!("expected blend at {time}, got {other:?}"),
        };
        assert!(at(1.75) < 1e-6);
        assert!((at(2.25) - 1.0).abs() < 1e-6);
        let samples = [1.75, 1.85, 1.95, 2.05, 2.15, 2.25];
        for pair in samples.windows(2) {
            assert!(at(pair[0]) < at(pair[1]));
        }
    }

    #[test]
    fn blend_resolves_outgoing_and_incoming_states() {
        let tl = TextTimeline::build(&evenly(4, 1000), &words(4), 5.0, 2, 0.5);
        let FrameQuery::Blend {
            outgoing, incoming, ..
        } = tl.frame_at(2.0)
        else {
            panic!("expected blend at the transition instant");
        };
        assert_eq!(tl.states()[outgoing.unwrap()].display_text, "w1 w2");
        assert_eq!(tl.states()[incoming.unwrap()].display_text, "w3");
    }

    #[test]
    fn before_first_word_is_hidden() {
        let timings = vec![t(1, 2000, 2500), t(2, 2500, 3000)];
        let tl = TextTimeline::build(&timings, &words(2), 4.0, 12, 0.0);
        assert_eq!(tl.frame_at(0.5), FrameQuery::Hidden);
        assert!(tl.state_at(0.5).is_none());
    }

    #[test]
    fn zero_crossfade_never_blends() {
        let tl = TextTimeline::build(&evenly(4, 1000), &words(4), 5.0, 2, 0.0);
        assert!(matches!(tl.frame_at(2.0), FrameQuery::Steady(_)));
    }
}
