use std::collections::BTreeMap;

use crate::error::{TilawahError, TilawahResult};

/// Per-word narration timestamps. `word_index` is 1-based and keys into the
/// unit's [`WordTexts`] lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WordTiming {
    pub word_index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// 1-based word index -> word text. BTreeMap keeps iteration in recitation
/// order for the degenerate full-text fallback.
pub type WordTexts = BTreeMap<u32, String>;

/// Sorts timings ascending by start time. Downstream page and state
/// computation requires this order.
pub fn sort_by_start(timings: &mut [WordTiming]) {
    timings.sort_by_key(|t| t.start_ms);
}

/// Pre-validation for timing input. Page computation itself has no error
/// path, so malformed input must be rejected here.
pub fn validate_timings(timings: &[WordTiming], word_count: usize) -> TilawahResult<()> {
    let mut prev_start = 0u64;
    for t in timings {
        if t.word_index == 0 {
            return Err(TilawahError::timing("word_index is 1-based, got 0"));
        }
        if t.word_index as usize > word_count {
            return Err(TilawahError::timing(format!(
                "word_index {} exceeds word count {}",
                t.word_index, word_count
            )));
        }
        if t.end_ms <= t.start_ms {
            return Err(TilawahError::timing(format!(
                "word {} has end_ms <= start_ms",
                t.word_index
            )));
        }
        if t.start_ms < prev_start {
            return Err(TilawahError::timing(
                "timings must be sorted ascending by start_ms",
            ));
        }
        prev_start = t.start_ms;
    }
    Ok(())
}

/// All word texts joined in recitation order, for static fallback rendering.
pub fn joined_text(words: &WordTexts) -> String {
    words.values().cloned().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32, s: u64, e: u64) -> WordTiming {
        WordTiming {
            word_index: i,
            start_ms: s,
            end_ms: e,
        }
    }

    #[test]
    fn sort_orders_by_start() {
        let mut v = vec![t(2, 500, 900), t(1, 0, 400)];
        sort_by_start(&mut v);
        assert_eq!(v[0].word_index, 1);
        assert_eq!(v[1].word_index, 2);
    }

    #[test]
    fn validate_accepts_sorted_in_range() {
        let v = vec![t(1, 0, 400), t(2, 400, 900)];
        validate_timings(&v, 2).unwrap();
    }

    #[test]
    fn validate_rejects_zero_index() {
        assert!(validate_timings(&[t(0, 0, 10)], 3).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        assert!(validate_timings(&[t(4, 0, 10)], 3).is_err());
    }

    #[test]
    fn validate_rejects_unsorted() {
        let v = vec![t(2, 500, 900), t(1, 0, 400)];
        assert!(validate_timings(&v, 2).is_err());
    }

    #[test]
    fn validate_rejects_inverted_interval() {
        assert!(validate_timings(&[t(1, 100, 100)], 1).is_err());
    }

    #[test]
    fn joined_text_is_in_index_order() {
        let mut words = WordTexts::new();
        words.insert(2, "b".to_string());
        words.insert(1, "a".to_string());
        words.insert(3, "c".to_string());
        assert_eq!(joined_text(&words), "a b c");
    }
}
