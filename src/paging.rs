use crate::timing::WordTiming;

/// One display page: a contiguous run of words shown together, with the time
/// window during which it is on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    pub page_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub word_start_idx: usize,
    pub word_end_idx: usize, // inclusive
}

impl Page {
    pub fn word_span(&self) -> usize {
        self.word_end_idx - self.word_start_idx + 1
    }
}

/// Computes page windows from sorted word timings.
///
/// Input must be sorted ascending by `start_ms` (see
/// [`crate::timing::validate_timings`]); unsorted or out-of-range input
/// yields undefined page bounds, not an error. An empty timing list returns
/// an empty page list and the caller falls back to one static
/// full-duration page.
///
/// A page whose word range matched no timing entry inherits a zero-width
/// window at the previous page's end rather than an inverted sentinel
/// window. The first page is always pinned to 0.0 and the last to
/// `unit_duration`.
pub fn compute_pages(
    sorted_timings: &[WordTiming],
    word_count: usize,
    unit_duration: f64,
    page_size: usize,
) -> Vec<Page> {
    if sorted_timings.is_empty() || word_count == 0 || page_size == 0 {
        return Vec::new();
    }

    let num_pages = word_count.div_ceil(page_size).max(1);
    let mut pages = Vec::with_capacity(num_pages);

    for p in 0..num_pages {
        let w_start = p * page_size;
        let w_end = ((p + 1) * page_size - 1).min(word_count - 1);

        let mut start_time = unit_duration;
        let mut end_time = 0.0f64;
        let mut matched = false;

        for seg in sorted_timings {
            let idx = seg.word_index as usize - 1; // timings are 1-based
            if w_start <= idx && idx <= w_end {
                matched = true;
                start_time = start_time.min(seg.start_ms as f64 / 1000.0);
                end_time = end_time.max(seg.end_ms as f64 / 1000.0);
            }
        }

        if !matched {
            let prev_end = pages.last().map_or(0.0, |prev: &Page| prev.end_time);
            start_time = prev_end;
            end_time = prev_end;
        }
        end_time = end_time.max(start_time);

        if p == num_pages - 1 {
            end_time = unit_duration;
        }
        if p == 0 {
            start_time = 0.0;
        }

        pages.push(Page {
            page_index: p,
            start_time,
            end_time,
            word_start_idx: w_start,
            word_end_idx: w_end,
        });
    }

    pages
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

    fn evenly_spaced(word_count: u32, step_ms: u64) -> Vec<WordTiming> {
        (1..=word_count)
            .map(|i| {
                let start = u64::from(i - 1) * step_ms;
                t(i, start, start + step_ms)
            })
            .collect()
    }

    #[test]
    fn empty_timings_yield_no_pages() {
        assert!(compute_pages(&[], 10, 5.0, 12).is_empty());
    }

    #[test]
    fn pages_partition_words_contiguously() {
        for (word_count, page_size) in [(27usize, 12usize), (24, 12), (1, 12), (13, 4), (7, 7)] {
            let timings = evenly_spaced(word_count as u32, 100);
            let pages = compute_pages(&timings, word_count, 10.0, page_size);
            assert_eq!(pages.len(), word_count.div_ceil(page_size));

            let mut expected_next = 0usize;
            for (i, page) in pages.iter().enumerate() {
                assert_eq!(page.page_index, i);
                assert_eq!(page.word_start_idx, expected_next);
                assert!(page.word_end_idx >= page.word_start_idx);
                expected_next = page.word_end_idx + 1;
            }
            assert_eq!(expected_next, word_count);
        }
    }

    #[test]
    fn first_and_last_pages_are_pinned() {
        let timings = evenly_spaced(27, 450);
        let pages = compute_pages(&timings, 27, 13.0, 12);
        assert_eq!(pages[0].start_time, 0.0);
        assert_eq!(pages.last().unwrap().end_time, 13.0);
    }

    #[test]
    fn three_page_example_scenario() {
        // 27 words, page size 12 -> word ranges [0-11], [12-23], [24-26].
        let timings: Vec<WordTiming> = (1..=27)
            .map(|i| {
                let start = (u64::from(i) - 1) * 462; // word 27 starts near 12000 ms
                t(i, start, start + 400)
            })
            .collect();
        let pages = compute_pages(&timings, 27, 13.0, 12);
        assert_eq!(pages.len(), 3);
        assert_eq!((pages[0].word_start_idx, pages[0].word_end_idx), (0, 11));
        assert_eq!((pages[1].word_start_idx, pages[1].word_end_idx), (12, 23));
        assert_eq!((pages[2].word_start_idx, pages[2].word_end_idx), (24, 26));

        assert_eq!(pages[0].start_time, 0.0);
        assert_eq!(pages[2].end_time, 13.0);
        // Middle page bounds come from words 13-24's own timestamps.
        assert!((pages[1].start_time - 5.544).abs() < 1e-9);
        assert!((pages[1].end_time - 11.026).abs() < 1e-9);
    }

    #[test]
    fn page_with_no_timings_clamps_to_previous_end() {
        // Words 13..24 have no timing entries at all.
        let mut timings = evenly_spaced(12, 100);
        timings.push(t(25, 5000, 5400));
        timings.push(t(26, 5400, 5800));
        let pages = compute_pages(&timings, 26, 6.0, 12);
        assert_eq!(pages.len(), 3);

        let empty = pages[1];
        assert_eq!(empty.start_time, pages[0].end_time);
        assert_eq!(empty.end_time, empty.start_time);
        assert!(empty.start_time <= empty.end_time);
    }

    #[test]
    fn single_page_is_pinned_on_both_sides() {
        let timings = evenly_spaced(5, 200);
        let pages = compute_pages(&timings, 5, 4.2, 12);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].start_time, 0.0);
        assert_eq!(pages[0].end_time, 4.2);
        assert_eq!(pages[0].word_span(), 5);
    }
}
