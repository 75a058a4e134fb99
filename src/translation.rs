use crate::paging::Page;

/// Distributes a translation across page windows proportionally by word
/// count. Greedy, no clause-boundary snapping; the last page absorbs
/// rounding drift. Joining the non-empty segments with single spaces
/// reconstructs the original word sequence.
pub fn split_translation(translation: &str, pages: &[Page], total_word_count: usize) -> Vec<String> {
    if translation.is_empty() || pages.is_empty() {
        return vec![translation.to_string(); pages.len().max(1)];
    }

    if pages.len() == 1 {
        return vec![translation.to_string()];
    }

    let words: Vec<&str> = translation.split_whitespace().collect();
    let n_trans_words = words.len();
    let n_pages = pages.len();

    let mut segments = Vec::with_capacity(n_pages);
    let mut consumed = 0usize;

    for (i, page) in pages.iter().enumerate() {
        let ratio = page.word_span() as f64 / total_word_count.max(1) as f64;
        let count = ((ratio * n_trans_words as f64).round() as usize).max(1);

        let seg_words: &[&str] = if i == n_pages - 1 {
            &words[consumed.min(n_trans_words)..]
        } else {
            let end = (consumed + count).min(n_trans_words);
            &words[consumed.min(n_trans_words)..end]
        };

        segments.push(seg_words.join(" "));
        consumed += seg_words.len();
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(idx: usize, w_start: usize, w_end: usize) -> Page {
        Page {
            page_index: idx,
            start_time: idx as f64,
            end_time: idx as f64 + 1.0,
            word_start_idx: w_start,
            word_end_idx: w_end,
        }
    }

    #[test]
    fn empty_translation_repeats_per_page() {
        let pages = vec![page(0, 0, 11), page(1, 12, 14)];
        assert_eq!(split_translation("", &pages, 15), vec!["", ""]);
    }

    #[test]
    fn no_pages_still_returns_one_segment() {
        assert_eq!(split_translation("hello there", &[], 0), vec!["hello there"]);
    }

    #[test]
    fn single_page_passes_through_unchanged() {
        let pages = vec![page(0, 0, 9)];
        assert_eq!(
            split_translation("In the beginning", &pages, 10),
            vec!["In the beginning"]
        );
    }

    #[test]
    fn two_page_example_scenario() {
        // 7 translation words over spans 12 and 3 (total 15):
        // page 0 ratio 0.8 -> round(5.6) = 6 words, page 1 gets the rest.
        let pages = vec![page(0, 0, 11), page(1, 12, 14)];
        let segs = split_translation("In the name of Allah the Merciful", &pages, 15);
        assert_eq!(segs, vec!["In the name of Allah the", "Merciful"]);
    }

    #[test]
    fn join_of_segments_is_lossless() {
        let translation = "Praise be to Allah Lord of all the worlds most gracious most merciful";
        let pages = vec![page(0, 0, 3), page(1, 4, 7), page(2, 8, 10)];
        let segs = split_translation(translation, &pages, 11);
        assert_eq!(segs.len(), 3);
        let joined = segs
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, translation);
    }

    #[test]
    fn more_pages_than_words_leaves_trailing_empty() {
        let pages = vec![page(0, 0, 4), page(1, 5, 9), page(2, 10, 14), page(3, 15, 19)];
        let segs = split_translation("so few", &pages, 20);
        assert_eq!(segs.len(), 4);
        let joined = segs
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, "so few");
        assert_eq!(segs[3], "");
    }

    #[test]
    fn every_non_final_page_gets_at_least_one_word_while_available() {
        let pages = vec![page(0, 0, 0), page(1, 1, 1), page(2, 2, 30)];
        let segs = split_translation("alpha beta gamma delta", &pages, 31);
        assert!(!segs[0].is_empty());
        assert!(!segs[1].is_empty());
    }
}
