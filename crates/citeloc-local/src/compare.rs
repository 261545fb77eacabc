use crate::textprep::normalize;

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "among", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "between", "both", "but", "by", "can", "could", "did", "do", "does",
    "during", "each", "either", "for", "from", "had", "has", "have", "having", "here", "however",
    "if", "in", "into", "is", "it", "its", "may", "might", "more", "most", "no", "nor", "not", "of",
    "on", "only", "or", "other", "our", "over", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "under", "upon", "was",
    "we", "were", "what", "when", "where", "whether", "which", "while", "who", "whom", "with",
    "within", "without", "would",
];

pub fn is_stop_word(w: &str) -> bool {
    STOP_WORDS.contains(&w)
}

/// Lexical similarity in `[0, 1]`.
///
/// - normalized-equal: 1.0
/// - one normalized string contains the other: `shorter / longer * 0.9`
/// - otherwise: shared words (len > 2) over the larger word count
///
/// Empty input on either side scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let na = normalize(a);
    let nb = normalize(b);
    if na == nb {
        return 1.0;
    }
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }

    if na.contains(nb.as_str()) || nb.contains(na.as_str()) {
        let la = na.chars().count() as f64;
        let lb = nb.chars().count() as f64;
        return la.min(lb) / la.max(lb) * 0.9;
    }

    let wa: Vec<&str> = na
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    let wb: Vec<&str> = nb
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let common = wa.iter().filter(|w| wb.contains(w)).count() as f64;
    common / wa.len().max(wb.len()) as f64
}

/// Lowercased content words of `s` (stop-words removed, at least `min_chars` long), deduplicated,
/// in order of first appearance.
pub fn significant_words(s: &str, min_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in s.split(|c: char| !(c.is_alphanumeric() || c == '-')) {
        let w = raw.trim_matches('-').to_lowercase();
        if w.chars().count() < min_chars || is_stop_word(&w) {
            continue;
        }
        if !out.contains(&w) {
            out.push(w);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("Figure 2", "figure   2"), 1.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(similarity("anything", ""), 0.0);
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn substring_scores_by_length_ratio() {
        let s = similarity("Figure 2", "Figure 2: Manhattan plot");
        let expected = 8.0 / 23.0 * 0.9;
        assert!((s - expected).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn word_overlap_uses_larger_word_count() {
        // words > 2 chars: [warfarin, dose, requirements] vs [warfarin, dose, varies, widely]
        let s = similarity("warfarin dose requirements", "warfarin dose varies widely");
        assert!((s - 0.5).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn significant_words_drop_stop_words_and_short_tokens() {
        let w = significant_words("The rs4244285 genotype and the CYP2C19 gene", 4);
        assert_eq!(w, vec!["rs4244285", "genotype", "cyp2c19", "gene"]);
    }

    proptest! {
        #[test]
        fn similarity_is_bounded(a in ".{0,40}", b in ".{0,40}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn similarity_with_self_is_one(a in "[a-zA-Z0-9 ]{0,30}[a-zA-Z0-9]") {
            prop_assert_eq!(similarity(&a, &a), 1.0);
        }
    }
}
