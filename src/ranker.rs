use crate::doc_index::{DocEntry, DocIndex};

const EXACT_SCORE: u32 = 100;
const KEY_CONTAINS_SCORE: u32 = 50;
const KEYWORD_CONTAINS_SCORE: u32 = 25;

/// An index entry together with the key it was reached through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub key: &'a str,
    pub entry: &'a DocEntry,
    pub score: u32,
}

/// Score a single lookup key against every keyword.
pub fn score_key(key: &str, keywords: &[String]) -> u32 {
    keywords
        .iter()
        .map(|keyword| {
            if key == keyword {
                EXACT_SCORE
            } else if key.contains(keyword.as_str()) {
                KEY_CONTAINS_SCORE
            } else if keyword.contains(key) {
                // Abbreviated index keys.
                KEYWORD_CONTAINS_SCORE
            } else {
                0
            }
        })
        .sum()
}

/// Rank every indexed key against `keywords` and keep the best `limit`.
///
/// Keys scoring zero are dropped. Equal scores keep index enumeration order.
pub fn rank<'a>(
    keywords: &[String],
    index: &'a DocIndex,
    limit: usize,
) -> Vec<Candidate<'a>> {
    let mut scored: Vec<Candidate<'a>> = index
        .entries()
        .filter_map(|(key, entry)| {
            let score = score_key(key, keywords);
            (score > 0).then_some(Candidate { key, entry, score })
        })
        .collect();

    // Stable sort keeps first-seen order for ties.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}
