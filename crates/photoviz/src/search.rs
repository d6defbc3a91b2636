//! Label search: text canonicalization and relevance ranking of photo
//! buckets.

use std::collections::HashMap;

use album::Photo;

/// Canonicalize text for label comparison: ASCII lower-casing plus
/// katakana folded onto hiragana so the two kana spellings of the same
/// word compare equal.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{30a1}'..='\u{30f6}' => {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            }
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Filter and order photos for a query.
///
/// An empty query keeps everything, ordered newest first. A non-empty
/// query keeps photos with at least one label containing at least one
/// whitespace-separated term (after normalization), scored by how many
/// surviving photos share each of their labels, so photos
/// representative of common themes in the current view rank first.
/// Ordering is total: score, then capture time descending, then id.
pub fn rank(photos: &[Photo], query: &str) -> Vec<Photo> {
    let terms: Vec<String> = query.split_whitespace().map(normalize).collect();

    let mut surviving: Vec<Photo> = photos
        .iter()
        .filter(|photo| {
            terms.is_empty()
                || photo.labels.iter().any(|label| {
                    let label = normalize(label);
                    terms.iter().any(|term| label.contains(term.as_str()))
                })
        })
        .cloned()
        .collect();

    if terms.is_empty() {
        surviving.sort_by(|a, b| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        return surviving;
    }

    // Label frequencies over the surviving set only.
    let mut label_counts: HashMap<String, u32> = HashMap::new();
    for photo in &surviving {
        for label in &photo.labels {
            *label_counts.entry(normalize(label)).or_insert(0) += 1;
        }
    }

    let score = |photo: &Photo| -> u32 {
        photo
            .labels
            .iter()
            .map(|label| label_counts.get(&normalize(label)).copied().unwrap_or(0))
            .sum()
    };

    let mut scored: Vec<(u32, Photo)> = surviving
        .into_iter()
        .map(|photo| (score(&photo), photo))
        .collect();
    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| b.captured_at.cmp(&a.captured_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.into_iter().map(|(_, photo)| photo).collect()
}
