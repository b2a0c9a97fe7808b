//! Fuzzy text matching for noisy OCR output.

use astral_core::types::OcrItem;

/// Length of the longest common subsequence of two strings, by char.
pub fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Share of `target` recovered in `text`, ignoring case and whitespace.
pub fn lcs_ratio(target: &str, text: &str) -> f64 {
    let target = normalize(target);
    let text = normalize(text);
    let n = target.chars().count();
    if n == 0 {
        return 0.0;
    }
    lcs_len(&target, &text) as f64 / n as f64
}

/// Whether `text` matches `target` closely enough.
pub fn fuzzy_match(target: &str, text: &str, min_ratio: f64) -> bool {
    lcs_ratio(target, text) >= min_ratio
}

/// The OCR item best matching `target`, if any clears `min_ratio`.
/// Ties keep the first item in reading order.
pub fn best_match<'a>(items: &'a [OcrItem], target: &str, min_ratio: f64) -> Option<&'a OcrItem> {
    let mut best: Option<(&OcrItem, f64)> = None;
    for item in items {
        let ratio = lcs_ratio(target, &item.text);
        if ratio < min_ratio {
            continue;
        }
        match best {
            Some((_, r)) if r >= ratio => {}
            _ => best = Some((item, ratio)),
        }
    }
    best.map(|(item, _)| item)
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::types::Rect;

    #[test]
    fn test_lcs_len() {
        assert_eq!(lcs_len("abcde", "ace"), 3);
        assert_eq!(lcs_len("", "abc"), 0);
        assert_eq!(lcs_len("Calyx", "Calyx"), 5);
    }

    #[test]
    fn test_ratio_ignores_case_and_spaces() {
        assert_eq!(lcs_ratio("Bud of Memories", "bud ofmemories"), 1.0);
        assert!(lcs_ratio("Teleport", "Tele") < 0.6);
        assert_eq!(lcs_ratio("", "anything"), 0.0);
    }

    #[test]
    fn test_best_match_prefers_closest() {
        let items = vec![
            OcrItem::new("Bud of Aether", Rect::new(0, 0, 10, 10)),
            OcrItem::new("Bud of Memories", Rect::new(0, 20, 10, 30)),
        ];
        let hit = best_match(&items, "Bud of Memories", 0.8).unwrap();
        assert_eq!(hit.rect.y1, 20);
        assert!(best_match(&items, "Shape of Quanta", 0.8).is_none());
    }
}
