//! Turning per-tag probabilities into a caption.
//!
//! Ratings are always reported in full. General and character tags are
//! filtered either by a fixed threshold or by an adaptive cutoff placed in the
//! middle of the largest gap between consecutive sorted scores (MCut).

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    error::{Result, TaggerError},
    tags::{TagCategory, TagVocabulary},
};

/// Lowest cutoff the adaptive threshold may pick for character tags.
pub const CHARACTER_MCUT_FLOOR: f32 = 0.15;

/// A map of tag predictions, from tag name to confidence score.
pub type Prediction = IndexMap<String, f32>;

/// How tags of one category are filtered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryFilter {
    pub threshold: f32,
    pub mcut: bool,
}

/// Filters for the general and character categories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectOptions {
    pub general: CategoryFilter,
    pub character: CategoryFilter,
}

/// The tags kept for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Kept general tags sorted by score, comma-joined and escaped.
    pub general_caption: String,
    /// Every rating tag with its score, in vocabulary order.
    pub rating: Prediction,
    /// Kept character tags, in vocabulary order.
    pub character: Prediction,
    /// Kept general tags, in vocabulary order.
    pub general: Prediction,
}

impl Selection {
    /// The highest scoring rating; ties go to the first in vocabulary order.
    pub fn top_rating(&self) -> Option<&str> {
        top_rating(&self.rating)
    }
}

/// Midpoint of the largest gap between consecutive scores sorted descending.
///
/// Returns `None` when there are fewer than two scores.
pub fn mcut_threshold(probs: &[f32]) -> Option<f32> {
    let sorted: Vec<f32> = probs
        .iter()
        .copied()
        .sorted_by(|a, b| b.total_cmp(a))
        .collect();

    let (t, _) = sorted
        .windows(2)
        .map(|w| w[0] - w[1])
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, dif)| match best {
            Some((_, max)) if dif <= max => best,
            _ => Some((i, dif)),
        })?;

    Some((sorted[t] + sorted[t + 1]) / 2.0)
}

/// Keeps the pairs scoring strictly above the category's threshold.
pub fn filter_category(pairs: Vec<(String, f32)>, filter: CategoryFilter, category: TagCategory) -> Prediction {
    let mut threshold = filter.threshold;
    if filter.mcut {
        let probs: Vec<f32> = pairs.iter().map(|(_, p)| *p).collect();
        if let Some(cut) = mcut_threshold(&probs) {
            threshold = cut;
        }
        if category == TagCategory::Character {
            threshold = threshold.max(CHARACTER_MCUT_FLOOR);
        }
    }
    tracing::trace!("{:?} threshold {:.4}", category, threshold);

    pairs
        .into_iter()
        .filter(|(_, prob)| *prob > threshold)
        .collect()
}

/// Joins general tags by descending score and escapes closing parentheses.
///
/// Opening parentheses are left untouched so existing caption sets keep
/// the same format.
pub fn general_caption(general: &Prediction) -> String {
    general
        .iter()
        .sorted_by(|a, b| b.1.total_cmp(a.1))
        .map(|(tag, _)| tag.as_str())
        .join(", ")
        .replace(')', "\\)")
}

/// First rating with the highest score.
pub fn top_rating(rating: &Prediction) -> Option<&str> {
    rating
        .iter()
        .fold(None, |best: Option<(&String, f32)>, (tag, &prob)| match best {
            Some((_, max)) if prob <= max => best,
            _ => Some((tag, prob)),
        })
        .map(|(tag, _)| tag.as_str())
}

/// Splits a prediction vector by category and applies the filters.
pub fn select(probs: &[f32], vocabulary: &TagVocabulary, options: &SelectOptions) -> Result<Selection> {
    if probs.len() != vocabulary.len() {
        return Err(TaggerError::inference(format!(
            "Model returned {} scores for {} tags",
            probs.len(),
            vocabulary.len()
        )));
    }

    let pairs = |category: TagCategory| -> Vec<(String, f32)> {
        vocabulary
            .indexes(category)
            .iter()
            .map(|&i| (vocabulary.names()[i].clone(), probs[i]))
            .collect()
    };

    let rating: Prediction = pairs(TagCategory::Rating).into_iter().collect();
    let general = filter_category(pairs(TagCategory::General), options.general, TagCategory::General);
    let character = filter_category(
        pairs(TagCategory::Character),
        options.character,
        TagCategory::Character,
    );

    tracing::debug!(
        "Selected {} general and {} character tags",
        general.len(),
        character.len()
    );

    Ok(Selection {
        general_caption: general_caption(&general),
        rating,
        character,
        general,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn pairs(scores: &[(&str, f32)]) -> Vec<(String, f32)> {
        scores.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[test]
    fn test_mcut_largest_gap() {
        let cut = mcut_threshold(&[0.1, 0.9, 0.3, 0.82, 0.28]).unwrap();
        assert!((cut - 0.56).abs() < 1e-6);
    }

    #[test]
    fn test_mcut_first_gap_wins_ties() {
        // gaps: 0.25, 0.25, 0.25 -> first one
        let cut = mcut_threshold(&[1.0, 0.75, 0.5, 0.25]).unwrap();
        assert!((cut - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_mcut_needs_two_scores() {
        assert_eq!(mcut_threshold(&[]), None);
        assert_eq!(mcut_threshold(&[0.7]), None);
    }

    #[test]
    fn test_filter_is_strict() {
        let kept = filter_category(
            pairs(&[("a", 0.5), ("b", 0.51)]),
            CategoryFilter { threshold: 0.5, mcut: false },
            TagCategory::General,
        );
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_mcut_ignores_given_threshold() {
        let kept = filter_category(
            pairs(&[("a", 0.9), ("b", 0.82), ("c", 0.3), ("d", 0.28), ("e", 0.1)]),
            CategoryFilter { threshold: 0.0, mcut: true },
            TagCategory::General,
        );
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_character_floor() {
        // largest gap between 0.1 and 0.0 -> cut 0.05, floored to 0.15
        let kept = filter_category(
            pairs(&[("x", 0.12), ("y", 0.11), ("z", 0.1), ("w", 0.0)]),
            CategoryFilter { threshold: 0.0, mcut: true },
            TagCategory::Character,
        );
        assert!(kept.is_empty());

        let general = filter_category(
            pairs(&[("x", 0.12), ("y", 0.11), ("z", 0.1), ("w", 0.0)]),
            CategoryFilter { threshold: 0.0, mcut: true },
            TagCategory::General,
        );
        assert_eq!(general.len(), 3);
    }

    #[test]
    fn test_mcut_single_score_uses_threshold() {
        let filter = |threshold| CategoryFilter { threshold, mcut: true };
        let general = |threshold| filter_category(pairs(&[("a", 0.5)]), filter(threshold), TagCategory::General);
        assert_eq!(general(0.4).len(), 1);
        assert!(general(0.6).is_empty());
        assert!(filter_category(Vec::new(), filter(0.0), TagCategory::General).is_empty());

        // the floor still applies to characters
        let kept = filter_category(pairs(&[("x", 0.1)]), filter(0.05), TagCategory::Character);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_floor_only_with_mcut() {
        let kept = filter_category(
            pairs(&[("x", 0.12)]),
            CategoryFilter { threshold: 0.05, mcut: false },
            TagCategory::Character,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_general_caption_sorted_and_escaped() {
        let general: Prediction = pairs(&[
            ("smile", 0.6),
            ("1girl", 0.99),
            ("ganyu (genshin impact)", 0.8),
        ])
        .into_iter()
        .collect();
        assert_eq!(
            general_caption(&general),
            "1girl, ganyu (genshin impact\\), smile"
        );
    }

    #[test]
    fn test_top_rating_tie_break() {
        let rating: Prediction = pairs(&[("safe", 0.5), ("questionable", 0.5)]).into_iter().collect();
        assert_eq!(top_rating(&rating), Some("safe"));

        let rating: Prediction = pairs(&[("general", 0.2), ("sensitive", 0.7), ("explicit", 0.7)])
            .into_iter()
            .collect();
        assert_eq!(top_rating(&rating), Some("sensitive"));
        assert_eq!(top_rating(&Prediction::new()), None);
    }
}
