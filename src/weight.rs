//! Edge-weight engine (C6): structural similarity, temporal relevance, and
//! the effective-weight normalization that combines them.
//!
//! Pure functions, no I/O — ported faithfully from the reference
//! prototype's `grafo` module so the numbers this engine produces agree
//! with the scheme the rest of the system (edge formation threshold,
//! query-tree scoring) was designed against.

use crate::keywords::keyword_jaccard;
use crate::model::ContextType;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;

/// `jaccard = |A∩B| / |A∪B|`, `0.0` if either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    keyword_jaccard(a, b)
}

/// Cosine distance `d` in `[0, 2]` maps to a similarity score via
/// `s = max(0, 1 - d/2)`, so `d = 0` (identical) gives `s = 1` and `d = 2`
/// (opposite) gives `s = 0`.
pub fn cosine_distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance / 2.0).max(0.0)
}

/// Structural similarity: the midpoint of lexical Jaccard and dense
/// semantic similarity.
pub fn structural_similarity(jaccard_score: f32, semantic_score: f32) -> f32 {
    (jaccard_score + semantic_score) / 2.0
}

/// Temporal relevance between two fragments' timestamps, `0.0` if either is
/// missing. Decays exponentially against the *shorter* of the two context
/// types' half-lives, so a meeting-type fragment's fast decay dominates a
/// pairing with a slower-decaying knowledge-type fragment.
pub fn temporal_relevance(
    ts_a: Option<NaiveDateTime>,
    ts_b: Option<NaiveDateTime>,
    type_a: ContextType,
    type_b: ContextType,
) -> f32 {
    let (a, b) = match (ts_a, ts_b) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0.0,
    };
    let delta_days = (a - b).num_seconds().unsigned_abs() as f64 / 86400.0;
    let half_life = type_a.half_life_days().min(type_b.half_life_days());
    let r = (-delta_days / half_life).exp();
    r.clamp(0.0, 1.0) as f32
}

/// Combine structural and temporal signal into a raw, unbounded weight:
/// `raw = w_struct * (1 + r_temp)`.
pub fn raw_weight(w_struct: f32, r_temp: f32) -> f32 {
    w_struct * (1.0 + r_temp)
}

/// Sigmoid-style normalization into `[0, 1)`: `w_eff = raw / (1 + raw)`.
pub fn effective_weight(raw: f32) -> f32 {
    raw / (1.0 + raw)
}

/// Convenience: compute `w_eff` directly from structural + temporal inputs.
pub fn compute_w_eff(w_struct: f32, r_temp: f32) -> f32 {
    effective_weight(raw_weight(w_struct, r_temp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn jaccard_matches_keyword_jaccard() {
        let a = set(&["alpha", "beta"]);
        let b = set(&["beta", "gamma"]);
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_zero_is_full_similarity() {
        assert!((cosine_distance_to_similarity(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_two_is_zero_similarity() {
        assert_eq!(cosine_distance_to_similarity(2.0), 0.0);
    }

    #[test]
    fn cosine_distance_beyond_two_clamps_to_zero() {
        assert_eq!(cosine_distance_to_similarity(3.0), 0.0);
    }

    #[test]
    fn structural_similarity_is_midpoint() {
        assert!((structural_similarity(0.2, 0.8) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn temporal_relevance_zero_when_timestamp_missing() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(temporal_relevance(Some(now), None, ContextType::Task, ContextType::Task), 0.0);
        assert_eq!(temporal_relevance(None, None, ContextType::Task, ContextType::Task), 0.0);
    }

    #[test]
    fn temporal_relevance_is_one_at_zero_delta() {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let r = temporal_relevance(Some(ts), Some(ts), ContextType::Meeting, ContextType::Meeting);
        assert!((r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn temporal_relevance_uses_shorter_half_life() {
        let a = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let b = a + chrono::Duration::days(2);
        // meeting half-life = 2 days vs knowledge half-life = 365: the pairing
        // should decay at the meeting's fast rate, not knowledge's slow one.
        let r_meeting_pair = temporal_relevance(Some(a), Some(b), ContextType::Meeting, ContextType::Meeting);
        let r_mixed_pair = temporal_relevance(Some(a), Some(b), ContextType::Meeting, ContextType::Knowledge);
        assert!((r_meeting_pair - r_mixed_pair).abs() < 1e-6);
    }

    #[test]
    fn raw_weight_and_effective_weight_compose() {
        let raw = raw_weight(0.5, 1.0);
        assert!((raw - 1.0).abs() < 1e-6);
        let w_eff = effective_weight(raw);
        assert!((w_eff - 0.5).abs() < 1e-6);
    }

    #[test]
    fn effective_weight_stays_in_unit_interval() {
        for raw in [0.0, 0.1, 1.0, 10.0, 1000.0] {
            let w = effective_weight(raw);
            assert!(w >= 0.0 && w < 1.0, "w_eff={} out of range for raw={}", w, raw);
        }
    }

    #[test]
    fn compute_w_eff_zero_struct_zero_temp_is_zero() {
        assert_eq!(compute_w_eff(0.0, 0.0), 0.0);
    }
}
