//! Cubemap face identification from loosely-named files
//!
//! `ktx extract` names its output differently across versions
//! (`face_+X.png`, `face_f0_d0_l0.png`, `face_0.png`, ...), so face identity
//! has to be recovered from the names. Four heuristics run in strict
//! priority order; reordering them changes behavior on ambiguous inputs.

use super::project::FaceAxis;
use super::EnvmapError;
use regex::Regex;
use std::sync::OnceLock;

/// Which heuristic produced the ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Per-axis name tokens (`px`, `right`, `+X`, ...)
    AxisTokens,
    /// `_f<N>_` face-index token
    FaceIndex,
    /// Last run of digits in each name
    TrailingDigits,
    /// Lexicographic fallback; best-effort only, callers should warn
    Lexicographic,
}

/// Result of face identification: `order[i]` is the input position of the
/// face for `FACE_ORDER[i]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceOrdering {
    pub order: [usize; 6],
    pub confidence: Confidence,
}

/// Map six face names to canonical `[+X, -X, +Y, -Y, +Z, -Z]` order.
///
/// The lexicographic tier always yields an ordering, so the only error is a
/// wrong face count.
pub fn identify(names: &[String]) -> Result<FaceOrdering, EnvmapError> {
    if names.len() != 6 {
        return Err(EnvmapError::FaceCount(names.len()));
    }

    let (order, confidence) = if let Some(order) = by_axis_tokens(names) {
        (order, Confidence::AxisTokens)
    } else if let Some(order) = by_face_index(names) {
        (order, Confidence::FaceIndex)
    } else if let Some(order) = by_trailing_digits(names) {
        (order, Confidence::TrailingDigits)
    } else {
        (lexicographic(names), Confidence::Lexicographic)
    };

    Ok(FaceOrdering { order, confidence })
}

fn axis_patterns() -> &'static [(FaceAxis, Regex); 6] {
    static PATTERNS: OnceLock<[(FaceAxis, Regex); 6]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (FaceAxis::PosX, r"\+x|px|posx|right"),
            (FaceAxis::NegX, r"-x|nx|negx|left"),
            (FaceAxis::PosY, r"\+y|py|posy|top|up"),
            (FaceAxis::NegY, r"-y|ny|negy|bottom|down"),
            (FaceAxis::PosZ, r"\+z|pz|posz|front"),
            (FaceAxis::NegZ, r"-z|nz|negz|back"),
        ]
        .map(|(axis, tokens)| {
            let pattern = Regex::new(&format!("(?i){tokens}")).expect("static face pattern");
            (axis, pattern)
        })
    })
}

/// Tier 1: axis tokens in the name. Each file is claimed by the first axis
/// whose pattern matches; succeeds only when all six axes end up with
/// exactly one file.
fn by_axis_tokens(names: &[String]) -> Option<[usize; 6]> {
    let mut order = [usize::MAX; 6];
    for (position, name) in names.iter().enumerate() {
        let (axis, _) = axis_patterns()
            .iter()
            .find(|(_, pattern)| pattern.is_match(name))?;
        let slot = &mut order[axis.index()];
        if *slot != usize::MAX {
            // Two files claim the same axis: ambiguous, try the next tier
            return None;
        }
        *slot = position;
    }
    Some(order)
}

/// Tier 2: `_f<N>_` face-index token; indices 0..5 must each appear once.
/// The index-to-axis mapping is the canonical order.
fn by_face_index(names: &[String]) -> Option<[usize; 6]> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"_f(\d+)_").expect("static face pattern"));

    let mut order = [usize::MAX; 6];
    for (position, name) in names.iter().enumerate() {
        let index: usize = pattern
            .captures(name)?
            .get(1)
            .and_then(|m| m.as_str().parse().ok())?;
        let slot = order.get_mut(index)?;
        if *slot != usize::MAX {
            return None;
        }
        *slot = position;
    }
    order.iter().all(|slot| *slot != usize::MAX).then_some(order)
}

/// Tier 3: the last run of digits in each name is an ordering index; all six
/// must be present and distinct.
fn by_trailing_digits(names: &[String]) -> Option<[usize; 6]> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\d+").expect("static digit pattern"));

    let mut indexed: Vec<(u64, usize)> = Vec::with_capacity(6);
    for (position, name) in names.iter().enumerate() {
        let digits = pattern.find_iter(name).last()?;
        let index: u64 = digits.as_str().parse().ok()?;
        if indexed.iter().any(|(seen, _)| *seen == index) {
            return None;
        }
        indexed.push((index, position));
    }
    indexed.sort_by_key(|(index, _)| *index);

    let mut order = [usize::MAX; 6];
    for (slot, (_, position)) in order.iter_mut().zip(indexed) {
        *slot = position;
    }
    Some(order)
}

/// Tier 4: lexicographic order of the names
fn lexicographic(names: &[String]) -> [usize; 6] {
    let mut positions: Vec<usize> = (0..6).collect();
    positions.sort_by_key(|position| &names[*position]);

    let mut order = [usize::MAX; 6];
    for (slot, position) in order.iter_mut().zip(positions) {
        *slot = position;
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: [&str; 6]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_short_tags() {
        let ordering = identify(&names([
            "px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::AxisTokens);
        assert_eq!(ordering.order, [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_axis_tokens_shuffled() {
        let ordering = identify(&names([
            "skybox_back.png",
            "skybox_top.png",
            "skybox_right.png",
            "skybox_bottom.png",
            "skybox_left.png",
            "skybox_front.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::AxisTokens);
        // +X, -X, +Y, -Y, +Z, -Z
        assert_eq!(ordering.order, [2, 4, 1, 3, 5, 0]);
    }

    #[test]
    fn test_signed_axis_names() {
        let ordering = identify(&names([
            "face_-X.png",
            "face_+Z.png",
            "face_+X.png",
            "face_-Z.png",
            "face_-Y.png",
            "face_+Y.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::AxisTokens);
        assert_eq!(ordering.order, [2, 0, 5, 4, 1, 3]);
    }

    #[test]
    fn test_face_index_token() {
        // ktx extract --face all layout: base_f<N>_d0_l0.png
        let ordering = identify(&names([
            "face_f3_d0_l0.png",
            "face_f1_d0_l0.png",
            "face_f0_d0_l0.png",
            "face_f5_d0_l0.png",
            "face_f4_d0_l0.png",
            "face_f2_d0_l0.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::FaceIndex);
        assert_eq!(ordering.order, [2, 1, 5, 0, 4, 3]);
    }

    #[test]
    fn test_trailing_digits() {
        let ordering = identify(&names([
            "output.4.png",
            "output.0.png",
            "output.2.png",
            "output.5.png",
            "output.1.png",
            "output.3.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::TrailingDigits);
        assert_eq!(ordering.order, [1, 4, 2, 5, 0, 3]);
    }

    #[test]
    fn test_lexicographic_fallback() {
        let ordering = identify(&names([
            "fff.png", "bbb.png", "ddd.png", "aaa.png", "eee.png", "ccc.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::Lexicographic);
        assert_eq!(ordering.order, [3, 1, 5, 2, 4, 0]);
    }

    #[test]
    fn test_duplicate_axis_falls_through() {
        // Two files claim +X, but every file carries a distinct trailing digit
        let ordering = identify(&names([
            "px_1.png", "px_0.png", "py_2.png", "ny_3.png", "pz_4.png", "nz_5.png",
        ]))
        .unwrap();

        assert_eq!(ordering.confidence, Confidence::TrailingDigits);
        assert_eq!(ordering.order, [1, 0, 2, 3, 4, 5]);
    }

    #[test]
    fn test_wrong_count_rejected() {
        let five = names(["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"])[..5].to_vec();
        assert!(matches!(identify(&five), Err(EnvmapError::FaceCount(5))));
    }
}
