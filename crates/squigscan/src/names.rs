//! Label normalization and the "looks like a headphone model" predicate.
//!
//! Graph pages label the same device in many ways ("x HD 650 (AVG)",
//! "hd-650", "Sennheiser HD650 [tilt]"). [`normalize`] reduces a raw label
//! to a comparable key plus a display form, and [`assess_label`] decides
//! whether a piece of page text names a device at all.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Embedded vocabulary of brands, stop words and model-name fragments.
const MODEL_VOCABULARY_JSON: &str = include_str!("model_vocabulary.json");

/// Accepted label length range, in characters.
const MIN_LABEL_CHARS: usize = 3;
const MAX_LABEL_CHARS: usize = 100;

/// A raw label reduced to its comparable and displayable forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedName {
    /// Lower-cased alphanumerics only. Used for cross-source matching.
    pub key: String,
    /// Trimmed label without decorations.
    pub display: String,
}

/// How permissively two names are considered the same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Equal keys, or one display contained in the other (case-insensitive).
    #[default]
    Permissive,
    /// Equal keys only.
    ExactKey,
}

/// Which page channel a label was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanChannel {
    /// Elements matched by known list/legend selectors. Favours recall.
    Selector,
    /// Arbitrary visible text nodes. Favours precision.
    TextNode,
}

/// Outcome of the model-name predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelVerdict {
    Rejected,
    Accepted,
    Ambiguous,
}

// ── Vocabulary registry ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ModelVocabulary {
    #[serde(default)]
    brands: Vec<String>,
    #[serde(default)]
    stop_words: Vec<String>,
    #[serde(default)]
    model_fragments: Vec<String>,
    #[serde(default)]
    shorthand_prefixes: Vec<String>,
}

struct VocabularyRegistry {
    brands: HashSet<String>,
    stop_words: HashSet<String>,
    model_fragments: HashSet<String>,
    shorthand: Option<Regex>,
}

fn vocabulary() -> &'static VocabularyRegistry {
    static REGISTRY: OnceLock<VocabularyRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let raw: ModelVocabulary = serde_json::from_str(MODEL_VOCABULARY_JSON).unwrap_or_default();

        // Longest prefixes first so "zsn" wins over "zs".
        let mut prefixes = raw.shorthand_prefixes.clone();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let alternation = prefixes
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let shorthand = if alternation.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{alternation})[\s-]?\d+[a-z]*\b")).ok()
        };

        VocabularyRegistry {
            brands: raw.brands.into_iter().collect(),
            stop_words: raw.stop_words.into_iter().collect(),
            model_fragments: raw.model_fragments.into_iter().collect(),
            shorthand,
        }
    })
}

// ── Normalization ───────────────────────────────────────────────────────────

/// Normalize a raw label into key and display forms.
pub fn normalize(raw: &str) -> NormalizedName {
    let display = display_form(raw);
    let key = display
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();
    NormalizedName { key, display }
}

fn display_form(raw: &str) -> String {
    static LEADING_X: OnceLock<Regex> = OnceLock::new();
    static TRAILING_NOTE: OnceLock<Regex> = OnceLock::new();
    let leading_x =
        LEADING_X.get_or_init(|| Regex::new(r"^[xX×✕]\s+").expect("leading x regex is valid"));
    let trailing_note = TRAILING_NOTE.get_or_init(|| {
        Regex::new(r"\s*(?:\([^()]*\)|\[[^\[\]]*\])\s*$").expect("annotation regex is valid")
    });

    let mut display = leading_x.replace(raw.trim(), "").into_owned();
    // Annotations stack: "HD650 (AVG) [tilt]".
    loop {
        let stripped = trailing_note.replace(&display, "").into_owned();
        if stripped == display || stripped.trim().is_empty() {
            break;
        }
        display = stripped;
    }
    display.trim().to_string()
}

/// Lower-cased identifier fragments marking reference curves rather than
/// devices. `δ` is the lower case of the `Δ` delta prefix.
const REFERENCE_MARKERS: &[&str] = &["target", "df", "harman", "tilt", "δ"];

/// Whether a label names a target, tilt or delta curve.
pub fn is_reference_curve(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    lower.starts_with("delta") || REFERENCE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether two labels refer to the same device under `policy`.
pub fn names_match(a: &NormalizedName, b: &NormalizedName, policy: MatchPolicy) -> bool {
    if !a.key.is_empty() && a.key == b.key {
        return true;
    }
    match policy {
        MatchPolicy::ExactKey => false,
        MatchPolicy::Permissive => {
            let a_lower = a.display.trim().to_lowercase();
            let b_lower = b.display.trim().to_lowercase();
            if a_lower.is_empty() || b_lower.is_empty() {
                return false;
            }
            a_lower.contains(&b_lower) || b_lower.contains(&a_lower)
        }
    }
}

// ── Model-name predicate ────────────────────────────────────────────────────

/// Classify a label as a device name, a non-device, or undecided.
pub fn assess_label(raw: &str) -> LabelVerdict {
    let display = display_form(raw);
    let char_count = display.chars().count();
    if !(MIN_LABEL_CHARS..=MAX_LABEL_CHARS).contains(&char_count) {
        return LabelVerdict::Rejected;
    }
    if is_excluded(&display) {
        return LabelVerdict::Rejected;
    }
    if looks_like_model(&display) {
        return LabelVerdict::Accepted;
    }
    LabelVerdict::Ambiguous
}

/// Apply the channel's default for ambiguous labels.
pub fn accepts_label(raw: &str, channel: ScanChannel) -> bool {
    match assess_label(raw) {
        LabelVerdict::Accepted => true,
        LabelVerdict::Rejected => false,
        LabelVerdict::Ambiguous => channel == ScanChannel::Selector,
    }
}

fn is_excluded(display: &str) -> bool {
    static PURE_NUMBER: OnceLock<Regex> = OnceLock::new();
    static UNIT_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let pure_number = PURE_NUMBER
        .get_or_init(|| Regex::new(r"^[\s\d.,:%+\-−]+$").expect("number regex is valid"));
    let unit_suffix = UNIT_SUFFIX.get_or_init(|| {
        Regex::new(r"(?i)(?:\d|\s|^)(?:k?hz|db)\s*$").expect("unit regex is valid")
    });

    if pure_number.is_match(display) || unit_suffix.is_match(display) {
        return true;
    }

    let vocab = vocabulary();
    let lower = display.to_lowercase();
    let words = tokens(&lower);
    if words.iter().any(|w| vocab.stop_words.contains(*w)) {
        return true;
    }

    // Brand alone, e.g. "Sennheiser" or "64 Audio".
    if vocab.brands.contains(lower.trim()) {
        return true;
    }
    !words.is_empty() && words.iter().all(|w| vocab.brands.contains(*w))
}

fn looks_like_model(display: &str) -> bool {
    static DIGIT_RUN: OnceLock<Regex> = OnceLock::new();
    static HYPHENATED: OnceLock<Regex> = OnceLock::new();
    let digit_run = DIGIT_RUN.get_or_init(|| Regex::new(r"\d{2,}").expect("digit regex is valid"));
    let hyphenated = HYPHENATED.get_or_init(|| {
        Regex::new(r"\b[A-Z][A-Za-z]*-[A-Z0-9][A-Za-z0-9]*\b").expect("hyphen regex is valid")
    });

    if digit_run.is_match(display) || hyphenated.is_match(display) {
        return true;
    }

    let vocab = vocabulary();
    if vocab
        .shorthand
        .as_ref()
        .is_some_and(|re| re.is_match(display))
    {
        return true;
    }

    let lower = display.to_lowercase();
    tokens(&lower)
        .iter()
        .any(|w| vocab.model_fragments.contains(*w))
}

fn tokens(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_decorations() {
        let n = normalize("  x Sennheiser HD 650 (AVG) [tilt]  ");
        assert_eq!(n.display, "Sennheiser HD 650");
        assert_eq!(n.key, "sennheiserhd650");
    }

    #[test]
    fn test_keys_collide_across_formatting() {
        assert_eq!(normalize("HD 650").key, normalize("hd-650").key);
    }

    #[test]
    fn test_leading_x_only_as_token() {
        assert_eq!(normalize("xenns up").display, "xenns up");
        assert_eq!(normalize("x Xenns Up").display, "Xenns Up");
    }

    #[test]
    fn test_annotation_only_label_keeps_text() {
        assert_eq!(normalize("(AVG)").display, "(AVG)");
    }

    #[test]
    fn test_names_match_policies() {
        let pro = normalize("IEM Pro");
        let pro2 = normalize("IEM Pro 2");
        assert!(names_match(&pro, &pro2, MatchPolicy::Permissive));
        assert!(!names_match(&pro, &pro2, MatchPolicy::ExactKey));

        let a = normalize("HD 650");
        let b = normalize("hd-650");
        assert!(names_match(&a, &b, MatchPolicy::ExactKey));
    }

    #[test]
    fn test_empty_names_never_match() {
        let empty = normalize("   ");
        let other = normalize("HD650");
        assert!(!names_match(&empty, &other, MatchPolicy::Permissive));
        assert!(!names_match(&empty, &empty, MatchPolicy::Permissive));
    }

    #[test]
    fn test_target_curve_rejected() {
        assert_eq!(assess_label("Target Curve"), LabelVerdict::Rejected);
        assert!(!accepts_label("Target Curve", ScanChannel::Selector));
    }

    #[test]
    fn test_reference_curve_labels() {
        assert!(is_reference_curve("Harman IE 2019 Target"));
        assert!(is_reference_curve("Δ HD650"));
        assert!(is_reference_curve("delta HD650"));
        assert!(is_reference_curve("DF tilt"));
        assert!(!is_reference_curve("Sennheiser HD650"));
        assert!(!is_reference_curve("Moondrop Aria"));
    }

    #[test]
    fn test_sennheiser_hd650_accepted() {
        assert_eq!(assess_label("Sennheiser HD650"), LabelVerdict::Accepted);
        assert!(accepts_label("Sennheiser HD650", ScanChannel::TextNode));
    }

    #[test]
    fn test_exclusions() {
        assert_eq!(assess_label("1000"), LabelVerdict::Rejected);
        assert_eq!(assess_label("20 Hz"), LabelVerdict::Rejected);
        assert_eq!(assess_label("-6dB"), LabelVerdict::Rejected);
        assert_eq!(assess_label("Sennheiser"), LabelVerdict::Rejected);
        assert_eq!(assess_label("64 Audio"), LabelVerdict::Rejected);
        assert_eq!(assess_label("Δ Archive"), LabelVerdict::Rejected);
        assert_eq!(assess_label("ab"), LabelVerdict::Rejected);
        assert_eq!(assess_label(&"a".repeat(101)), LabelVerdict::Rejected);
    }

    #[test]
    fn test_acceptance_patterns() {
        assert_eq!(assess_label("Moondrop Blessing 2"), LabelVerdict::Accepted);
        assert_eq!(assess_label("Audio-Technica M50x"), LabelVerdict::Accepted);
        assert_eq!(assess_label("HD6XX"), LabelVerdict::Accepted);
        assert_eq!(assess_label("Moondrop Aria"), LabelVerdict::Accepted);
        assert_eq!(assess_label("7Hz Timeless"), LabelVerdict::Accepted);
    }

    #[test]
    fn test_ambiguous_depends_on_channel() {
        assert_eq!(assess_label("Something Else"), LabelVerdict::Ambiguous);
        assert!(accepts_label("Something Else", ScanChannel::Selector));
        assert!(!accepts_label("Something Else", ScanChannel::TextNode));
    }
}
