//! Structural recognition of frequency-response data in JSON-like values.
//!
//! Sites store curves under many ad hoc schemas. Each schema is one named
//! [`ShapePredicate`]; [`match_shape`] tries them in order and the first
//! match wins. [`collect_candidates`] walks a value tree, bounded by
//! [`WalkLimits`], and reports every subtree that matches a shape.

use super::Candidate;
use serde_json::{Map, Value};

/// Fewest samples a structural match must carry.
pub const MIN_SERIES_POINTS: usize = 3;

/// Fields that name a series, in preference order.
pub const NAME_FIELDS: &[&str] = &[
    "name", "dispName", "fullName", "label", "title", "model", "phone", "id",
];

/// Paired array fields: (frequency field, amplitude field).
const PAIRED_FIELDS: &[(&str, &str)] = &[
    ("freq", "amp"),
    ("frequency", "amplitude"),
    ("frequencies", "amplitudes"),
    ("freqs", "amps"),
    ("hz", "db"),
    ("f", "db"),
];

/// Fields holding a list of `[frequency, amplitude]` pairs.
pub const POINT_LIST_FIELDS: &[&str] = &["fr", "l", "points", "data", "values", "curve"];

/// Object keys that group data without naming it.
const CONTAINER_KEYS: &[&str] = &[
    "data", "measurements", "traces", "items", "values", "phones", "list", "state", "props",
    "pageProps", "series", "curves", "rawChannels", "channels",
];

/// Result of a successful shape match.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMatch {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
    pub name: Option<String>,
}

/// One named schema recognizer.
pub struct ShapePredicate {
    pub name: &'static str,
    matcher: fn(&Value) -> Option<ShapeMatch>,
}

impl ShapePredicate {
    pub fn matches(&self, value: &Value) -> Option<ShapeMatch> {
        (self.matcher)(value)
    }
}

/// Known schemas, most specific first.
pub const SHAPES: &[ShapePredicate] = &[
    ShapePredicate {
        name: "xy_arrays",
        matcher: match_xy_arrays,
    },
    ShapePredicate {
        name: "named_arrays",
        matcher: match_named_arrays,
    },
    ShapePredicate {
        name: "point_list_field",
        matcher: match_point_list_field,
    },
    ShapePredicate {
        name: "point_objects",
        matcher: match_point_objects,
    },
    ShapePredicate {
        name: "bare_pairs",
        matcher: match_bare_pairs,
    },
];

/// First matching shape, with its name.
pub fn match_shape(value: &Value) -> Option<(&'static str, ShapeMatch)> {
    SHAPES
        .iter()
        .find_map(|shape| shape.matches(value).map(|m| (shape.name, m)))
}

// ── Predicates ──────────────────────────────────────────────────────────────

/// Plotly-style trace: `{x: [...], y: [...], name?}`.
fn match_xy_arrays(value: &Value) -> Option<ShapeMatch> {
    let obj = value.as_object()?;
    let frequencies = numeric_array(obj.get("x")?)?;
    let amplitudes = numeric_array(obj.get("y")?)?;
    paired(frequencies, amplitudes, name_of(obj))
}

/// `{freq: [...], amp: [...]}` and the other paired vocabularies.
fn match_named_arrays(value: &Value) -> Option<ShapeMatch> {
    let obj = value.as_object()?;
    PAIRED_FIELDS.iter().find_map(|(f_key, a_key)| {
        let frequencies = numeric_array(get_ci(obj, f_key)?)?;
        let amplitudes = numeric_array(get_ci(obj, a_key)?)?;
        paired(frequencies, amplitudes, name_of(obj))
    })
}

/// `{fr: [[f, db], ...]}` and other point-list fields.
fn match_point_list_field(value: &Value) -> Option<ShapeMatch> {
    let obj = value.as_object()?;
    POINT_LIST_FIELDS.iter().find_map(|field| {
        let (frequencies, amplitudes) = point_pairs(obj.get(*field)?)?;
        paired(frequencies, amplitudes, name_of(obj))
    })
}

/// `[{freq, amp}, ...]` or `[{frequency, amplitude}, ...]` or `[{x, y}, ...]`.
fn match_point_objects(value: &Value) -> Option<ShapeMatch> {
    let items = value.as_array()?;
    let first = items.first()?.as_object()?;
    let (f_key, a_key) = [("freq", "amp"), ("frequency", "amplitude"), ("x", "y"), ("f", "db")]
        .into_iter()
        .find(|(f, a)| first.contains_key(*f) && first.contains_key(*a))?;

    let mut frequencies = Vec::with_capacity(items.len());
    let mut amplitudes = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        frequencies.push(obj.get(f_key)?.as_f64()?);
        amplitudes.push(obj.get(a_key)?.as_f64()?);
    }
    paired(frequencies, amplitudes, None)
}

/// `[[f, db], ...]` with no surrounding object.
fn match_bare_pairs(value: &Value) -> Option<ShapeMatch> {
    let (frequencies, amplitudes) = point_pairs(value)?;
    paired(frequencies, amplitudes, None)
}

// ── Value helpers ───────────────────────────────────────────────────────────

fn paired(frequencies: Vec<f64>, amplitudes: Vec<f64>, name: Option<String>) -> Option<ShapeMatch> {
    if frequencies.len() != amplitudes.len() || frequencies.len() < MIN_SERIES_POINTS {
        return None;
    }
    Some(ShapeMatch {
        frequencies,
        amplitudes,
        name,
    })
}

/// Every element a JSON number.
pub fn numeric_array(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(Value::as_f64).collect()
}

/// Every element an array whose first two entries are numbers.
pub fn point_pairs(value: &Value) -> Option<(Vec<f64>, Vec<f64>)> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut frequencies = Vec::with_capacity(items.len());
    let mut amplitudes = Vec::with_capacity(items.len());
    for item in items {
        let pair = item.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        frequencies.push(pair[0].as_f64()?);
        amplitudes.push(pair[1].as_f64()?);
    }
    Some((frequencies, amplitudes))
}

/// First non-empty string among [`NAME_FIELDS`].
pub fn name_of(obj: &Map<String, Value>) -> Option<String> {
    NAME_FIELDS.iter().find_map(|field| {
        obj.get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

fn get_ci<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

// ── Bounded walk ────────────────────────────────────────────────────────────

/// Bounds on a structural walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    /// Levels below the root that are still inspected.
    pub max_depth: usize,
    /// Object keys inspected per object.
    pub max_keys: usize,
    /// Total values inspected.
    pub max_nodes: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_keys: 256,
            max_nodes: 50_000,
        }
    }
}

/// Find every subtree of `root` that matches a shape. `root_name` names
/// matches that carry no name of their own.
pub fn collect_candidates(root: &Value, root_name: &str, limits: WalkLimits) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut budget = limits.max_nodes;
    walk(root, root_name, 0, &limits, &mut budget, &mut out);
    out
}

fn walk(
    value: &Value,
    hint: &str,
    depth: usize,
    limits: &WalkLimits,
    budget: &mut usize,
    out: &mut Vec<Candidate>,
) {
    if *budget == 0 {
        return;
    }
    *budget -= 1;

    if let Some((shape, m)) = match_shape(value) {
        let raw_name = m.name.unwrap_or_else(|| hint.to_string());
        tracing::trace!(shape, name = %raw_name, points = m.frequencies.len(), "shape match");
        out.push(Candidate {
            raw_name,
            frequencies: m.frequencies,
            amplitudes: m.amplitudes,
        });
        return;
    }

    if depth >= limits.max_depth {
        return;
    }

    match value {
        Value::Array(items) => {
            let containers = items.iter().filter(|v| v.is_array() || v.is_object()).count();
            for (i, item) in items.iter().enumerate() {
                if !(item.is_array() || item.is_object()) {
                    continue;
                }
                let child_hint = if containers > 1 {
                    format!("{hint} {}", i + 1)
                } else {
                    hint.to_string()
                };
                walk(item, &child_hint, depth + 1, limits, budget, out);
            }
        }
        Value::Object(obj) => {
            let own_name = name_of(obj);
            for (key, child) in obj.iter().take(limits.max_keys) {
                if !(child.is_array() || child.is_object()) {
                    continue;
                }
                let child_hint = match &own_name {
                    Some(name) => name.clone(),
                    None if CONTAINER_KEYS.contains(&key.as_str()) => hint.to_string(),
                    None => key.clone(),
                };
                walk(child, &child_hint, depth + 1, limits, budget, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.raw_name.as_str()).collect()
    }

    #[test]
    fn test_xy_trace() {
        let (shape, m) =
            match_shape(&json!({"name": "HD650", "x": [20, 30, 40], "y": [1, 2, 3]})).unwrap();
        assert_eq!(shape, "xy_arrays");
        assert_eq!(m.name.as_deref(), Some("HD650"));
        assert_eq!(m.frequencies, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_named_arrays_any_vocabulary() {
        for v in [
            json!({"freq": [20, 30, 40], "amp": [0, 1, 2]}),
            json!({"frequency": [20, 30, 40], "amplitude": [0, 1, 2]}),
            json!({"Frequencies": [20, 30, 40], "Amplitudes": [0, 1, 2]}),
        ] {
            let (shape, _) = match_shape(&v).unwrap();
            assert_eq!(shape, "named_arrays");
        }
    }

    #[test]
    fn test_point_list_and_objects() {
        let (shape, m) = match_shape(&json!({"id": "Aria", "fr": [[20, 1], [30, 2], [40, 3]]})).unwrap();
        assert_eq!(shape, "point_list_field");
        assert_eq!(m.amplitudes, vec![1.0, 2.0, 3.0]);

        let (shape, _) = match_shape(&json!([
            {"freq": 20, "amp": 0}, {"freq": 30, "amp": 1}, {"freq": 40, "amp": 2}
        ]))
        .unwrap();
        assert_eq!(shape, "point_objects");
    }

    #[test]
    fn test_malformed_candidates_rejected() {
        assert!(match_shape(&json!({"x": [20, 30, 40], "y": [1, 2]})).is_none());
        assert!(match_shape(&json!({"x": [20, "30", 40], "y": [1, 2, 3]})).is_none());
        assert!(match_shape(&json!({"x": [20, 30], "y": [1, 2]})).is_none());
        assert!(match_shape(&json!({"x": 1, "y": 2})).is_none());
        assert!(match_shape(&json!([[20, 1], [30], [40, 2]])).is_none());
    }

    #[test]
    fn test_walk_names_from_keys_and_fields() {
        let state = json!({
            "phones": [
                {"name": "HD650", "data": {"x": [20, 30, 40], "y": [1, 2, 3]}},
                {"name": "HD600", "data": {"x": [20, 30, 40], "y": [0, 0, 0]}}
            ],
            "byModel": {"Moondrop Aria": {"freq": [20, 30, 40], "amp": [3, 3, 3]}},
            "layout": {"title": "FR", "xaxis": {"range": [20, 20000]}}
        });
        let found = collect_candidates(&state, "graphData", WalkLimits::default());
        let mut found = names(&found);
        found.sort_unstable();
        assert_eq!(found, vec!["HD600", "HD650", "Moondrop Aria"]);
    }

    #[test]
    fn test_walk_numbers_unnamed_traces() {
        let traces = json!([
            {"x": [20, 30, 40], "y": [1, 2, 3]},
            {"x": [20, 30, 40], "y": [1, 2, 3]}
        ]);
        let found = collect_candidates(&traces, "plot", WalkLimits::default());
        assert_eq!(names(&found), vec!["plot 1", "plot 2"]);
    }

    #[test]
    fn test_walk_respects_depth_and_budget() {
        let nested = json!({"a": {"b": {"c": {"x": [20, 30, 40], "y": [1, 2, 3]}}}});
        let shallow = WalkLimits {
            max_depth: 2,
            ..WalkLimits::default()
        };
        assert!(collect_candidates(&nested, "root", shallow).is_empty());
        assert_eq!(collect_candidates(&nested, "root", WalkLimits::default()).len(), 1);

        let starved = WalkLimits {
            max_nodes: 2,
            ..WalkLimits::default()
        };
        assert!(collect_candidates(&nested, "root", starved).is_empty());
    }
}
