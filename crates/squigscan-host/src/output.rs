//! Terminal output helpers. Human output goes to stderr; stdout carries
//! only tables and JSON.

use squigscan::ranking::format_deviation;
use squigscan::ScoredResult;
use std::fmt::Write as _;
use std::io::IsTerminal;

const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Deviations at or below this many dB are highlighted as close matches.
const CLOSE_MATCH_DB: f64 = 2.0;

/// Whether to emit ANSI colors.
pub fn color_enabled() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() || std::env::var_os("SQUIGSCAN_NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

/// Colored string builder.
pub struct Styled {
    use_color: bool,
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

impl Styled {
    pub fn new() -> Self {
        Self {
            use_color: color_enabled(),
        }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    pub fn ok_sym(&self) -> &str {
        if self.use_color {
            "\x1b[32m\u{2713}\x1b[0m"
        } else {
            "OK"
        }
    }

    pub fn warn_sym(&self) -> &str {
        if self.use_color {
            "\x1b[33m\u{26a0}\x1b[0m"
        } else {
            "??"
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }
}

/// Rank table with close matches highlighted and incomparable rows dimmed.
pub fn styled_table(s: &Styled, results: &[ScoredResult]) -> String {
    let name_width = results
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Model".len());

    let mut out = String::new();
    let header = format!("{:>4}  {:<name_width$}  {:>10}", "Rank", "Model", "Deviation");
    let _ = writeln!(out, "{}", s.bold(&header));
    for (i, r) in results.iter().enumerate() {
        let row = format!(
            "{:>4}  {:<name_width$}  {:>10}",
            i + 1,
            r.name,
            format_deviation(r.deviation_db)
        );
        let row = if !r.is_comparable() {
            s.dim(&row)
        } else if r.deviation_db <= CLOSE_MATCH_DB {
            s.green(&row)
        } else {
            row
        };
        let _ = writeln!(out, "{row}");
    }
    out
}

/// Pretty JSON to stdout.
pub fn print_json(value: &serde_json::Value) {
    if let Ok(s) = serde_json::to_string_pretty(value) {
        println!("{s}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_table_matches_core_renderer() {
        let results = vec![
            ScoredResult {
                name: "Sennheiser HD650".into(),
                deviation_db: 1.5,
                source_id: "chart:sennheiserhd650".into(),
            },
            ScoredResult {
                name: "Ghost 42".into(),
                deviation_db: f64::INFINITY,
                source_id: "text:ghost42".into(),
            },
        ];
        assert_eq!(
            styled_table(&Styled::plain(), &results),
            squigscan::render_table(&results)
        );
    }

    #[test]
    fn test_plain_styles_are_identity() {
        let s = Styled::plain();
        assert_eq!(s.green("x"), "x");
        assert_eq!(s.ok_sym(), "OK");
    }
}
