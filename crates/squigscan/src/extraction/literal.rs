//! Restricted literal parser for data embedded in page scripts.
//!
//! Accepts a superset of JSON as it appears in hand-written JavaScript:
//! unquoted and single-quoted keys, single-quoted and template strings
//! without substitutions, trailing commas, comments, `undefined`, `NaN`,
//! `Infinity`, hex numbers and leading `+`/`.` in numbers. Anything that
//! would need evaluation (identifiers as values, calls, operators) is a
//! parse error. Page text is only ever read as data.
//!
//! Values JSON cannot represent (`NaN`, `Infinity`, `undefined`) become
//! `null`.

use crate::error::LiteralError;
use serde_json::{Map, Number, Value};

/// Nesting limit; deeper input is rejected instead of recursing further.
const MAX_NESTING: usize = 128;

/// Parse `src` as exactly one literal (trailing whitespace, comments and
/// semicolons allowed).
pub fn parse_literal(src: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(src, 0);
    let value = parser.value(0)?;
    parser.skip_trivia();
    while parser.eat(';') {
        parser.skip_trivia();
    }
    if parser.pos < src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Parse one literal starting at byte `start`; returns the value and the
/// byte offset just past it.
pub fn parse_literal_at(src: &str, start: usize) -> Result<(Value, usize), LiteralError> {
    if start > src.len() || !src.is_char_boundary(start) {
        return Err(LiteralError::new(start, "start offset out of range"));
    }
    let mut parser = Parser::new(src, start);
    let value = parser.value(0)?;
    Ok((value, parser.pos))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn error(&self, reason: impl Into<String>) -> LiteralError {
        LiteralError::new(self.pos, reason)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    match self.src[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => self.pos = self.src.len(),
                    }
                }
                _ => return,
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        self.skip_trivia();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.object(depth),
            Some('[') => self.array(depth),
            Some(q @ ('"' | '\'' | '`')) => self.string(q).map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if is_ident_start(c) => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = self.key()?;
            self.skip_trivia();
            if !self.eat(':') {
                return Err(self.error("expected ':' after object key"));
            }
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            return Err(self.error("expected ',' or '}' in object"));
        }
    }

    fn key(&mut self) -> Result<String, LiteralError> {
        match self.peek() {
            Some(q @ ('"' | '\'' | '`')) => self.string(q),
            Some(c) if is_ident_start(c) => Ok(self.identifier().to_string()),
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '.') {
                    self.bump();
                }
                Ok(self.src[start..self.pos].to_string())
            }
            _ => Err(self.error("expected object key")),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            return Err(self.error("expected ',' or ']' in array"));
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string"));
            };
            match c {
                c if c == quote => return Ok(out),
                '$' if quote == '`' && self.peek() == Some('{') => {
                    return Err(self.error("template substitution is not a literal"));
                }
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(self.error("unterminated escape"));
                    };
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'v' => out.push('\u{b}'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.unicode_escape()?),
                        'x' => {
                            let code = self.hex_digits(2)?;
                            out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                        }
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                '\n' if quote != '`' => return Err(self.error("newline in string")),
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        if self.eat('{') {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                .map_err(|_| self.error("invalid unicode escape"))?;
            if !self.eat('}') {
                return Err(self.error("unterminated unicode escape"));
            }
            return Ok(char::from_u32(code).unwrap_or('\u{fffd}'));
        }

        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) && self.src[self.pos..].starts_with("\\u") {
            self.pos += 2;
            let low = self.hex_digits(4)?;
            let combined = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
            return Ok(char::from_u32(combined).unwrap_or('\u{fffd}'));
        }
        Ok(char::from_u32(high).unwrap_or('\u{fffd}'))
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let end = self.pos + count;
        let digits = self
            .src
            .get(self.pos..end)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };

        // Infinity / NaN after a sign.
        if self.peek().is_some_and(is_ident_start) {
            let word = self.identifier();
            return match word {
                "Infinity" | "NaN" => Ok(Value::Null),
                _ => Err(LiteralError::new(start, "unexpected identifier after sign")),
            };
        }

        if self.src[self.pos..].starts_with("0x") || self.src[self.pos..].starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let magnitude = i64::from_str_radix(&self.src[digits_start..self.pos], 16)
                .map_err(|_| LiteralError::new(start, "invalid hex number"))?;
            return Ok(Value::from(if negative { -magnitude } else { magnitude }));
        }

        let digits_start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_'))
        {
            let c = self.bump();
            if matches!(c, Some('e' | 'E')) && matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
        }
        let text: String = self.src[digits_start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if text.is_empty() || text == "." {
            return Err(LiteralError::new(start, "invalid number"));
        }

        let is_integer = text.chars().all(|c| c.is_ascii_digit());
        if is_integer {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::from(if negative { -n } else { n }));
            }
        }
        let magnitude: f64 = text
            .parse()
            .map_err(|_| LiteralError::new(start, format!("invalid number {text:?}")))?;
        let n = if negative { -magnitude } else { magnitude };
        Ok(Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null))
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        match self.identifier() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" | "NaN" | "Infinity" => Ok(Value::Null),
            other => Err(LiteralError::new(
                start,
                format!("identifier {other:?} is not a literal"),
            )),
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        &self.src[start..self.pos]
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        let v = parse_literal(r#"{"x": [20, 20.5, 1e3], "name": "HD650"}"#).unwrap();
        assert_eq!(v, json!({"x": [20, 20.5, 1000.0], "name": "HD650"}));
    }

    #[test]
    fn test_javascript_object_syntax() {
        let src = r#"
            {
                // measurement
                name: 'Moondrop Aria',
                x: [20, 25, .5,],   /* trailing comma */
                y: [+1, -2.5e0, 0x10],
                'quoted key': `template`,
                extra: undefined,
            };
        "#;
        let v = parse_literal(src).unwrap();
        assert_eq!(v["name"], "Moondrop Aria");
        assert_eq!(v["x"], json!([20, 25, 0.5]));
        assert_eq!(v["y"], json!([1, -2.5, 16]));
        assert_eq!(v["quoted key"], "template");
        assert_eq!(v["extra"], Value::Null);
    }

    #[test]
    fn test_non_finite_become_null() {
        let v = parse_literal("[NaN, Infinity, -Infinity, 1]").unwrap();
        assert_eq!(v, json!([null, null, null, 1]));
    }

    #[test]
    fn test_code_is_rejected() {
        assert!(parse_literal("alert(1)").is_err());
        assert!(parse_literal("{x: foo()}").is_err());
        assert!(parse_literal("[1 + 2]").is_err());
        assert!(parse_literal("`${document.cookie}`").is_err());
        assert!(parse_literal("{x: window.data}").is_err());
    }

    #[test]
    fn test_parse_at_offset_reports_end() {
        let src = "var data = [1, [2, 3]]; draw(data);";
        let start = src.find('[').unwrap();
        let (v, end) = parse_literal_at(src, start).unwrap();
        assert_eq!(v, json!([1, [2, 3]]));
        assert_eq!(&src[end..end + 1], ";");
    }

    #[test]
    fn test_escapes() {
        let v = parse_literal(r#"["a\"b", 'it\'s', "é\x41", "🎧"]"#).unwrap();
        assert_eq!(v, json!(["a\"b", "it's", "éA", "🎧"]));
    }

    #[test]
    fn test_unterminated_input() {
        assert!(parse_literal("[1, 2").is_err());
        assert!(parse_literal("{x: 'abc").is_err());
        assert!(parse_literal("").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(MAX_NESTING + 10) + &"]".repeat(MAX_NESTING + 10);
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.reason.contains("deep"));
    }
}
