//! Lexer and field extractor: turns one physical source line into a
//! classified location/result/operand/comment split, after applying
//! micro substitution and stripping cosmetic underscores.

pub mod local_label;
pub mod micro;
pub mod scan;

use local_label::LocalLabels;

pub use scan::{LexToken, Scanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Location begins in column 0; whitespace separates fields; `;`
    /// starts a trailing comment.
    New,
    /// Location in columns 0-1, result field in 2-33 (or a later
    /// continuation), operand follows.
    Old,
}

#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub format: SourceFormat,
    pub flexible: bool,
    /// The dialect's maximum physical line length; the engine doesn't
    /// depend on a specific value beyond this.
    pub column_limit: usize,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            format: SourceFormat::New,
            flexible: false,
            column_limit: 80,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub location: String,
    pub result: String,
    pub operand: String,
    pub comment: Option<String>,
}

/// Split one already micro-substituted, underscore-stripped source line
/// into its fields. `locals` supplies local-numeric-label renaming when
/// flexible syntax is enabled and the location field turns out to be a
/// bare digit.
pub fn extract_fields(raw_line: &str, cfg: &LexerConfig, locals: &mut LocalLabels) -> Fields {
    let line = if cfg.flexible {
        apply_flexible_syntax(raw_line)
    } else {
        raw_line.to_string()
    };
    let truncated: String = line.chars().take(cfg.column_limit).collect();

    let mut fields = match cfg.format {
        SourceFormat::New => split_new_format(&truncated),
        SourceFormat::Old => split_old_format(&truncated),
    };

    if cfg.flexible && is_bare_digit(&fields.location) {
        let n: u8 = fields.location.parse().unwrap();
        fields.location = locals.define(n);
    }

    fields
}

fn is_bare_digit(s: &str) -> bool {
    s.len() == 1 && s.chars().next().unwrap().is_ascii_digit()
}

/// Rewrite `label:` to `label = *`, and shift a column-0 line with no
/// label one column to the right (the "flexible syntax" dialect).
fn apply_flexible_syntax(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    if let Some(colon) = bare_label_colon(trimmed) {
        let label = &trimmed[..colon];
        let rest = &trimmed[colon + 1..];
        return format!("{}{} = *{}", " ".repeat(indent), label, rest);
    }
    if indent == 0 && !trimmed.is_empty() && !trimmed.starts_with(';') {
        return format!(" {}", line);
    }
    line.to_string()
}

/// If `text` starts with a label (name or single digit) immediately
/// followed by `:`, return the byte offset of the `:`.
fn bare_label_colon(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || "$@%".contains(first) || first.is_ascii_digit()) {
        return None;
    }
    let is_numeric_label = first.is_ascii_digit();
    let mut end = first.len_utf8();
    for (i, c) in chars {
        if c == ':' {
            return Some(i);
        }
        if is_numeric_label {
            // Local labels are exactly one digit.
            return None;
        }
        if !(c.is_ascii_alphanumeric() || "$@%".contains(c)) {
            return None;
        }
        end = i + c.len_utf8();
    }
    let _ = end;
    None
}

fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find(';') {
        Some(i) => (&line[..i], Some(line[i + 1..].to_string())),
        None => (line, None),
    }
}

fn split_new_format(line: &str) -> Fields {
    let (code, comment) = split_comment(line);
    if code.trim().is_empty() {
        return Fields {
            comment,
            ..Default::default()
        };
    }
    let has_location = !code.starts_with(' ') && !code.starts_with('\t');
    let mut parts = code.splitn(if has_location { 3 } else { 2 }, char::is_whitespace);
    let mut location = String::new();
    if has_location {
        location = parts.next().unwrap_or_default().to_string();
    }
    let rest: Vec<&str> = parts.collect();
    let rest_joined = rest.join(" ");
    let mut rest_parts = rest_joined.trim().splitn(2, char::is_whitespace);
    let result = rest_parts.next().unwrap_or_default().to_string();
    let operand = rest_parts.next().unwrap_or_default().trim().to_string();

    Fields {
        location,
        result,
        operand,
        comment,
    }
}

fn split_old_format(line: &str) -> Fields {
    let (code, comment) = split_comment(line);
    let chars: Vec<char> = code.chars().collect();
    let location: String = chars
        .get(0..2)
        .map(|s| s.iter().collect::<String>().trim_end().to_string())
        .unwrap_or_default();
    let rest: String = chars.get(2..).map(|s| s.iter().collect()).unwrap_or_default();
    let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
    let result = parts.next().unwrap_or_default().to_string();
    let operand = parts.next().unwrap_or_default().trim().to_string();
    Fields {
        location,
        result,
        operand,
        comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_format_splits_three_fields() {
        let cfg = LexerConfig::default();
        let mut locals = LocalLabels::new();
        let fields = extract_fields("LOOP A1 5 ; comment", &cfg, &mut locals);
        assert_eq!(fields.location, "LOOP");
        assert_eq!(fields.result, "A1");
        assert_eq!(fields.operand, "5");
        assert_eq!(fields.comment.as_deref(), Some(" comment"));
    }

    #[test]
    fn new_format_with_no_location() {
        let cfg = LexerConfig::default();
        let mut locals = LocalLabels::new();
        let fields = extract_fields(" EQU 5", &cfg, &mut locals);
        assert_eq!(fields.location, "");
        assert_eq!(fields.result, "EQU");
        assert_eq!(fields.operand, "5");
    }

    #[test]
    fn flexible_label_colon_rewrites_to_equ_star() {
        let cfg = LexerConfig {
            flexible: true,
            ..Default::default()
        };
        let mut locals = LocalLabels::new();
        let fields = extract_fields("LOOP:", &cfg, &mut locals);
        assert_eq!(fields.location, "LOOP");
        assert_eq!(fields.result, "=");
        assert_eq!(fields.operand, "*");
    }

    #[test]
    fn flexible_local_numeric_label_renamed() {
        let cfg = LexerConfig {
            flexible: true,
            ..Default::default()
        };
        let mut locals = LocalLabels::new();
        let fields = extract_fields("3:", &cfg, &mut locals);
        assert_eq!(fields.location, "@3$1");
    }
}
