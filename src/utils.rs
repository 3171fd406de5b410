//! Text helpers shared by row parsing and artifact vectorizers.

use crate::errors::CorpusError;

/// Collapse runs of two or more whitespace characters into a single space.
///
/// A lone whitespace character is kept as-is; nothing is trimmed.
pub fn collapse_whitespace_runs<T: AsRef<str>>(text: T) -> String {
    let text = text.as_ref();
    let mut collapsed = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_whitespace() && chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            collapsed.push(' ');
        } else {
            collapsed.push(ch);
        }
    }
    collapsed
}

/// Parse a list-of-strings literal such as `['a.pdf', "b.pdf"]`.
///
/// Accepts single- or double-quoted items separated by commas, with
/// backslash escapes inside quotes. An empty or blank field is an empty list.
pub fn parse_string_list_literal(raw: &str) -> Result<Vec<String>, CorpusError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| CorpusError::MalformedReportList(raw.to_string()))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return Err(CorpusError::MalformedReportList(raw.to_string()));
        }
        let mut item = String::new();
        let mut closed = false;
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some('n') => item.push('\n'),
                    Some('t') => item.push('\t'),
                    Some(escaped) => item.push(escaped),
                    None => break,
                },
                ch if ch == quote => {
                    closed = true;
                    break;
                }
                ch => item.push(ch),
            }
        }
        if !closed {
            return Err(CorpusError::MalformedReportList(raw.to_string()));
        }
        items.push(item);

        while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return Err(CorpusError::MalformedReportList(raw.to_string())),
        }
    }
    Ok(items)
}

/// Split a comma-joined field into trimmed, non-empty parts.
pub fn split_joined(raw: &str, separator: char) -> Vec<&str> {
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_runs_keeps_single_spaces() {
        assert_eq!(collapse_whitespace_runs("a b"), "a b");
        assert_eq!(collapse_whitespace_runs("a\tb"), "a\tb");
        assert_eq!(collapse_whitespace_runs("a \t\n b"), "a b");
        assert_eq!(collapse_whitespace_runs("  lead"), " lead");
        assert_eq!(collapse_whitespace_runs(""), "");
    }

    #[test]
    fn list_literal_parses_mixed_quotes() {
        let parsed = parse_string_list_literal(r#"['a.pdf', "b, c.pdf", 'it\'s.pdf']"#).unwrap();
        assert_eq!(parsed, vec!["a.pdf", "b, c.pdf", "it's.pdf"]);
    }

    #[test]
    fn list_literal_accepts_empty_forms() {
        assert!(parse_string_list_literal("[]").unwrap().is_empty());
        assert!(parse_string_list_literal("  ").unwrap().is_empty());
        assert_eq!(parse_string_list_literal("['x',]").unwrap(), vec!["x"]);
    }

    #[test]
    fn list_literal_rejects_garbage() {
        assert!(parse_string_list_literal("a.pdf").is_err());
        assert!(parse_string_list_literal("['unterminated]").is_err());
        assert!(parse_string_list_literal("[a.pdf]").is_err());
        assert!(parse_string_list_literal("['a' 'b']").is_err());
    }

    #[test]
    fn split_joined_trims_parts() {
        assert_eq!(split_joined("a, b ,c", ','), vec!["a", "b", "c"]);
        assert!(split_joined("", ',').is_empty());
    }
}
