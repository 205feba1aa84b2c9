//! String literal escaping for text embedded in SQL.
//!
//! Error messages are written into `converter_errormsg` as SQL string
//! literals. Apostrophes are always doubled. When the server runs with
//! `standard_conforming_strings = off`, backslashes inside ordinary literals
//! are escape characters, so they are doubled too.

/// How the server interprets backslashes in `'...'` literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralMode {
    /// `standard_conforming_strings = on`: backslash is an ordinary character.
    Standard,
    /// `standard_conforming_strings = off`: backslash starts an escape.
    BackslashEscapes,
}

impl LiteralMode {
    /// Interpret the value returned by `SHOW standard_conforming_strings`.
    pub fn from_setting(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("off") {
            Self::BackslashEscapes
        } else {
            Self::Standard
        }
    }
}

/// Escape `text` for use between single quotes in a SQL statement.
pub fn escape_literal(text: &str, mode: LiteralMode) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' if mode == LiteralMode::BackslashEscapes => out.push_str("\\\\"),
            // NUL cannot be stored in a text column.
            '\0' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads a literal body back the way the server would.
    fn server_decode(body: &str, mode: LiteralMode) -> String {
        let mut out = String::new();
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    assert_eq!(chars.next(), Some('\''), "unescaped apostrophe in {body}");
                    out.push('\'');
                }
                '\\' if mode == LiteralMode::BackslashEscapes => {
                    let escaped = chars.next().expect("dangling backslash");
                    out.push(escaped);
                }
                _ => out.push(c),
            }
        }
        out
    }

    #[test]
    fn test_setting_parse() {
        assert_eq!(LiteralMode::from_setting("on"), LiteralMode::Standard);
        assert_eq!(LiteralMode::from_setting(" OFF "), LiteralMode::BackslashEscapes);
        assert_eq!(LiteralMode::from_setting(""), LiteralMode::Standard);
    }

    #[test]
    fn test_apostrophes_always_doubled() {
        assert_eq!(
            escape_literal("O'Brien's file", LiteralMode::Standard),
            "O''Brien''s file"
        );
    }

    #[test]
    fn test_backslashes_only_doubled_when_nonstandard() {
        assert_eq!(escape_literal(r"a\b", LiteralMode::Standard), r"a\b");
        assert_eq!(escape_literal(r"a\b", LiteralMode::BackslashEscapes), r"a\\b");
    }

    #[test]
    fn test_message_reads_back_unchanged_in_both_modes() {
        let message = r"O'Brien's file\path";
        for mode in [LiteralMode::Standard, LiteralMode::BackslashEscapes] {
            let body = escape_literal(message, mode);
            assert_eq!(server_decode(&body, mode), message);
        }
    }

    #[test]
    fn test_trailing_backslash_cannot_close_literal() {
        let body = escape_literal("dir\\", LiteralMode::BackslashEscapes);
        assert_eq!(body, "dir\\\\");
        assert_eq!(server_decode(&body, LiteralMode::BackslashEscapes), "dir\\");
    }
}
