//! The single escaping boundary between caller-supplied values and script text.
//!
//! Every value that ends up inside generated PowerShell goes through
//! `quote_literal`. A single-quoted PowerShell string performs no variable
//! expansion and no subexpression evaluation, so the only character that can
//! end it is a single quote. PowerShell accepts four Unicode quotation marks
//! as single-quote delimiters in addition to ASCII `'`, and inside a literal
//! any of them is escaped by doubling.

/// Characters PowerShell treats as single-quote delimiters.
const SINGLE_QUOTES: [char; 5] = ['\'', '\u{2018}', '\u{2019}', '\u{201A}', '\u{201B}'];

/// Quote `value` as a PowerShell single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if SINGLE_QUOTES.contains(&c) {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Quote a list of values as a space-separated argument list.
pub fn quote_all<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| quote_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Split a quoted literal back into its content, failing if the literal
    /// would terminate before the final quote.
    fn unquote(literal: &str) -> Option<String> {
        let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut out = String::new();
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            if SINGLE_QUOTES.contains(&c) {
                // A lone quote would close the literal early
                if chars.next() != Some(c) {
                    return None;
                }
            }
            out.push(c);
        }
        Some(out)
    }

    #[test]
    fn test_plain_value() {
        assert_eq!(quote_literal("C:\\Users"), "'C:\\Users'");
    }

    #[test]
    fn test_single_quote_doubled() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_injection_attempt_stays_one_literal() {
        let hostile = "x'; Remove-Item -Recurse C:\\ ; '";
        let quoted = quote_literal(hostile);
        assert_eq!(unquote(&quoted).as_deref(), Some(hostile));
    }

    #[test]
    fn test_unicode_quote_variants_doubled() {
        let hostile = "a\u{2019}; Stop-Computer; \u{2018}b";
        let quoted = quote_literal(hostile);
        assert!(quoted.contains("\u{2019}\u{2019}"));
        assert!(quoted.contains("\u{2018}\u{2018}"));
        assert_eq!(unquote(&quoted).as_deref(), Some(hostile));
    }

    #[test]
    fn test_expansion_characters_left_inert() {
        // $(), backticks and double quotes have no meaning inside single quotes
        let value = "$(Get-Process) `n \"quoted\" ; | &";
        assert_eq!(quote_literal(value), format!("'{}'", value));
    }

    #[test]
    fn test_quote_all() {
        assert_eq!(quote_all(&["a", "b c", "d'e"]), "'a' 'b c' 'd''e'");
        assert_eq!(quote_all::<&str>(&[]), "");
    }
}
