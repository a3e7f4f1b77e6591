//! Shell-style argv parsing for configured commands.

use anyhow::{bail, Result};

/// Splits a command string into argv, honoring quotes and backslash escapes.
///
/// Empty and comment (`#`-prefixed) input yields an empty argv.
pub fn parse_argv(input: &str) -> Result<Vec<String>> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('#') {
        return Ok(Vec::new());
    }

    let mut argv = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escape = false;

    for c in input.chars() {
        if escape {
            current.push(c);
            escape = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escape = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    argv.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }

    if escape {
        bail!("unterminated escape sequence in command: {input:?}");
    }
    if quote.is_some() {
        bail!("unterminated quote in command: {input:?}");
    }

    if !current.is_empty() {
        argv.push(current);
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            parse_argv("wl-copy --trim-newline").unwrap(),
            vec!["wl-copy", "--trim-newline"]
        );
    }

    #[test]
    fn empty_and_comment_input_yield_empty_argv() {
        assert!(parse_argv("").unwrap().is_empty());
        assert!(parse_argv("   ").unwrap().is_empty());
        assert!(parse_argv("# disabled").unwrap().is_empty());
    }

    #[test]
    fn quotes_group_arguments() {
        assert_eq!(
            parse_argv(r#"notify-send "dictation done" 'one two'"#).unwrap(),
            vec!["notify-send", "dictation done", "one two"]
        );
    }

    #[test]
    fn escapes_pass_through() {
        assert_eq!(
            parse_argv(r"echo hello\ world").unwrap(),
            vec!["echo", "hello world"]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_argv("echo 'oops").is_err());
    }

    #[test]
    fn unterminated_escape_is_an_error() {
        assert!(parse_argv("echo oops\\").is_err());
    }
}
