mod common;
use crate::common::init_tracing;

use stagerun::cmdline::{join, quote, QuoteDialect};

/// Undo libuv-style quoting the way the C runtime argv parser would.
fn parse_verbatim(quoted: &str) -> String {
    let mut out = String::new();
    let mut chars = quoted.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut backslashes = 1;
            while chars.peek() == Some(&'\\') {
                chars.next();
                backslashes += 1;
            }
            if chars.peek() == Some(&'"') {
                out.extend(std::iter::repeat_n('\\', backslashes / 2));
                if backslashes % 2 == 1 {
                    chars.next();
                    out.push('"');
                }
            } else {
                out.extend(std::iter::repeat_n('\\', backslashes));
            }
        } else if c == '"' {
            // Quote toggles delimit the argument; they emit nothing.
        } else {
            out.push(c);
        }
    }
    out
}

/// Undo cmd.exe-style quoting: strip the wrap, collapse doubled quotes.
fn parse_cmd(quoted: &str) -> String {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(quoted);
    inner.replace("\"\"", "\"")
}

#[test]
fn posix_is_passthrough() {
    init_tracing();
    assert_eq!(quote("plain", QuoteDialect::Posix), "plain");
    assert_eq!(quote("two words", QuoteDialect::Posix), "two words");
    assert_eq!(quote(r#"he said "hi""#, QuoteDialect::Posix), r#"he said "hi""#);
}

#[test]
fn safe_tokens_are_identity_in_both_windows_dialects() {
    init_tracing();
    for token in ["simple", "path/to/file", "build.cmd", "-flag"] {
        assert_eq!(quote(token, QuoteDialect::WindowsVerbatim), token);
        assert_eq!(quote(token, QuoteDialect::WindowsCmd), token);
    }
}

#[test]
fn empty_string_is_quoted_in_both_windows_dialects() {
    init_tracing();
    assert_eq!(quote("", QuoteDialect::WindowsVerbatim), "\"\"");
    assert_eq!(quote("", QuoteDialect::WindowsCmd), "\"\"");
}

#[test]
fn whitespace_only_args_get_wrapped() {
    init_tracing();
    assert_eq!(
        quote("two words", QuoteDialect::WindowsVerbatim),
        "\"two words\""
    );
    assert_eq!(quote("two words", QuoteDialect::WindowsCmd), "\"two words\"");
}

#[test]
fn dialects_diverge_on_embedded_quotes() {
    init_tracing();
    let arg = r#"he said "hi""#;
    let verbatim = quote(arg, QuoteDialect::WindowsVerbatim);
    let cmd = quote(arg, QuoteDialect::WindowsCmd);

    // Verbatim escapes inner quotes with backslashes; cmd doubles them.
    assert_eq!(verbatim, r#""he said \"hi\"""#);
    assert_eq!(cmd, r#""he said ""hi""""#);
    assert_ne!(verbatim, cmd);

    // Both must round-trip under their own target conventions.
    assert_eq!(parse_verbatim(&verbatim), arg);
    assert_eq!(parse_cmd(&cmd), arg);
}

#[test]
fn verbatim_doubles_backslash_runs_before_quotes() {
    init_tracing();
    let arg = r#"a\"b c"#;
    let quoted = quote(arg, QuoteDialect::WindowsVerbatim);
    assert_eq!(quoted, r#""a\\\"b c""#);
    assert_eq!(parse_verbatim(&quoted), arg);

    // Trailing backslash is doubled against the closing quote.
    let arg = r"dir with space\";
    let quoted = quote(arg, QuoteDialect::WindowsVerbatim);
    assert_eq!(quoted, r#""dir with space\\""#);
    assert_eq!(parse_verbatim(&quoted), arg);
}

#[test]
fn cmd_quotes_on_any_special_character() {
    init_tracing();
    for arg in ["a&b", "a|b", "a<b", "a>b", "x=y", "semi;colon", "bang!"] {
        let quoted = quote(arg, QuoteDialect::WindowsCmd);
        assert_eq!(quoted, format!("\"{arg}\""));
    }
}

#[test]
fn join_quotes_each_element() {
    init_tracing();
    let line = join(["tool.cmd", "two words", "plain"], QuoteDialect::WindowsCmd);
    assert_eq!(line, r#"tool.cmd "two words" plain"#);
}
