// src/cmdline/quote.rs

//! Render a single argument into a platform-correct command-line token.

/// Target quoting convention for [`quote`].
///
/// The two Windows dialects are deliberately distinct and must not be
/// unified: `cmd.exe` re-parses the command line itself (quotes are doubled),
/// while a direct `CreateProcess` argv is parsed by the C runtime (quotes are
/// backslash-escaped, libuv rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDialect {
    /// No-op passthrough; POSIX callers pass argv elements verbatim.
    Posix,
    /// Direct `CreateProcess` command line (libuv quoting rules).
    WindowsVerbatim,
    /// A line handed to `cmd.exe /D /S /C "..."`.
    WindowsCmd,
}

/// Characters that force quoting under the `cmd.exe` dialect.
const CMD_SPECIAL_CHARS: &[char] = &[
    ' ', '\t', '&', '(', ')', '[', ']', '{', '}', '^', '=', ';', '!', '\'', '+', ',', '`', '~',
    '|', '<', '>', '"',
];

/// Quote one argument for the given dialect.
pub fn quote(arg: &str, dialect: QuoteDialect) -> String {
    match dialect {
        QuoteDialect::Posix => arg.to_string(),
        QuoteDialect::WindowsVerbatim => quote_windows_verbatim(arg),
        QuoteDialect::WindowsCmd => quote_windows_cmd(arg),
    }
}

/// Join an argv into a single command line, quoting each element.
pub fn join<I, S>(args: I, dialect: QuoteDialect) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| quote(a.as_ref(), dialect))
        .collect::<Vec<_>>()
        .join(" ")
}

/// libuv-style quoting for a direct `CreateProcess` command line.
fn quote_windows_verbatim(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }
    if !arg.contains(' ') && !arg.contains('\t') && !arg.contains('"') {
        // No quoting hints; return as-is.
        return arg.to_string();
    }
    if !arg.contains('"') && !arg.contains('\\') {
        // Only whitespace; a plain wrap is enough.
        return format!("\"{arg}\"");
    }

    // Walk the string back to front: double every backslash run that
    // immediately precedes a quote (or the closing quote we add), and
    // backslash-escape embedded quotes.
    let mut reverse = String::with_capacity(arg.len() + 2);
    reverse.push('"');
    let mut quote_hit = true;
    for c in arg.chars().rev() {
        reverse.push(c);
        if quote_hit && c == '\\' {
            reverse.push('\\');
        } else if c == '"' {
            quote_hit = true;
            reverse.push('\\');
        } else {
            quote_hit = false;
        }
    }
    reverse.push('"');
    reverse.chars().rev().collect()
}

/// `cmd.exe`-style quoting: same reverse scan, but embedded quotes are
/// doubled rather than backslash-escaped.
fn quote_windows_cmd(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }
    if !arg.chars().any(|c| CMD_SPECIAL_CHARS.contains(&c)) {
        return arg.to_string();
    }

    let mut reverse = String::with_capacity(arg.len() + 2);
    reverse.push('"');
    let mut quote_hit = true;
    for c in arg.chars().rev() {
        reverse.push(c);
        if quote_hit && c == '\\' {
            reverse.push('\\');
        } else if c == '"' {
            quote_hit = true;
            reverse.push('"');
        } else {
            quote_hit = false;
        }
    }
    reverse.push('"');
    reverse.chars().rev().collect()
}
