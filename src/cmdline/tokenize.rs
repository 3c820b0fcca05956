// src/cmdline/tokenize.rs

//! Split a raw command string into an argv.

/// Split a shell-like command string into individual arguments.
///
/// Rules:
///
/// - Unescaped spaces separate arguments; consecutive spaces do not produce
///   empty arguments.
/// - A double quote toggles "inside quotes"; spaces inside quotes are
///   literal. The quote characters themselves are not emitted.
/// - Inside quotes, a backslash immediately before a double quote escapes
///   that quote (the backslash is consumed). A backslash before any other
///   character is emitted literally.
/// - An unmatched quote at end-of-string flushes the remaining buffered text
///   as a final argument.
/// - Leading/trailing whitespace around the whole string is trimmed.
///
/// `the "quick fox"` becomes `["the", "quick fox"]`.
pub fn tokenize(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let mut args: Vec<String> = Vec::new();
    let mut arg = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    // Append one char, re-emitting a pending backslash that did not end up
    // escaping a quote.
    fn append(arg: &mut String, escaped: &mut bool, c: char) {
        if *escaped && c != '"' {
            arg.push('\\');
        }
        arg.push(c);
        *escaped = false;
    }

    for c in raw.chars() {
        if c == '"' {
            if escaped {
                append(&mut arg, &mut escaped, c);
            } else {
                in_quotes = !in_quotes;
            }
            continue;
        }

        if c == '\\' && escaped {
            append(&mut arg, &mut escaped, c);
            continue;
        }

        if c == '\\' && in_quotes {
            escaped = true;
            continue;
        }

        if c == ' ' && !in_quotes {
            if !arg.is_empty() {
                args.push(std::mem::take(&mut arg));
            }
            continue;
        }

        append(&mut arg, &mut escaped, c);
    }

    // Unmatched quote or trailing text: flush whatever is buffered. Quoted
    // whitespace in the buffer is literal, so no trimming here.
    if escaped {
        arg.push('\\');
    }
    if !arg.is_empty() {
        args.push(arg);
    }

    args
}
