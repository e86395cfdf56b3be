//! Miscellaneous string helpers that don't belong to any particular
//! subsystem.

/// Escapes control and quote characters the way a C back end expects:
/// `\n`, `\t`, `\v`, `\b`, `\r`, `\f`, `\a`, `\"`, with `\xHH` as the
/// fall-back for anything else unprintable.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\x08' => out.push_str("\\b"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '\x07' => out.push_str("\\a"),
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Does the file name carry the given extension (without the dot)?
pub fn has_ext(name: &str, ext: &str) -> bool {
    let tail = format!(".{}", ext);
    name.ends_with(&tail)
}

/// Replaces the file name's extension, or appends one if there is none.
pub fn change_ext(name: &str, ext: &str) -> String {
    match name.rfind('.') {
        Some(i) => format!("{}{}", &name[..i], ext),
        None => format!("{}{}", name, ext),
    }
}

/// Replaces every occurrence of `pattern` in `input` with `replacement`.
pub fn search_and_replace(input: &str, pattern: &str, replacement: &str) -> String {
    input.replace(pattern, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_common_sequences() {
        assert_eq!(escape_str("a\nb\tc"), "a\\nb\\tc");
        assert_eq!(escape_str("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_str("bell\x07"), "bell\\a");
        assert_eq!(escape_str("\x01"), "\\x01");
        assert_eq!(escape_str("plain"), "plain");
    }

    #[test]
    fn extension_helpers() {
        assert!(has_ext("foo.c", "c"));
        assert!(!has_ext("foo.cc", "c"));
        assert!(!has_ext("foo", "c"));
        assert_eq!(change_ext("foo.c", ".o"), "foo.o");
        assert_eq!(change_ext("foo", ".o"), "foo.o");
    }

    #[test]
    fn search_and_replace_all_occurrences() {
        assert_eq!(search_and_replace("a-b-c", "-", "+"), "a+b+c");
        assert_eq!(search_and_replace("abc", "x", "y"), "abc");
    }
}
