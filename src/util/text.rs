use std::borrow::Cow;

/// Removes control characters from a string, including ANSI escape
/// sequences, so untrusted feed/category titles cannot inject terminal
/// escapes or corrupt persisted settings keys.
///
/// Tabs, newlines and carriage returns are preserved. CSI sequences
/// (`ESC [` ... final byte) are dropped wholesale; any other ESC is dropped
/// together with its immediate follower.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_kept(c: char) -> bool {
        !c.is_control() || matches!(c, '\t' | '\n' | '\r')
    }

    if s.chars().all(is_kept) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                // CSI sequence: consume up to and including the final byte
                chars.next();
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            } else {
                // Two-character escape (ESC + one byte)
                chars.next();
            }
        } else if is_kept(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_returns_borrowed() {
        let input = "Linux Weekly News";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn preserves_tabs_and_newlines() {
        let input = "line1\nline2\ttabbed\r\n";
        assert_eq!(strip_control_chars(input), input);
    }

    #[test]
    fn strips_csi_sequence() {
        assert_eq!(strip_control_chars("\x1b[31mEvil\x1b[0m"), "Evil");
    }

    #[test]
    fn strips_bare_controls() {
        assert_eq!(strip_control_chars("a\x00b\x07c"), "abc");
    }

    #[test]
    fn strips_two_char_escape() {
        assert_eq!(strip_control_chars("\x1bcreset"), "reset");
    }
}
