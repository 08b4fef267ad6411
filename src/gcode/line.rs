//! G-code line normalization.
//!
//! Pure functions only — no I/O. Strips comments and whitespace from a raw
//! line, upcases it, and extracts motion parameters. Used by the program
//! model when building a queue and by the streaming engine when computing
//! the byte cost of a command.

/// Removes each shortest `(...)` span in turn (non-nesting — equivalent to
/// the original's `re.sub(r"\(.*?\)", "", raw)`), then discards anything
/// from the first `;` onward, then trims and upcases what remains.
///
/// An unmatched `(` (no following `)`) never matches, so everything from it
/// onward is left in place, same as the regex it mirrors; a lone `)` with no
/// preceding `(` is likewise left untouched.
fn strip_paren_comments(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        match rest.find('(') {
            None => {
                result.push_str(rest);
                break;
            }
            Some(open) => {
                let after_open = &rest[open + 1..];
                match after_open.find(')') {
                    None => {
                        result.push_str(rest);
                        break;
                    }
                    Some(close) => {
                        result.push_str(&rest[..open]);
                        rest = &after_open[close + 1..];
                    }
                }
            }
        }
    }
    result
}

/// Strips `(...)` and `;`-onward comments, then trims and upcases.
pub fn normalize(raw: &str) -> String {
    let without_parens = strip_paren_comments(raw);
    let before_semicolon = without_parens.split(';').next().unwrap_or("");
    before_semicolon.trim().to_uppercase()
}

/// Bytes sent over the wire for a normalized line: the text followed by a
/// single `\n`. Its length is the cost used by flow control.
pub fn serial_bytes(normalized: &str) -> Vec<u8> {
    let mut bytes = normalized.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

/// `true` if `normalized` begins with a rapid or linear/arc motion word
/// (`G0`, `G1`, `G2`, `G3`).
pub fn is_motion(normalized: &str) -> bool {
    ["G0", "G1", "G2", "G3"]
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}

/// `true` if `normalized` contains a laser/spindle-on word (`M3` or `M4`).
pub fn is_laser_on(normalized: &str) -> bool {
    normalized.contains("M3") || normalized.contains("M4")
}

/// `true` if `normalized` contains a laser/spindle-off word (`M5`).
pub fn is_laser_off(normalized: &str) -> bool {
    normalized.contains("M5")
}

/// Extracts the first numeric value following letter `letter` in
/// `normalized` (e.g. `param(line, 'X')` on `"G1 X-10.5 Y3"` returns
/// `Some(-10.5)`). Returns `None` if the letter doesn't appear followed by
/// a number.
pub fn param(normalized: &str, letter: char) -> Option<f64> {
    let bytes = normalized.as_bytes();
    let letter_upper = letter.to_ascii_uppercase() as u8;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == letter_upper {
            let rest = &normalized[i + 1..];
            let mut end = 0;
            let mut chars = rest.chars();
            if let Some(c) = chars.clone().next() {
                if c == '+' || c == '-' {
                    end += c.len_utf8();
                    chars.next();
                }
            }
            let mut saw_digit = false;
            let mut saw_dot = false;
            for c in chars {
                if c.is_ascii_digit() {
                    saw_digit = true;
                    end += c.len_utf8();
                } else if c == '.' && !saw_dot {
                    saw_dot = true;
                    end += c.len_utf8();
                } else {
                    break;
                }
            }
            if saw_digit {
                if let Ok(value) = rest[..end].parse::<f64>() {
                    return Some(value);
                }
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parenthetical_comment() {
        assert_eq!(normalize("G1 X5 (inline) Y6 ; tail"), "G1 X5  Y6");
    }

    #[test]
    fn strips_semicolon_comment() {
        assert_eq!(normalize("G0 X1 ; move"), "G0 X1");
    }

    #[test]
    fn parens_do_not_nest() {
        // Non-greedy match closes at the first ')', leaving the rest of the
        // outer group (here "c)") behind — matches `re.sub(r"\(.*?\)", "", s)`.
        assert_eq!(normalize("(a(b)c)"), "C)");
    }

    #[test]
    fn unmatched_close_paren_is_kept() {
        assert_eq!(normalize("G1 X5 )JUNK"), "G1 X5 )JUNK");
    }

    #[test]
    fn unmatched_open_paren_keeps_rest_of_line() {
        assert_eq!(normalize("G1 (no close X5"), "G1 (NO CLOSE X5");
    }

    #[test]
    fn upcases() {
        assert_eq!(normalize("g1 x10"), "G1 X10");
    }

    #[test]
    fn idempotent() {
        for line in ["G1 X5 (inline) Y6 ; tail", "g0 x1", "   ", "M3 S1000"] {
            let once = normalize(line);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn empty_after_strip() {
        assert_eq!(normalize("   ; just a comment"), "");
        assert_eq!(normalize("(comment only)"), "");
    }

    #[test]
    fn serial_bytes_appends_newline() {
        assert_eq!(serial_bytes("G0 X10"), b"G0 X10\n".to_vec());
    }

    #[test]
    fn motion_predicate() {
        assert!(is_motion("G0 X10"));
        assert!(is_motion("G1 X10 F500"));
        assert!(is_motion("G2 X10 Y10 I5 J5"));
        assert!(is_motion("G3 X10 Y10 I5 J5"));
        assert!(!is_motion("M3 S1000"));
        assert!(!is_motion("$H"));
    }

    #[test]
    fn laser_predicates() {
        assert!(is_laser_on("M3 S1000"));
        assert!(is_laser_on("M4"));
        assert!(!is_laser_on("M5"));
        assert!(is_laser_off("M5"));
        assert!(!is_laser_off("M3"));
    }

    #[test]
    fn param_extraction() {
        assert_eq!(param("G1 X-10.5 Y3", 'X'), Some(-10.5));
        assert_eq!(param("G1 X-10.5 Y3", 'Y'), Some(3.0));
        assert_eq!(param("G1 X-10.5 Y3", 'Z'), None);
        assert_eq!(param("G1 F500", 'F'), Some(500.0));
        assert_eq!(param("M3 S1000", 'S'), Some(1000.0));
    }

    #[test]
    fn param_missing_number_after_letter() {
        assert_eq!(param("G28", 'G'), None);
    }
}
