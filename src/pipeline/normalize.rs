//! OCR text cleanup applied before display and parsing.
//!
//! The rules target artifacts seen in scanned Bulgarian lab reports: exotic
//! dash code points, table rules read as `|`, and `%` recognized as `-96`.

/// Dash variants unified to ASCII `-`.
const DASHES: &[char] = &[
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}', '\u{FE58}',
    '\u{FE63}', '\u{FF0D}',
];

/// Normalize OCR output. Idempotent; line breaks are preserved.
pub fn normalize(text: &str) -> String {
    let unified: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\r' => Some('\n'),
            '|' | '¦' => Some(' '),
            c if DASHES.contains(&c) => Some('-'),
            c if c.is_control() && c != '\n' && c != '\t' => None,
            c => Some(c),
        })
        .collect();
    collapse_horizontal_whitespace(&repair_percent(&unified))
}

/// Replace `-96` artifacts with ` %`.
fn repair_percent(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if is_percent_artifact(&chars, i) {
            out.push_str(" %");
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// `-96` preceded by whitespace, a letter or start of text, and not followed
/// by a digit or a decimal separator.
fn is_percent_artifact(chars: &[char], i: usize) -> bool {
    if chars.get(i..i + 3) != Some(&['-', '9', '6'][..]) {
        return false;
    }
    let before_ok = i == 0 || {
        let prev = chars[i - 1];
        prev.is_whitespace() || prev.is_alphabetic()
    };
    let after_ok = match chars.get(i + 3) {
        None => true,
        Some(c) => !(c.is_ascii_digit() || *c == '.' || *c == ','),
    };
    before_ok && after_ok
}

fn collapse_horizontal_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    let mut pending: Option<char> = None;
    for c in text.chars() {
        if c.is_whitespace() && c != '\n' {
            run += 1;
            if run == 1 {
                pending = Some(c);
            }
            continue;
        }
        if run > 0 {
            out.push(if run > 1 { ' ' } else { pending.unwrap_or(' ') });
            run = 0;
        }
        out.push(c);
    }
    if run > 0 {
        out.push(if run > 1 { ' ' } else { pending.unwrap_or(' ') });
    }
    out
}
