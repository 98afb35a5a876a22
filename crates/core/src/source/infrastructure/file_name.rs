use unicode_normalization::UnicodeNormalization;

const MAX_STEM_CHARS: usize = 120;
const FALLBACK_STEM: &str = "video";
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns an arbitrary title into a file stem that is safe on every
/// mainstream filesystem.
///
/// Accented letters are transliterated to their ASCII base, anything else
/// outside ASCII is dropped. Never returns an empty string.
pub fn sanitize_file_stem(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;

    for c in title.nfkd().filter(char::is_ascii) {
        if c.is_ascii_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c.is_ascii_control() || RESERVED.contains(&c) {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    let mut stem = trim_edges(&out).to_string();
    if stem.len() > MAX_STEM_CHARS {
        stem.truncate(MAX_STEM_CHARS);
        stem = trim_edges(&stem).to_string();
    }
    if stem.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    let base = stem.split('.').next().unwrap_or_default();
    if DEVICE_NAMES.iter().any(|d| d.eq_ignore_ascii_case(base)) {
        stem.insert(0, '_');
    }
    stem
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == ' ' || c == '_')
}
