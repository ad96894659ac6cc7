//! CP/M 8.3 filename matching, including the `?` wildcard CP/M's Search
//! First/Next and Delete use.
//!
//! A `?` in either the base name or extension matches any single
//! character at that position, including a space-padding byte. Matching is
//! case-insensitive in the sense that CP/M filenames are always upper-case
//! ASCII already, so no case-folding is performed.

/// Returns true if `pattern` (base+ext, space-padded, `?` wildcarded)
/// matches `name` (base+ext, space-padded, with attribute bits already
/// masked off via [`crate::Attributes::plain_ext`]).
pub fn matches(pattern_fname: &[u8; 8], pattern_fext: &[u8; 3], fname: &[u8; 8], fext: &[u8; 3]) -> bool {
    bytes_match(pattern_fname, fname) && bytes_match(pattern_fext, fext)
}

fn bytes_match(pattern: &[u8], name: &[u8]) -> bool {
    pattern
        .iter()
        .zip(name.iter())
        .all(|(&p, &n)| p == b'?' || p == n)
}

/// Parses an 8.3 string like `"FOO.TXT"` or `"FOO"` into space-padded
/// fixed-width name/extension arrays, upper-casing along the way. Used by
/// the control console and by tests; the wire protocol never sends names
/// in this form.
pub fn parse_8_3(input: &str) -> ([u8; 8], [u8; 3]) {
    let mut fname = [b' '; 8];
    let mut fext = [b' '; 3];
    let (base, ext) = match input.split_once('.') {
        Some((b, e)) => (b, e),
        None => (input, ""),
    };
    for (slot, ch) in fname.iter_mut().zip(base.chars()) {
        *slot = ch.to_ascii_uppercase() as u8;
    }
    for (slot, ch) in fext.iter_mut().zip(ext.chars()) {
        *slot = ch.to_ascii_uppercase() as u8;
    }
    (fname, fext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let (fname, fext) = parse_8_3("FOO.TXT");
        assert!(matches(&fname, &fext, &fname, &fext));
    }

    #[test]
    fn wildcard_matches_any_char() {
        let (pat_name, pat_ext) = parse_8_3("FO?.T?T");
        let (name, ext) = parse_8_3("FOO.TXT");
        assert!(matches(&pat_name, &pat_ext, &name, &ext));
        let (other, ext2) = parse_8_3("BAR.TXT");
        assert!(!matches(&pat_name, &pat_ext, &other, &ext2));
    }
}
