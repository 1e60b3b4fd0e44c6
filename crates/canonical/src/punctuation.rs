//! Typography folding tables.
//!
//! Cleanup passes (PDF → Markdown, model rewrites) routinely swap quote and
//! dash variants, so both sides of a comparison are folded to one form.

/// Every quote-like mark maps to `"`.
pub(crate) fn fold_quote(c: char) -> char {
    match c {
        '"' | '\'' | '`' | '\u{00B4}' | '\u{2018}'..='\u{201F}' | '\u{2032}' | '\u{2033}' => '"',
        other => other,
    }
}

/// Hyphen, non-breaking hyphen, figure/en/em dash, horizontal bar, minus.
pub(crate) fn fold_dash(c: char) -> char {
    match c {
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}

pub(crate) fn is_soft_hyphen(c: char) -> bool {
    c == '\u{00AD}'
}

/// Punctuation that should never be preceded by whitespace after folding.
pub(crate) fn is_tight_punctuation(c: char) -> bool {
    matches!(c, ',' | '.' | '!' | '?' | ';' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_fold_to_straight_double() {
        for c in ['"', '\'', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201E}'] {
            assert_eq!(fold_quote(c), '"', "{c:?}");
        }
        assert_eq!(fold_quote('a'), 'a');
    }

    #[test]
    fn dashes_fold_to_hyphen_minus() {
        for c in ['\u{2010}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}'] {
            assert_eq!(fold_dash(c), '-', "{c:?}");
        }
        assert_eq!(fold_dash('-'), '-');
        assert_eq!(fold_dash('_'), '_');
    }
}
