//! Municipality name normalization.
//!
//! Both the reference keys and the incoming location strings go through the
//! same pipeline, so a lookup hit means the two sides agree on the canonical
//! spelling-insensitive form: lowercase, diacritics folded to ASCII,
//! punctuation dropped, whitespace collapsed, leading administrative
//! designators ("Gemeinde", "Commune de", ...) stripped.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    static ref ADMIN_DESIGNATOR: Regex = Regex::new(
        r"^(?:municipality of|city of|gemeinde|stadt|commune de|commune|comune di|comune|ville de|ville) "
    )
    .unwrap();
}

/// Normalize a municipality or location name into its matching key.
///
/// Returns an empty string when nothing usable remains (empty input,
/// punctuation-only input).
pub fn normalize_name(raw: &str) -> String {
    let folded = fold_diacritics(&raw.to_lowercase());
    let spaced = NON_ALNUM.replace_all(&folded, " ");
    let collapsed = spaced.trim().to_string();
    ADMIN_DESIGNATOR.replace(&collapsed, "").trim().to_string()
}

/// Fold accented Latin characters to their ASCII base form.
///
/// Covers the characters that actually occur in Swiss municipality names and
/// the surrounding language area. Anything else unusual is left alone and
/// falls out in the punctuation pass.
fn fold_diacritics(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
            'ç' => out.push('c'),
            'è' | 'é' | 'ê' | 'ë' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'ñ' => out.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => out.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}
