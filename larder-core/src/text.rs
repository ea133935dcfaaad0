//! Ingredient name normalization and identifier derivation.
//!
//! `normalize` produces the comparable form stored as an ingredient's name.
//! `generate_id` turns that form into a URL-safe slug used as the storage key,
//! so the same real-world ingredient maps to the same key without a lookup.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize a raw ingredient name.
///
/// Lowercases (locale-agnostic), composes to NFC, collapses whitespace runs
/// to a single space and trims. Empty or whitespace-only input yields `""`.
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a stable slug identifier from a raw ingredient name.
///
/// The input is normalized, spaces become hyphens, Vietnamese vowels with
/// tone/diacritic marks and `đ` fold to their base Latin letter, and every
/// remaining character outside `[a-z0-9-]` is dropped.
///
/// ```
/// use larder_core::generate_id;
///
/// assert_eq!(generate_id("THỊT BÒ"), "thit-bo");
/// assert_eq!(generate_id("cà chua (500g)"), "ca-chua-500g");
/// ```
pub fn generate_id(raw: &str) -> String {
    normalize(raw)
        .chars()
        .map(|c| if c == ' ' { '-' } else { fold_diacritic(c) })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Fold a precomposed Vietnamese letter to its base Latin letter.
///
/// Covers every vowel with a tone mark (grave, acute, hook above, tilde,
/// dot below) on `a ă â e ê i o ô ơ u ư y`, the bare `ă â ê ô ơ ư`, and
/// `đ`. Input is expected lowercase and NFC-composed.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' => 'a',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'đ' => 'd',
        other => other,
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Normalizing twice is the same as normalizing once.
        #[test]
        fn prop_normalize_idempotent(s in "\\PC*") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        /// Identifiers only contain lowercase ASCII letters, digits and hyphens.
        #[test]
        fn prop_generate_id_charset(s in "\\PC*") {
            let id = generate_id(&s);
            prop_assert!(
                id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
                "unexpected character in {:?}",
                id
            );
        }

        /// Inputs that normalize equally produce equal identifiers.
        #[test]
        fn prop_generate_id_depends_only_on_normalized(
            s in "[a-zA-Zàáảãạăâđêôơư ]{0,24}",
            pad in "[ \t]{0,3}",
        ) {
            let noisy = format!("{pad}{}{pad}", s.to_uppercase());
            prop_assume!(normalize(&noisy) == normalize(&s));
            prop_assert_eq!(generate_id(&noisy), generate_id(&s));
        }
    }
}
