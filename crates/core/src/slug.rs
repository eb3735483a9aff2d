use std::collections::HashSet;

/// Lowercase ASCII slug: accented Latin letters are folded, every other run
/// of non-alphanumerics becomes a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'a'..='z' | '0'..='9' => None,
            _ => match fold_accent(ch) {
                Some(ascii) => Some(ascii),
                None => {
                    pending_dash = true;
                    continue;
                }
            },
        };
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        match folded {
            Some(ascii) => slug.push_str(ascii),
            None => slug.push(ch),
        }
    }
    slug
}

pub fn is_normalized(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

/// `base`, or `base-2`, `base-3`, ... whichever is first absent from `taken`.
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_owned();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_owned())
}

fn fold_accent(ch: char) -> Option<&'static str> {
    let ascii = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ç' => "c",
        'ñ' => "n",
        'ý' | 'ÿ' => "y",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        _ => return None,
    };
    Some(ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_italian_titles() {
        assert_eq!(slugify("Perché l'allenamento funzionale è utile?"), "perche-l-allenamento-funzionale-e-utile");
        assert_eq!(slugify("  Pilates & Yoga -- Legnago  "), "pilates-yoga-legnago");
        assert_eq!(slugify("EMS 2024"), "ems-2024");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn normalized_slugs_are_fixed_points() {
        assert!(is_normalized("termini-condizioni"));
        assert!(!is_normalized("Termini_Condizioni"));
        assert!(!is_normalized("-bordo-"));
        assert!(!is_normalized(""));
    }

    #[test]
    fn collisions_get_a_numeric_suffix() {
        let taken: HashSet<String> = ["pilates", "pilates-2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_slug("pilates", &taken), "pilates-3");
        assert_eq!(unique_slug("yoga", &taken), "yoga");
    }
}
