//! URL-safe identifiers for albums and photos.
//!
//! Album directories and photo files are named by humans (`Summer in Lisbon`,
//! `IMG_2041.JPG`). Everything that ends up in a URL, an object-store key or a
//! derived filename goes through [`slugify`] first, so the same source name
//! always maps to the same identifier:
//!
//! - `Summer in Lisbon` → `summer-in-lisbon`
//! - `  Trip -- 2024 ` → `trip-2024`
//! - `IMG_2041` → `img2041`
//!
//! A slug that comes out empty (a name made only of punctuation) is not a
//! valid identifier; callers surface that as a configuration error.

/// Derive a URL-safe identifier from a human-readable name.
///
/// Lower-cases the input, turns every whitespace run into a single hyphen,
/// drops anything outside `[a-z0-9-]`, collapses repeated hyphens and trims
/// hyphens from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            slug.push(c);
        }
    }

    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('-').to_string()
}

/// Whether `id` has the shape every derived identifier must have:
/// `[a-z0-9](-?[a-z0-9])*`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && !id.ends_with('-')
        && !id.contains("--")
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates_spaces() {
        assert_eq!(slugify("Summer in Lisbon"), "summer-in-lisbon");
    }

    #[test]
    fn whitespace_runs_become_one_hyphen() {
        assert_eq!(slugify("Road \t  Trip"), "road-trip");
    }

    #[test]
    fn strips_punctuation_and_underscores() {
        assert_eq!(slugify("IMG_2041"), "img2041");
        assert_eq!(slugify("Paris (2019)!"), "paris-2019");
    }

    #[test]
    fn collapses_and_trims_hyphens() {
        assert_eq!(slugify("  Trip -- 2024 "), "trip-2024");
        assert_eq!(slugify("---edge---"), "edge");
    }

    #[test]
    fn hyphens_left_by_stripped_characters_collapse() {
        assert_eq!(slugify("a - & - b"), "a-b");
    }

    #[test]
    fn non_ascii_letters_are_dropped() {
        assert_eq!(slugify("Café Zürich"), "caf-zrich");
    }

    #[test]
    fn punctuation_only_name_yields_empty_slug() {
        assert_eq!(slugify("!!!"), "");
        assert!(!is_valid_id(&slugify("!!!")));
    }

    #[test]
    fn slug_is_stable_across_calls() {
        let name = "Winter / Hokkaido 2023";
        assert_eq!(slugify(name), slugify(name));
        assert_eq!(slugify(&slugify(name)), slugify(name));
    }

    #[test]
    fn every_slug_of_a_mixed_corpus_is_a_valid_id() {
        let names = [
            "Summer in Lisbon",
            "2024-01-03 New Year",
            " -- Odd--Name -- ",
            "UPPER lower 123",
            "tabs\tand\nnewlines",
            "émoji 📷 album",
            "a",
            "9",
        ];
        for name in names {
            let slug = slugify(name);
            assert!(is_valid_id(&slug), "{name:?} produced invalid id {slug:?}");
        }
    }

    #[test]
    fn valid_id_rejects_malformed_shapes() {
        assert!(is_valid_id("a-b-c"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("-a"));
        assert!(!is_valid_id("a-"));
        assert!(!is_valid_id("a--b"));
        assert!(!is_valid_id("A"));
        assert!(!is_valid_id("a_b"));
    }
}
