//! Name and text normalisation helpers.
//!
//! Display names are compared case-insensitively for uniqueness, but they are
//! stored and echoed in the form the client chose (after whitespace
//! simplification).

/// Trim both ends and collapse each internal run of whitespace into a single
/// ASCII space.
///
/// ```rust
/// assert_eq!(relay_proto::simplified("  big \t\n  bird "), "big bird");
/// ```
pub fn simplified(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Case-fold a name for identity comparison.
#[inline]
pub fn casefold(s: &str) -> String {
    s.to_lowercase()
}

/// Compare two names case-insensitively.
pub fn names_eq(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplified_trims_and_collapses() {
        assert_eq!(simplified("alice"), "alice");
        assert_eq!(simplified("  alice  "), "alice");
        assert_eq!(simplified("alice   cooper"), "alice cooper");
        assert_eq!(simplified("\talice\n\ncooper\r\n"), "alice cooper");
    }

    #[test]
    fn simplified_whitespace_only_is_empty() {
        assert_eq!(simplified(""), "");
        assert_eq!(simplified("   "), "");
        assert_eq!(simplified("\t\n\u{3000}"), "");
    }

    #[test]
    fn casefold_lowercases_unicode() {
        assert_eq!(casefold("Alice"), "alice");
        assert_eq!(casefold("ÉLODIE"), "élodie");
    }

    #[test]
    fn names_eq_ignores_case() {
        assert!(names_eq("Bob", "bOB"));
        assert!(names_eq("Zoë", "ZOË"));
        assert!(!names_eq("bob", "bobby"));
        assert!(!names_eq("bob", "rob"));
    }
}
