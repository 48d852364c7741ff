//! Wildcard matching for stored permission names.
//!
//! A stored name containing `*` is a pattern where each `*` matches any
//! substring, separators included. Matching is anchored at both ends and
//! case-sensitive. Requested names are always literals.

/// Wildcard character.
pub const WILDCARD: char = '*';

/// Whether a stored name is a wildcard pattern.
pub fn is_pattern(name: &str) -> bool {
    name.contains(WILDCARD)
}

/// Check whether a stored name grants a requested name.
///
/// # Example
///
/// ```
/// use warden_model::pattern::matches;
///
/// assert!(matches("users.*", "users.create"));
/// assert!(!matches("users.*", "admin.create"));
/// assert!(matches("users.create", "users.create"));
/// assert!(!matches("users.create", "users.*"));
/// ```
pub fn matches(stored: &str, requested: &str) -> bool {
    if stored == requested {
        return true;
    }
    if !is_pattern(stored) {
        return false;
    }
    glob(stored.as_bytes(), requested.as_bytes())
}

// Greedy matcher that backtracks only to the most recent `*`.
fn glob(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_wildcard() {
        assert!(matches("users.*", "users.create"));
        assert!(matches("users.*", "users.delete"));
        assert!(matches("users.*", "users."));
        assert!(matches("users.*", "users.profile.update"));
        assert!(!matches("users.*", "admin.create"));
        assert!(!matches("users.*", "users"));
    }

    #[test]
    fn test_literal_matches_only_itself() {
        assert!(matches("users.create", "users.create"));
        assert!(!matches("users.create", "users.created"));
        assert!(!matches("users.create", "users.*"));
        assert!(!matches("users.create", ""));
    }

    #[test]
    fn test_prefix_and_inner_wildcards() {
        assert!(matches("*.create", "posts.create"));
        assert!(!matches("*.create", "posts.delete"));
        assert!(matches("a*b*c", "aXXbYYc"));
        assert!(matches("a*b*c", "abc"));
        assert!(!matches("a*b*c", "acb"));
        assert!(matches("a*a", "aaa"));
    }

    #[test]
    fn test_lone_star_matches_everything() {
        assert!(matches("*", "anything.at.all"));
        assert!(matches("*", ""));
        assert!(matches("**", "x"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!matches("Users.*", "users.create"));
        assert!(!matches("users.Create", "users.create"));
    }

    #[test]
    fn test_non_ascii() {
        assert!(matches("équipe.*", "équipe.gérer"));
        assert!(!matches("équipe.*", "equipe.gérer"));
    }
}
