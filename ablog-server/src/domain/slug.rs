use rand::distributions::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 6;

/// Lowercases and hyphenates `text` into a URL-safe slug.
///
/// Runs of anything that is not an ASCII letter or digit collapse into a
/// single `-`, and leading/trailing hyphens are dropped. Text without a single
/// usable character yields `"post"` so callers always get a routable value.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Appends a random lowercase alphanumeric suffix, used when a slug is taken.
pub fn with_random_suffix(slug: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", slug, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust   & Actix -- Notes "), "rust-actix-notes");
        assert_eq!(slugify("Top 10 Tips"), "top-10-tips");
    }

    #[test]
    fn slugify_falls_back_when_nothing_is_usable() {
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify("Привет"), "post");
    }

    #[test]
    fn random_suffix_keeps_base_and_is_url_safe() {
        let slug = with_random_suffix("hello-world");
        let suffix = slug.strip_prefix("hello-world-").unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
