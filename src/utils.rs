use rand::Rng;

/// Turns a title into a URL slug, optionally with a random suffix to dodge
/// a collision with an existing one.
pub fn slugify(title: &str, random_suffix: bool) -> String {
    let slug = slug::slugify(title);
    match (slug.is_empty(), random_suffix) {
        (true, _) => random_key(),
        (false, false) => slug,
        (false, true) => format!("{slug}-{}", random_key()),
    }
}

fn random_key() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Whether `error` is SQLite rejecting a duplicate value for `column`,
/// given as `table.column`.
pub fn is_unique_violation(error: &sqlx::Error, column: &str) -> bool {
    match error {
        sqlx::Error::Database(e) => {
            let message = e.message();
            message.contains("UNIQUE constraint failed") && message.contains(column)
        }
        _ => false,
    }
}

/// `None` for strings that are empty once trimmed.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_and_hyphenated() {
        assert_eq!(slugify("A Title!", false), "a-title");
        assert_eq!(slugify("How to train your dragon", false), "how-to-train-your-dragon");
    }

    #[test]
    fn suffixed_slugs_keep_the_base() {
        let slug = slugify("A Title!", true);
        let suffix = slug.strip_prefix("a-title-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert_ne!(slugify("A Title!", true), slug);
    }

    #[test]
    fn titles_without_slug_characters_still_get_a_slug() {
        assert_eq!(slugify("!!!", false).len(), 8);
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, "articles.slug"));
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert_eq!(non_blank("  "), None);
        assert_eq!(non_blank(" bob "), Some("bob"));
    }
}
