//! Task ID generation
//!
//! All IDs use the format: `{6-char-hex}-{type}-{slug}`
//! Example: `01a4f2-task-fix-login-timeout`

/// Generate an ID from type and title
pub fn generate_id(id_type: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    format!("{}-{}-{}", hex_prefix, id_type, slugify(title))
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = generate_id("task", "Fix login timeout");
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 6);
        assert_eq!(parts[1], "task");
        assert_eq!(parts[2], "fix-login-timeout");
    }

    #[test]
    fn test_slugify_strips_apostrophes() {
        assert_eq!(slugify("Don't break IDs"), "dont-break-ids");
        assert_eq!(slugify("user\u{2019}s profile"), "users-profile");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("a  --  b"), "a-b");
        assert_eq!(slugify("  edges  "), "edges");
    }

    #[test]
    fn test_ids_unique() {
        let a = generate_id("task", "same");
        let b = generate_id("task", "same");
        assert_ne!(a, b);
    }
}
