//! Container naming.
//!
//! Each tenant gets its own storage container. Names must be 3-63
//! characters of lowercase ASCII letters, digits and single hyphens, and
//! must start and end with a letter or digit.

/// Minimum container name length.
pub const MIN_LEN: usize = 3;

/// Maximum container name length.
pub const MAX_LEN: usize = 63;

/// Padding appended to names shorter than [`MIN_LEN`].
pub const PAD_CHAR: char = '0';

/// Slug used when a tenant normalizes to nothing.
pub const UNKNOWN_SLUG: &str = "unknown";

/// Lowercase, map every character outside `[a-z0-9]` to `-`, collapse
/// hyphen runs and strip leading and trailing hyphens.
fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let c = c.to_ascii_lowercase();
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Canonical form of a tenant as used in bucket keys.
///
/// Two tenants with the same slug land in the same container, so buckets
/// are keyed on the slug. Idempotent.
pub fn tenant_slug(tenant: &str) -> String {
    let slug = slugify(tenant);
    if slug.is_empty() {
        UNKNOWN_SLUG.to_string()
    } else {
        slug
    }
}

/// Force an arbitrary string into a legal container name. Idempotent.
pub fn legalize(name: &str) -> String {
    let mut name = slugify(name);
    if name.len() > MAX_LEN {
        // slugify output is ASCII
        name.truncate(MAX_LEN);
        while name.ends_with('-') {
            name.pop();
        }
    }
    while name.len() < MIN_LEN {
        name.push(PAD_CHAR);
    }
    name
}

/// Container name for a tenant under the configured prefix.
pub fn container_name(tenant: &str, prefix: &str) -> String {
    legalize(&format!("{prefix}{}", tenant_slug(tenant)))
}

/// Whether `name` already satisfies the container naming rules.
pub fn is_legal(name: &str) -> bool {
    let bytes = name.as_bytes();
    (MIN_LEN..=MAX_LEN).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first() != Some(&b'-')
        && bytes.last() != Some(&b'-')
        && !name.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqdn_to_container() {
        assert_eq!(container_name("example.com", "logs-"), "logs-example-com");
        assert_eq!(
            container_name("API.Tenant-01.example.org", "logs-"),
            "logs-api-tenant-01-example-org"
        );
    }

    #[test]
    fn test_unknown_tenant_container() {
        assert_eq!(container_name("unknown", "logs-"), "logs-unknown");
        assert_eq!(container_name("", "logs-"), "logs-unknown");
        assert_eq!(container_name("...", "logs-"), "logs-unknown");
    }

    #[test]
    fn test_punctuation_collapses() {
        assert_eq!(legalize("--A..b__c--"), "a-b-c");
        assert_eq!(legalize("Ünïcode.host"), "n-code-host");
    }

    #[test]
    fn test_short_names_are_padded() {
        assert_eq!(legalize(""), "000");
        assert_eq!(legalize("a"), "a00");
        assert_eq!(legalize("-ab-"), "ab0");
        assert!(is_legal(&container_name("x", "")));
    }

    #[test]
    fn test_long_names_are_truncated_without_trailing_hyphen() {
        let tenant = format!("{}.b", "a".repeat(57));
        let name = container_name(&tenant, "logs-");
        // "logs-" + 57 'a' = 62 chars, then '-' at index 62 is cut
        assert_eq!(name.len(), 62);
        assert!(is_legal(&name));

        let long = container_name(&"x".repeat(200), "logs-");
        assert_eq!(long.len(), MAX_LEN);
        assert!(is_legal(&long));
    }

    #[test]
    fn test_legalize_is_idempotent() {
        for input in ["", "a", "Example.COM:443", "--x--", &"ab-".repeat(40)] {
            let once = legalize(input);
            assert_eq!(legalize(&once), once);
            assert!(is_legal(&once), "{once}");
        }
    }

    #[test]
    fn test_prefix_is_legalized() {
        assert_eq!(container_name("example.com", "Logs_"), "logs-example-com");
        assert_eq!(container_name("example.com", ""), "example-com");
    }

    #[test]
    fn test_is_legal() {
        assert!(is_legal("logs-example-com"));
        assert!(!is_legal("ab"));
        assert!(!is_legal("-abc"));
        assert!(!is_legal("abc-"));
        assert!(!is_legal("a--b"));
        assert!(!is_legal("ABC"));
        assert!(!is_legal("a/b/c"));
    }
}
