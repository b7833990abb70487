//! Environment variable interpolation for config files.
//!
//! Supported syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                                   # escaped dollar
        |
        \$\{ ([A-Za-z_][A-Za-z0-9_]*) (?: (:?-) ([^}]*) )? \}   # ${VAR}, ${VAR-d}, ${VAR:-d}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)             # $VAR
        ",
    )
    .expect("env var pattern is valid")
});

/// Expand environment variables in `input`.
///
/// Every problem is collected so that a config with several missing variables
/// reports all of them in one pass.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let whole = &caps[0];
        if whole == "$$" {
            return "$".to_string();
        }

        let name = caps
            .get(1)
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        let empty_uses_default = caps.get(2).is_some_and(|m| m.as_str() == ":-");
        let default = caps.get(3).map(|m| m.as_str());

        match (env::var(name), default) {
            (Ok(value), _) if value.contains(['\n', '\r']) => {
                errors.push(format!(
                    "environment variable '{name}' contains newlines, which is not allowed"
                ));
                whole.to_string()
            }
            (Ok(value), Some(default)) if value.is_empty() && empty_uses_default => {
                default.to_string()
            }
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        }
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(errors)
    }
}
