//! Tenant extraction.
//!
//! The tenant is the FQDN of the service that produced a record. It is
//! looked for, in order, in a forwarded-host header anywhere in the record,
//! in JSON embedded in the message, in a forwarded-host token in the
//! message, and finally in a generic `host:` token in the message.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::RawRecord;

/// Header carrying the original client-facing host. Matched case-insensitively.
pub const FORWARDED_HOST_KEY: &str = "x-forwarded-host";

/// Tenant used when no strategy yields a host.
pub const UNKNOWN_TENANT: &str = "unknown";

static FORWARDED_HOST_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bx-forwarded-host\b"?\s*[:=]\s*"?([^"\s,;]+)"#)
        .expect("forwarded host pattern compiles")
});

static HOST_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhost\b"?\s*[:=]\s*"?([^"\s,;]+)"#).expect("host pattern compiles")
});

/// Which strategy produced a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    ForwardedHostField,
    EmbeddedJson,
    ForwardedHostToken,
    HostToken,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    /// Lowercase host without port.
    pub name: String,
    pub source: TenantSource,
}

impl Tenant {
    fn new(name: String, source: TenantSource) -> Self {
        Self { name, source }
    }

    fn unknown() -> Self {
        Self::new(UNKNOWN_TENANT.to_string(), TenantSource::Unknown)
    }
}

/// Trim, take the first of a comma-separated list, drop any port and
/// lowercase. Empty results are rejected.
fn clean_host(raw: &str) -> Option<String> {
    let first = raw.split(',').next().unwrap_or_default();
    let host = first.trim().trim_matches(|c| c == '"' || c == '\'');
    let host = match host.rfind(':') {
        Some(idx) if host[idx + 1..].chars().all(|c| c.is_ascii_digit()) => &host[..idx],
        _ => host,
    };
    let host = host.trim().to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

fn header_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_host(s),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(s) => clean_host(s),
            _ => None,
        }),
        _ => None,
    }
}

/// Depth-first search for a forwarded-host header, in document order.
fn find_forwarded_host(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => find_in_fields(fields),
        Value::Array(items) => items.iter().find_map(find_forwarded_host),
        _ => None,
    }
}

fn find_in_fields(fields: &Map<String, Value>) -> Option<String> {
    fields.iter().find_map(|(key, value)| {
        if key.eq_ignore_ascii_case(FORWARDED_HOST_KEY)
            && let Some(host) = header_value(value)
        {
            return Some(host);
        }
        find_forwarded_host(value)
    })
}

/// Parse the first JSON value starting at the first `{` of `message`.
/// Trailing text after the value is ignored.
fn embedded_json(message: &str) -> Option<Value> {
    let start = message.find('{')?;
    serde_json::Deserializer::from_str(&message[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn token(pattern: &Regex, message: &str) -> Option<String> {
    pattern
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| clean_host(m.as_str()))
}

/// Extract the tenant for a record whose display message is `message`.
pub fn extract_tenant(record: &RawRecord, message: &str) -> Tenant {
    if let RawRecord::Structured(fields) = record
        && let Some(host) = find_in_fields(fields)
    {
        return Tenant::new(host, TenantSource::ForwardedHostField);
    }

    if message.to_ascii_lowercase().contains(FORWARDED_HOST_KEY) {
        if let Some(host) = embedded_json(message).as_ref().and_then(find_forwarded_host) {
            return Tenant::new(host, TenantSource::EmbeddedJson);
        }
        if let Some(host) = token(&FORWARDED_HOST_TOKEN, message) {
            return Tenant::new(host, TenantSource::ForwardedHostToken);
        }
    }

    if let Some(host) = token(&HOST_TOKEN, message) {
        return Tenant::new(host, TenantSource::HostToken);
    }

    Tenant::unknown()
}
