//! Field extraction from Windows-Event-Log-style rendered messages.

use once_cell::sync::Lazy;
use regex::Regex;

static ACCOUNT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*Account Name:\s*(\S+)\s*$").expect("valid regex"));

static LOGON_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*Logon Type:\s*(\d+)\s*$").expect("valid regex"));

/// Extract the first `Account Name:` field from a rendered event message.
pub fn account_name(message: &str) -> Option<String> {
    ACCOUNT_NAME
        .captures(message)
        .map(|c| c[1].to_string())
}

/// Extract the `Logon Type:` field from a rendered event message.
pub fn logon_type(message: &str) -> Option<i32> {
    LOGON_TYPE
        .captures(message)
        .and_then(|c| c[1].parse().ok())
}
