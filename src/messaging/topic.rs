// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Topic names, topic filters and broker addresses.
//!
//! Topic names (what a message is published to) may not contain wildcards.
//! Topic filters (what a subscription matches) may use `+` for exactly one
//! level and `#` for all remaining levels; both must occupy a whole level and
//! `#` must be last. Wildcards never match topics starting with `$` at the
//! first level.

use url::Url;

const MAX_TOPIC_LEN: usize = 65_535;

/// Schemes a broker address may use. `mem` addresses the in-process broker.
pub const BROKER_SCHEMES: [&str; 7] = ["mqtt", "mqtts", "tcp", "ssl", "ws", "wss", "mem"];

fn validate_common(topic: &str) -> Result<(), String> {
    if topic.is_empty() {
        return Err("topic is empty".to_string());
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(format!("topic exceeds {} bytes", MAX_TOPIC_LEN));
    }
    if topic.contains('\0') {
        return Err("topic contains a NUL byte".to_string());
    }
    Ok(())
}

/// Validate a topic that messages are published to.
pub fn validate_topic_name(topic: &str) -> Result<(), String> {
    validate_common(topic)?;
    if topic.contains(['+', '#']) {
        return Err("wildcards are not allowed in a publish topic".to_string());
    }
    Ok(())
}

/// Validate a subscription topic filter.
pub fn validate_topic_filter(filter: &str) -> Result<(), String> {
    validate_common(filter)?;
    let levels: Vec<&str> = filter.split('/').collect();
    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index != levels.len() - 1) {
            return Err("'#' must be the whole last level of a topic filter".to_string());
        }
        if level.contains('+') && *level != "+" {
            return Err("'+' must occupy a whole topic level".to_string());
        }
    }
    Ok(())
}

/// True if `topic` is matched by `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Parse a broker address and render it as `scheme://host[:port]`.
pub fn normalize_broker_address(address: &str) -> Result<String, String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    if !BROKER_SCHEMES.contains(&url.scheme()) {
        return Err(format!("unsupported broker scheme '{}'", url.scheme()));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "broker address has no host".to_string())?
        .to_ascii_lowercase();

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
