//! User-agent classification
//!
//! Parses raw user-agent strings into the structured fields stored on each
//! click event, using woothee for the heavy lifting. Parsing is best-effort:
//! an absent or unrecognizable string yields an all-absent result, never an
//! error.

use serde::Serialize;
use woothee::parser::Parser;

/// Coarse device classification for a click event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Desktop => "desktop",
            DeviceCategory::Mobile => "mobile",
            DeviceCategory::Tablet => "tablet",
            DeviceCategory::Bot => "bot",
            DeviceCategory::Unknown => "unknown",
        }
    }
}

/// Structured fields parsed from a user-agent string.
///
/// Either fully derived from a successful parse or entirely absent; fields
/// are never populated with placeholder garbage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAgentInfo {
    pub device_category: Option<DeviceCategory>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub engine: Option<String>,
}

/// Classify a raw user-agent header value.
pub fn classify(user_agent: Option<&str>) -> UserAgentInfo {
    let ua = match user_agent {
        Some(ua) if !ua.is_empty() => ua,
        _ => return UserAgentInfo::default(),
    };

    let parser = Parser::new();
    let result = match parser.parse(ua) {
        Some(result) => result,
        None => return UserAgentInfo::default(),
    };

    let browser_name = non_unknown(result.name);
    let engine = browser_name
        .as_deref()
        .and_then(engine_for_browser)
        .map(str::to_string);

    UserAgentInfo {
        device_category: Some(device_category(result.category, &result.os, ua)),
        browser_version: non_empty(&result.version),
        os_name: non_unknown(&result.os),
        os_version: non_empty(&result.os_version),
        browser_name,
        engine,
    }
}

/// Rendering engine by browser family. Chromium derivatives share Blink;
/// anything woothee reports as plain Safari is WebKit.
fn engine_for_browser(browser: &str) -> Option<&'static str> {
    match browser {
        "Chrome" | "Edge" | "Opera" | "Vivaldi" => Some("Blink"),
        "Firefox" => Some("Gecko"),
        "Safari" => Some("WebKit"),
        _ => None,
    }
}

fn device_category(category: &str, os: &str, ua: &str) -> DeviceCategory {
    if category == "crawler" {
        return DeviceCategory::Bot;
    }
    if is_tablet(os, ua) {
        return DeviceCategory::Tablet;
    }
    match category {
        "smartphone" | "mobilephone" => DeviceCategory::Mobile,
        "pc" => DeviceCategory::Desktop,
        _ => DeviceCategory::Unknown,
    }
}

/// Woothee folds tablets into its smartphone category, so tablet form
/// factors are recovered from the OS and the Android convention that tablet
/// user agents omit the "Mobile" token.
fn is_tablet(os: &str, ua: &str) -> bool {
    if os == "iPad" || ua.contains("iPad") || ua.contains("Tablet") {
        return true;
    }
    ua.contains("Android") && !ua.contains("Mobile")
}

fn non_unknown(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}
