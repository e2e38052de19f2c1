// Device Classification
//
// Best-effort mapping of a browser user agent to a coarse device category.
// This is a heuristic and is never treated as authoritative: unusual or
// spoofed signatures will be misclassified.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::DeviceCategory;

static TABLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tablet|ipad|playbook|silk").expect("valid tablet pattern"));

static ANDROID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)android").expect("valid android pattern"));

static MOBI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)mobi").expect("valid mobi pattern"));

static MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"Mobile|Android|iP(hone|od)|IEMobile|BlackBerry|Kindle|",
        r"Silk-Accelerated|(hpw|web)OS|Opera M(obi|ini)",
    ))
    .expect("valid mobile pattern")
});

/// Rules are tried in order; the first match wins.
/// Tablets go first because most tablet agents also look like phones.
const RULES: [(DeviceCategory, fn(&str) -> bool); 2] = [
    (DeviceCategory::Tablet, is_tablet),
    (DeviceCategory::Mobile, is_mobile),
];

pub fn classify_device(signature: &str) -> DeviceCategory {
    RULES
        .iter()
        .find(|(_, matches)| matches(signature))
        .map(|(category, _)| *category)
        .unwrap_or(DeviceCategory::Desktop)
}

fn is_tablet(signature: &str) -> bool {
    if TABLET.is_match(signature) {
        return true;
    }
    // Android without a "mobi" marker after it is a tablet
    ANDROID
        .find(signature)
        .is_some_and(|m| !MOBI.is_match(&signature[m.end()..]))
}

fn is_mobile(signature: &str) -> bool {
    MOBILE.is_match(signature)
}
