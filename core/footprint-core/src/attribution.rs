//! Source attribution: campaign parameters and external referrer.
//!
//! Built once per activation from the page URL and referrer. Parse failures
//! are resolved conservatively and never surface as errors:
//!
//! - unparsable referrer → treated as internal, so it is left out
//! - unparsable host during the exclusion check → treated as not excluded
//!
//! The two rules lean in opposite directions on purpose; see DESIGN.md.

use url::Url;

use crate::config::TrackerConfig;
use crate::types::{SourceMap, REFERRER_KEY};

/// Builds the attribution map for the current page.
pub fn build_source(current_url: &str, referrer: &str, config: &TrackerConfig) -> SourceMap {
    let mut source = SourceMap::new();

    if !is_internal_referrer(referrer, current_url)
        && !is_excluded_referrer(referrer, &config.exclusion_list)
    {
        source.insert(REFERRER_KEY.to_string(), referrer.to_string());
    }

    if let Ok(url) = Url::parse(current_url) {
        for param in config.attribution_params() {
            // First occurrence wins, matching URLSearchParams::get
            let value = url
                .query_pairs()
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned());
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                source.insert(param.to_string(), value);
            }
        }
    }

    source
}

/// True when the referrer points at the current page's host, or when either
/// URL cannot be parsed.
pub fn is_internal_referrer(referrer: &str, current_url: &str) -> bool {
    let (Ok(referrer_url), Ok(current)) = (Url::parse(referrer), Url::parse(current_url)) else {
        return true;
    };
    referrer_url.host_str().unwrap_or_default() == current.host_str().unwrap_or_default()
}

/// True when the referrer host contains any exclusion substring.
/// Unparsable referrers are not excluded.
pub fn is_excluded_referrer(referrer: &str, exclusion_list: &[String]) -> bool {
    let url = match Url::parse(referrer) {
        Ok(url) => url,
        Err(_) => return false,
    };
    let host = url.host_str().unwrap_or_default();
    exclusion_list
        .iter()
        .any(|excluded| host.contains(excluded.as_str()))
}

/// A source is worth recording if it carries a whitelisted parameter or a referrer.
pub fn is_valid_new_source(source: &SourceMap, params: &[&str]) -> bool {
    let has_param = params
        .iter()
        .any(|param| source.get(*param).is_some_and(|v| !v.is_empty()));
    has_param || source.get(REFERRER_KEY).is_some_and(|v| !v.is_empty())
}

/// Compares two attribution maps. Absence on either side counts as different.
pub fn sources_are_different(a: Option<&SourceMap>, b: Option<&SourceMap>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}
