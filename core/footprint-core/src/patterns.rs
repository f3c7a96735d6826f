//! Compiled regex patterns for user-agent classification.
//!
//! Compiled once on first use. Update these when new device families need
//! to be recognised.

use once_cell::sync::Lazy;
use regex::Regex;

pub static RE_TABLET_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Tablet|iPad|Nexus 7|Nexus 10|SM-T|GT-P|Kindle|Silk").unwrap()
});

pub static RE_MOBILE_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Mobi|Android|iPhone|iPod|BlackBerry|IEMobile|Opera Mini").unwrap()
});
