//! Coarse device class derived from the user agent.

use std::fmt;

use crate::patterns::{RE_MOBILE_UA, RE_TABLET_UA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    /// Tablet markers win over mobile ones (Android tablets match both).
    pub fn detect(user_agent: &str) -> Self {
        if RE_TABLET_UA.is_match(user_agent) {
            DeviceType::Tablet
        } else if RE_MOBILE_UA.is_match(user_agent) {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
