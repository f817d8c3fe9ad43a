//! Location: the (site, zone, unit) triple that keys the directory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{SiteId, UnitId, ZoneId};

/// A monitored physical space: one unit on one zone of one site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "siteID")]
    pub site: SiteId,
    #[serde(rename = "zoneID")]
    pub zone: ZoneId,
    #[serde(rename = "unitID")]
    pub unit: UnitId,
}

impl Location {
    #[must_use]
    pub fn new(site: SiteId, zone: ZoneId, unit: UnitId) -> Self {
        Self { site, zone, unit }
    }

    /// Shorthand used mostly in tests: `Location::of("1", "1", "1")`.
    #[must_use]
    pub fn of(site: &str, zone: &str, unit: &str) -> Self {
        Self::new(SiteId::new(site), ZoneId::new(zone), UnitId::new(unit))
    }

    /// The `site/zone/unit` path, as embedded in topics.
    #[must_use]
    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.site, self.zone, self.unit)
    }
}
