// ── Core identity types ──
//
// Handles identify elements held by the management service. Element
// references name them before resolution. MacAddress normalizes the
// spellings accepted in desired documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Handle ──────────────────────────────────────────────────────────

const PENDING_PREFIX: &str = "pending/";

/// Opaque reference to an element held by the management service.
///
/// Check-mode runs hand out *pending* handles for elements that would be
/// created; those never compare equal to a live handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Placeholder for an element that a check-mode run would create.
    pub fn pending(kind: ElementKind, name: &str) -> Self {
        Self(format!("{PENDING_PREFIX}{kind}/{name}"))
    }

    pub fn is_pending(&self) -> bool {
        self.0.starts_with(PENDING_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── Element kinds & references ─────────────────────────────────────

/// Element types the reconciler resolves or creates by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Network,
    Group,
    Host,
    RouteMap,
    ExternalBgpPeer,
    /// Another managed engine (single firewall or cluster).
    Engine,
    BgpProfile,
    BgpPeering,
    AutonomousSystem,
    Zone,
    LogServer,
}

impl ElementKind {
    /// Kinds accepted for announced and antispoofing networks.
    pub const NETWORK_LIKE: [Self; 3] = [Self::Network, Self::Group, Self::Host];

    pub fn is_network_like(self) -> bool {
        Self::NETWORK_LIKE.contains(&self)
    }
}

/// A named, not yet resolved element reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef {
    pub kind: ElementKind,
    pub name: String,
}

impl ElementRef {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated or dash-separated hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase().replace('-', ":");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for MacAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}
