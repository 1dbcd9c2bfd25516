//! Port identity, port record and its lifecycle.

use crate::MigrateError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Compare two identifiers so that digit runs order numerically
/// (`Gi1/0/2 < Gi1/0/10`). Falls back to byte order for equal-valued runs
/// such as `01` and `1`, so the ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let si = i;
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }
            let na = trim_zeros(&ab[si..i]);
            let nb = trim_zeros(&bb[sj..j]);
            let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ab[i].cmp(&bb[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (ab.len() - i).cmp(&(bb.len() - j)).then_with(|| a.cmp(b))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let n = digits.iter().take_while(|c| **c == b'0').count();
    &digits[n..]
}

/// A physical port: switch plus interface name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortKey {
    pub switch_id: String,
    pub port_id: String,
}

impl PortKey {
    pub fn new(switch_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        PortKey { switch_id: switch_id.into(), port_id: port_id.into() }
    }
}

impl Ord for PortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.switch_id, &other.switch_id)
            .then_with(|| natural_cmp(&self.port_id, &other.port_id))
    }
}

impl PartialOrd for PortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.switch_id, self.port_id)
    }
}

impl FromStr for PortKey {
    type Err = MigrateError;

    /// Parse `SWITCH:PORT`. The split is on the first colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((sw, port)) if !sw.trim().is_empty() && !port.trim().is_empty() => {
                Ok(PortKey::new(sw.trim(), port.trim()))
            }
            _ => Err(MigrateError::InvalidKey { input: s.to_string() }),
        }
    }
}

/// Link/admin state observed by `show interface status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortStatus {
    Connected,
    NotConnected,
    Disabled,
    ErrorDisabled,
    Inactive,
    Other(String),
}

impl PortStatus {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        match t.to_ascii_lowercase().as_str() {
            "connected" => PortStatus::Connected,
            "notconnect" | "notconnected" | "not-connected" | "not connected" => {
                PortStatus::NotConnected
            }
            "disabled" => PortStatus::Disabled,
            "err-disabled" | "errdisabled" | "error-disabled" => PortStatus::ErrorDisabled,
            "inactive" => PortStatus::Inactive,
            _ => PortStatus::Other(t.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PortStatus::Connected => "connected",
            PortStatus::NotConnected => "not-connected",
            PortStatus::Disabled => "disabled",
            PortStatus::ErrorDisabled => "error-disabled",
            PortStatus::Inactive => "inactive",
            PortStatus::Other(s) => s,
        }
    }

    /// No host link and not faulted: usable as a migration destination.
    pub fn is_spare(&self) -> bool {
        matches!(self, PortStatus::NotConnected | PortStatus::Disabled)
    }
}

impl From<String> for PortStatus {
    fn from(s: String) -> Self {
        PortStatus::parse(&s)
    }
}

impl From<PortStatus> for String {
    fn from(s: PortStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migration lifecycle of a record. Ordered; transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    #[default]
    Unplanned,
    Planned,
    Executed,
    Confirmed,
}

impl MoveState {
    /// Move to `to` if it is ahead of the current state. Returns whether the state changed.
    pub fn advance(&mut self, to: MoveState) -> bool {
        if to > *self {
            *self = to;
            true
        } else {
            false
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveState::Unplanned => "unplanned",
            MoveState::Planned => "planned",
            MoveState::Executed => "executed",
            MoveState::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access-switch port and whatever host is patched into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub switch_id: String,
    pub port_id: String,
    pub description: String,
    pub status: PortStatus,
    pub vlan: String,
    pub speed: String,
    pub duplex: String,
    pub critical: bool,
    pub final_switch: Option<String>,
    pub move_state: MoveState,
    /// Destination reserved for this record's host by the move planner.
    pub planned_destination: Option<PortKey>,
}

impl PortRecord {
    pub fn new(
        switch_id: impl Into<String>,
        port_id: impl Into<String>,
        status: PortStatus,
    ) -> Self {
        PortRecord {
            switch_id: switch_id.into(),
            port_id: port_id.into(),
            description: String::new(),
            status,
            vlan: String::new(),
            speed: String::new(),
            duplex: String::new(),
            critical: false,
            final_switch: None,
            move_state: MoveState::Unplanned,
            planned_destination: None,
        }
    }

    pub fn key(&self) -> PortKey {
        PortKey::new(self.switch_id.clone(), self.port_id.clone())
    }

    pub fn is_at(&self, key: &PortKey) -> bool {
        self.switch_id == key.switch_id && self.port_id == key.port_id
    }

    /// Free, non-critical port that can receive a migrated host.
    pub fn is_spare(&self) -> bool {
        self.status.is_spare() && !self.critical
    }

    /// Critical connected ports must carry a description naming the host.
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.critical
            && self.status == PortStatus::Connected
            && self.description.trim().is_empty()
        {
            return Err(MigrateError::Validation {
                key: self.key(),
                reason: "critical connected port has no description".into(),
            });
        }
        Ok(())
    }
}
