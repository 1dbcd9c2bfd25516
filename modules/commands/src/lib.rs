//! Render configuration text for a planned move.

use move_planner::{MigrationPlan, Move};
use portmove_core::PortRecord;
use serde::Serialize;
use std::fmt::Write;

/// Configuration for both ends of one move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMove {
    /// Source port: clear and shut down.
    pub disable: String,
    /// Destination port: take over the host's identity and enable.
    pub enable: String,
}

/// Device syntax for a move. Implementations must be pure.
pub trait CommandRenderer {
    fn disable(&self, m: &Move) -> String;
    fn enable(&self, m: &Move) -> String;

    fn render(&self, m: &Move) -> RenderedMove {
        RenderedMove { disable: self.disable(m), enable: self.enable(m) }
    }
}

/// Access-port configuration for Cisco IOS switches.
#[derive(Debug, Clone)]
pub struct CiscoIos {
    /// Extra interface lines added to every enabled port, before `no shutdown`.
    pub extra_access_lines: Vec<String>,
    pub port_security: bool,
}

impl Default for CiscoIos {
    fn default() -> Self {
        CiscoIos { extra_access_lines: Vec::new(), port_security: true }
    }
}

fn speed_line(speed: &str) -> Option<String> {
    let s = speed.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }
    if s == "auto" || s.starts_with("a-") {
        return Some("speed auto".into());
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("speed {}", s));
    }
    None
}

fn duplex_line(duplex: &str) -> Option<String> {
    match duplex.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "full" => Some("duplex full".into()),
        "half" => Some("duplex half".into()),
        _ => Some("duplex auto".into()),
    }
}

fn host_label(r: &PortRecord) -> &str {
    if r.description.is_empty() {
        "(no description)"
    } else {
        &r.description
    }
}

impl CommandRenderer for CiscoIos {
    fn disable(&self, m: &Move) -> String {
        let src = &m.source;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "! disable {} ({} moved to {})",
            src.key(),
            host_label(src),
            m.destination.key()
        );
        let _ = writeln!(
            out,
            "! show interface {} status: expect notconnect once the patch is moved",
            src.port_id
        );
        out.push_str("conf t\n");
        let _ = writeln!(out, " interface {}", src.port_id);
        out.push_str(" no description\n");
        out.push_str(" shutdown\n");
        out.push_str(" end\n!\n");
        out
    }

    fn enable(&self, m: &Move) -> String {
        let (src, dst) = (&m.source, &m.destination);
        let mut out = String::new();
        let _ = writeln!(out, "! move {} to {}", src.key(), dst.key());
        let _ = writeln!(
            out,
            "! show interface {} status: expect disabled or notconnect before configuring",
            dst.port_id
        );
        out.push_str("conf t\n");
        let _ = writeln!(out, " interface {}", dst.port_id);
        if !src.description.is_empty() {
            let _ = writeln!(out, " description {}", src.description);
        }
        out.push_str(" switchport mode access\n");
        let vlan = src.vlan.trim();
        if !vlan.is_empty() && vlan.chars().all(|c| c.is_ascii_digit()) {
            let _ = writeln!(out, " switchport access vlan {}", vlan);
        } else if !vlan.is_empty() {
            let _ = writeln!(out, " ! review: source vlan '{}' is not a vlan id", vlan);
        }
        for line in speed_line(&src.speed).into_iter().chain(duplex_line(&src.duplex)) {
            let _ = writeln!(out, " {}", line);
        }
        if self.port_security {
            out.push_str(" switchport port-security maximum 3\n");
            out.push_str(" switchport port-security\n");
            out.push_str(" switchport port-security aging time 2\n");
            out.push_str(" switchport port-security violation restrict\n");
            out.push_str(" switchport port-security aging type inactivity\n");
        }
        out.push_str(" spanning-tree portfast\n");
        for line in &self.extra_access_lines {
            let _ = writeln!(out, " {}", line.trim());
        }
        out.push_str(" no shutdown\n");
        out.push_str(" end\n!\n");
        out
    }
}

/// Command text for a whole plan, grouped by switch: all disables for a
/// source switch, then all enables for a destination switch.
pub fn render_plan<R: CommandRenderer + ?Sized>(renderer: &R, plan: &MigrationPlan) -> String {
    let mut by_switch: std::collections::BTreeMap<(u8, String), Vec<String>> = Default::default();
    for m in &plan.moves {
        let r = renderer.render(m);
        by_switch.entry((0, m.source.switch_id.clone())).or_default().push(r.disable);
        by_switch.entry((1, m.destination.switch_id.clone())).or_default().push(r.enable);
    }
    let mut out = String::new();
    for ((_, switch), blocks) in by_switch {
        let _ = writeln!(out, "!!! {}", switch);
        for b in blocks {
            out.push_str(&b);
        }
    }
    tracing::debug!(moves = plan.moves.len(), bytes = out.len(), "rendered plan commands");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use portmove_core::PortStatus;

    fn mv(vlan: &str, speed: &str, duplex: &str) -> Move {
        let mut source = PortRecord::new("SW1", "Gi1/0/4", PortStatus::Connected);
        source.description = "scada-hmi-01".into();
        source.vlan = vlan.into();
        source.speed = speed.into();
        source.duplex = duplex.into();
        source.critical = true;
        let destination = PortRecord::new("SW2", "Gi2/0/10", PortStatus::Disabled);
        Move { source, destination, final_match: true }
    }

    #[test]
    fn disable_clears_and_shuts_source() {
        let text = CiscoIos::default().disable(&mv("1296", "", ""));
        assert!(text.contains(" interface Gi1/0/4\n no description\n shutdown\n"));
        assert!(!text.contains("Gi2/0/10\n"));
    }

    #[test]
    fn enable_carries_host_settings() {
        let text = CiscoIos::default().enable(&mv("1296", "100", "full"));
        let lines: Vec<&str> = text.lines().collect();
        let at = |l: &str| {
            lines.iter().position(|x| *x == l).unwrap_or_else(|| panic!("missing {:?}", l))
        };
        assert!(at(" interface Gi2/0/10") < at(" description scada-hmi-01"));
        assert!(at(" switchport access vlan 1296") < at(" speed 100"));
        assert!(at(" duplex full") < at(" no shutdown"));
        assert_eq!(lines.last(), Some(&"!"));
    }

    #[test]
    fn auto_negotiated_values_render_as_auto() {
        let text = CiscoIos::default().enable(&mv("1296", "a-1000", "a-full"));
        assert!(text.contains(" speed auto\n"));
        assert!(text.contains(" duplex auto\n"));
    }

    #[test]
    fn odd_vlan_is_flagged_not_rendered() {
        let text = CiscoIos::default().enable(&mv("trunk", "", ""));
        assert!(!text.contains("switchport access vlan"));
        assert!(text.contains("! review: source vlan 'trunk'"));
    }

    #[test]
    fn extra_lines_and_no_port_security() {
        let r = CiscoIos {
            extra_access_lines: vec!["service-policy input ACCESS-PMAP".into()],
            port_security: false,
        };
        let text = r.enable(&mv("10", "", ""));
        assert!(text.contains(" service-policy input ACCESS-PMAP\n no shutdown\n"));
        assert!(!text.contains("port-security"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let r = CiscoIos::default();
        let m = mv("1296", "auto", "auto");
        assert_eq!(r.render(&m), r.render(&m));
        let plan = MigrationPlan { moves: vec![m.clone(), m], failures: Vec::new() };
        let text = render_plan(&r, &plan);
        assert_eq!(text, render_plan(&r, &plan));
        assert!(text.find("!!! SW1").unwrap() < text.find("!!! SW2").unwrap());
    }
}
