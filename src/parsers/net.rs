//! Network interface inventory and listening sockets from `/proc` and `/sys`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::ProbeError;
use crate::executor::{ExecOptions, check_call, run_on_remote};
use crate::render::LogTree;
use crate::transport::{Remote, quote};

const NET_DEV: &str = "cat /proc/net/dev";
const VLAN_CONFIG: &str = "cat /proc/net/vlan/config";
const BONDING_MASTERS: &str = "cat /sys/class/net/bonding_masters";
const BRIDGES: &str = "ls -d1 /sys/class/net/*/bridge/";
const BINDV6ONLY: &str = "cat /proc/sys/net/ipv6/bindv6only";
const SYS_CLASS_NET: &str = "/sys/class/net/";

/// `/proc/net/{tcp,udp}` state code for a listening socket.
const STATE_LISTEN: &str = "0A";
const IPV6_ANY: &str = "00000000000000000000000000000000";
const IPV4_ANY: &str = "00000000";

/// Interface classification, decided in declaration order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// 802.1q tagged interface.
    Vlan,
    /// Bonding master.
    Bond,
    /// Linux bridge.
    Bridge,
    /// Anything else.
    Common,
}

impl InterfaceKind {
    /// Lowercase name used in logs and serialised output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vlan => "vlan",
            Self::Bond => "bond",
            Self::Bridge => "bridge",
            Self::Common => "common",
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One interface observed on a node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NetworkInterface {
    /// Kernel interface name.
    pub name: String,
    /// Classification.
    pub kind: InterfaceKind,
    /// IPv4 addresses without prefix length.
    pub ip_addresses: BTreeSet<String>,
    /// Bonding mode, for bonds.
    pub bond_mode: Option<String>,
    /// Enslaved interfaces, for bonds.
    pub bond_slaves: Option<BTreeSet<String>>,
    /// Ports, for bridges.
    pub bridge_slaves: Option<BTreeSet<String>>,
}

impl From<&NetworkInterface> for LogTree {
    fn from(iface: &NetworkInterface) -> Self {
        let optional_set = |set: Option<&BTreeSet<String>>| {
            set.map_or_else(|| Self::scalar("None"), Self::scalars)
        };
        Self::mapping([
            ("type", Self::scalar(iface.kind)),
            ("ip_addresses", Self::scalars(&iface.ip_addresses)),
            (
                "bond_mode",
                Self::scalar(iface.bond_mode.as_deref().unwrap_or("None")),
            ),
            ("bond_slaves", optional_set(iface.bond_slaves.as_ref())),
            ("bridge_slaves", optional_set(iface.bridge_slaves.as_ref())),
        ])
    }
}

/// Regular expressions naming interfaces to leave out.
#[derive(Clone, Debug, Default)]
pub struct SkipPatterns(Vec<Regex>);

impl SkipPatterns {
    /// Compiles the given patterns.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] for an invalid pattern.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|pattern| Regex::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Returns `true` when any pattern matches anywhere in `name`.
    #[must_use]
    pub fn is_skipped(&self, name: &str) -> bool {
        self.0.iter().any(|pattern| pattern.is_match(name))
    }
}

/// Interface names grouped by the kind they were listed under.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Membership {
    /// Names listed in `/proc/net/vlan/config`.
    pub vlans: BTreeSet<String>,
    /// Names listed in `bonding_masters`.
    pub bonds: BTreeSet<String>,
    /// Names owning a `bridge/` directory.
    pub bridges: BTreeSet<String>,
}

/// Classifies `name`, testing vlan, then bond, then bridge membership.
#[must_use]
pub fn classify(name: &str, membership: &Membership) -> InterfaceKind {
    if membership.vlans.contains(name) {
        InterfaceKind::Vlan
    } else if membership.bonds.contains(name) {
        InterfaceKind::Bond
    } else if membership.bridges.contains(name) {
        InterfaceKind::Bridge
    } else {
        InterfaceKind::Common
    }
}

/// Interface names from `/proc/net/dev`, minus skipped ones, in file order.
#[must_use]
pub fn parse_interface_names<'a, I>(lines: I, skip: &SkipPatterns) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim().to_owned())
        .filter(|name| !name.is_empty() && !skip.is_skipped(name))
        .collect()
}

/// VLAN device names from `/proc/net/vlan/config`.
#[must_use]
pub fn parse_vlans<'a, I>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| name.contains('.'))
        .map(str::to_owned)
        .collect()
}

/// Whitespace separated names, as in `bonding_masters` or `bonding/slaves`.
#[must_use]
pub fn parse_name_list<'a, I>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
        .collect()
}

/// Bridge names from `ls -d1 /sys/class/net/*/bridge/`.
#[must_use]
pub fn parse_bridges<'a, I>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.trim().strip_prefix(SYS_CLASS_NET))
        .filter_map(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// IPv4 addresses from `ip -o -4 addr show`, prefix length removed.
#[must_use]
pub fn parse_ipv4_addresses<'a, I>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(|cidr| cidr.split('/').next().unwrap_or(cidr).to_owned())
        .collect()
}

/// Local addresses of listening sockets from `/proc/net/{tcp,udp}[6]`.
///
/// With `dual_stack` set, the IPv6 any-address is rewritten to its IPv4 form
/// so IPv6 sockets serving IPv4 merge with the IPv4 table. Each address is
/// reported once, in first-seen order.
#[must_use]
pub fn parse_listening<'a, I>(lines: I, dual_stack: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    lines
        .into_iter()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match (fields.get(1), fields.get(3)) {
                (Some(local), Some(state)) if *state == STATE_LISTEN => Some(if dual_stack {
                    local.replace(IPV6_ANY, IPV4_ANY)
                } else {
                    (*local).to_owned()
                }),
                _ => None,
            }
        })
        .filter(|local| seen.insert(local.clone()))
        .collect()
}

/// Socket table queried by [`get_ip_listen_stats`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ListenProto {
    /// `/proc/net/tcp`
    #[default]
    Tcp,
    /// `/proc/net/udp`
    Udp,
}

impl ListenProto {
    /// Name of the `/proc/net` table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

fn listing<R>(remote: &R, command: &str, tolerated: &[i32]) -> Result<Vec<String>, ProbeError>
where
    R: Remote + ?Sized,
{
    let options = ExecOptions::default().with_expected(tolerated.iter().copied());
    let result = run_on_remote(remote, command, &options)?;
    Ok(result.stdout_lines().map(str::to_owned).collect())
}

/// Builds the interface inventory of `remote`.
///
/// Interfaces matching `skip` are left out, and so are matching bridge ports.
/// Bond slaves are reported unfiltered.
///
/// # Errors
///
/// Returns [`ProbeError`] when any listing command fails.
pub fn get_net_settings<R>(
    remote: &R,
    skip: &SkipPatterns,
) -> Result<BTreeMap<String, NetworkInterface>, ProbeError>
where
    R: Remote + ?Sized,
{
    let interfaces = parse_interface_names(check_call(remote, NET_DEV)?.stdout_lines(), skip);
    let membership = Membership {
        vlans: parse_vlans(listing(remote, VLAN_CONFIG, &[0, 1])?.iter().map(String::as_str)),
        bonds: parse_name_list(
            listing(remote, BONDING_MASTERS, &[0, 1])?
                .iter()
                .map(String::as_str),
        ),
        bridges: parse_bridges(listing(remote, BRIDGES, &[0, 2])?.iter().map(String::as_str)),
    };

    let mut settings = BTreeMap::new();
    for name in interfaces {
        let kind = classify(&name, &membership);
        let sys_dir = format!("{SYS_CLASS_NET}{}", quote(&name));
        let mut iface = NetworkInterface {
            name: name.clone(),
            kind,
            ip_addresses: BTreeSet::new(),
            bond_mode: None,
            bond_slaves: None,
            bridge_slaves: None,
        };

        match kind {
            InterfaceKind::Bond => {
                let mode = check_call(remote, &format!("cat {sys_dir}/bonding/mode"))?;
                iface.bond_mode = mode
                    .stdout_lines()
                    .find_map(|line| line.split_whitespace().next())
                    .map(str::to_owned);
                let slaves = check_call(remote, &format!("cat {sys_dir}/bonding/slaves"))?;
                iface.bond_slaves = Some(parse_name_list(slaves.stdout_lines()));
            }
            InterfaceKind::Bridge => {
                let ports = check_call(remote, &format!("ls -1 {sys_dir}/brif/"))?;
                iface.bridge_slaves = Some(
                    parse_name_list(ports.stdout_lines())
                        .into_iter()
                        .filter(|port| !skip.is_skipped(port))
                        .collect(),
                );
            }
            InterfaceKind::Vlan | InterfaceKind::Common => {}
        }

        let addresses = check_call(remote, &format!("ip -o -4 addr show dev {}", quote(&name)))?;
        iface.ip_addresses = parse_ipv4_addresses(addresses.stdout_lines());
        settings.insert(name, iface);
    }

    debug!(
        host = remote.host(),
        "network settings:{}",
        LogTree::mapping(
            settings
                .iter()
                .map(|(name, iface)| (name.clone(), LogTree::from(iface)))
        )
        .render(2)
    );
    Ok(settings)
}

/// Lists local addresses of listening sockets for `proto` on `remote`.
///
/// When `bindv6only` is `0`, IPv6 sockets also accept IPv4 connections, so the
/// IPv6 table is merged in with its any-address normalised.
///
/// # Errors
///
/// Returns [`ProbeError`] when reading the socket tables fails.
pub fn get_ip_listen_stats<R>(remote: &R, proto: ListenProto) -> Result<Vec<String>, ProbeError>
where
    R: Remote + ?Sized,
{
    let flag = check_call(remote, BINDV6ONLY)?;
    let dual_stack = flag.stdout_lines().collect::<String>() == "0";
    let table = proto.as_str();
    let command = if dual_stack {
        format!("cat /proc/net/{table} /proc/net/{table}6")
    } else {
        format!("cat /proc/net/{table}")
    };
    let result = check_call(remote, &command)?;
    Ok(parse_listening(result.stdout_lines(), dual_stack))
}
