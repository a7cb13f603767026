//! Interface inventory and listening-socket parsing.

use std::collections::BTreeSet;

use rstest::rstest;

use super::remote;
use crate::parsers::net::{
    parse_bridges, parse_interface_names, parse_ipv4_addresses, parse_name_list, parse_vlans,
};
use crate::parsers::{
    InterfaceKind, ListenProto, Membership, SkipPatterns, classify, get_ip_listen_stats,
    get_net_settings, parse_listening,
};
use crate::render::LogTree;
use crate::test_support::ScriptedRemote;

const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:  5000      50    0    0    0     0          0         0     5000      50    0    0    0     0       0          0
eth0.10:  100       1    0    0    0     0          0         0      100       1    0    0    0     0       0          0
 bond0:     0       0    0    0    0     0          0         0        0       0    0    0    0     0       0          0
   br0:     0       0    0    0    0     0          0         0        0       0    0    0    0     0       0          0
";

const VLAN_CONFIG: &str = "\
VLAN Dev name    | VLAN ID
Name-Type: VLAN_NAME_TYPE_RAW_PLUS_VID_NO_PAD
eth0.10        | 10  | eth0
";

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

fn skip(patterns: &[&str]) -> SkipPatterns {
    SkipPatterns::new(patterns).expect("patterns should compile")
}

#[rstest]
fn classification_is_first_match() {
    let membership = Membership {
        vlans: names(&["eth0.10"]),
        bonds: names(&["bond0", "eth0.10"]),
        bridges: names(&["br0"]),
    };

    assert_eq!(classify("eth0.10", &membership), InterfaceKind::Vlan);
    assert_eq!(classify("eth0.10", &membership), InterfaceKind::Vlan);
    assert_eq!(classify("bond0", &membership), InterfaceKind::Bond);
    assert_eq!(classify("br0", &membership), InterfaceKind::Bridge);
    assert_eq!(classify("eth1", &membership), InterfaceKind::Common);
}

#[rstest]
fn interface_names_drop_headers_and_skipped_entries() {
    let parsed = parse_interface_names(PROC_NET_DEV.lines(), &skip(&["^lo$"]));

    assert_eq!(parsed, ["eth0", "eth0.10", "bond0", "br0"]);
}

#[rstest]
fn vlan_config_keeps_dotted_names_only() {
    assert_eq!(parse_vlans(VLAN_CONFIG.lines()), names(&["eth0.10"]));
}

#[rstest]
fn bridges_come_from_sysfs_paths() {
    let listing = ["/sys/class/net/br0/bridge/", "/sys/class/net/br-mgmt/bridge/"];

    assert_eq!(parse_bridges(listing), names(&["br-mgmt", "br0"]));
}

#[rstest]
fn addresses_lose_their_prefix_length() {
    let output = [
        "3: eth0    inet 10.109.0.3/24 brd 10.109.0.255 scope global eth0\\       valid_lft forever",
        "3: eth0    inet 10.109.5.3/24 scope global eth0\\       valid_lft forever",
    ];

    assert_eq!(
        parse_ipv4_addresses(output),
        names(&["10.109.0.3", "10.109.5.3"])
    );
}

#[rstest]
fn name_lists_split_on_whitespace() {
    assert_eq!(parse_name_list(["eth1 eth2", "eth3"]), names(&["eth1", "eth2", "eth3"]));
}

#[rstest]
fn inventory_classifies_and_collects_details(remote: ScriptedRemote) {
    remote.respond("cat /proc/net/dev", 0, PROC_NET_DEV);
    remote.respond("cat /proc/net/vlan/config", 0, VLAN_CONFIG);
    remote.respond("cat /sys/class/net/bonding_masters", 0, "bond0\n");
    remote.respond("ls -d1 /sys/class/net/*/bridge/", 0, "/sys/class/net/br0/bridge/\n");
    remote.respond("cat /sys/class/net/bond0/bonding/mode", 0, "802.3ad 4\n");
    remote.respond("cat /sys/class/net/bond0/bonding/slaves", 0, "eth1 tap0\n");
    remote.respond("ls -1 /sys/class/net/br0/brif/", 0, "eth0\ntap1\n");
    remote.respond(
        "ip -o -4 addr show dev br0",
        0,
        "5: br0    inet 10.109.0.3/24 scope global br0\n",
    );
    for iface in ["eth0", "eth0.10", "bond0"] {
        remote.respond(&format!("ip -o -4 addr show dev {iface}"), 0, "");
    }

    let settings = get_net_settings(&remote, &skip(&["^lo$", "^tap"])).expect("inventory");

    let kinds: Vec<(&str, InterfaceKind)> = settings
        .iter()
        .map(|(name, iface)| (name.as_str(), iface.kind))
        .collect();
    assert_eq!(
        kinds,
        [
            ("bond0", InterfaceKind::Bond),
            ("br0", InterfaceKind::Bridge),
            ("eth0", InterfaceKind::Common),
            ("eth0.10", InterfaceKind::Vlan),
        ]
    );
    let bond = settings.get("bond0").expect("bond0 present");
    assert_eq!(bond.bond_mode.as_deref(), Some("802.3ad"));
    assert_eq!(bond.bond_slaves, Some(names(&["eth1", "tap0"])));
    let bridge = settings.get("br0").expect("br0 present");
    assert_eq!(bridge.bridge_slaves, Some(names(&["eth0"])));
    assert_eq!(bridge.ip_addresses, names(&["10.109.0.3"]));
    assert_eq!(settings.get("eth0").and_then(|iface| iface.bond_mode.clone()), None);
}

#[rstest]
fn missing_optional_tables_are_tolerated(remote: ScriptedRemote) {
    remote.respond("cat /proc/net/dev", 0, "  eth0: 1 2 3\n");
    remote.respond("cat /proc/net/vlan/config", 1, "");
    remote.respond("cat /sys/class/net/bonding_masters", 1, "");
    remote.respond("ls -d1 /sys/class/net/*/bridge/", 2, "");
    remote.respond("ip -o -4 addr show dev eth0", 0, "");

    let settings = get_net_settings(&remote, &SkipPatterns::default()).expect("inventory");

    assert_eq!(
        settings.get("eth0").map(|iface| iface.kind),
        Some(InterfaceKind::Common)
    );
}

#[rstest]
fn interface_renders_as_aligned_block() {
    let iface = crate::parsers::NetworkInterface {
        name: String::from("eth0"),
        kind: InterfaceKind::Common,
        ip_addresses: names(&["10.109.0.3"]),
        bond_mode: None,
        bond_slaves: None,
        bridge_slaves: None,
    };

    let rendered = LogTree::from(&iface).render(0);

    assert!(rendered.starts_with("\ntype              common"), "{rendered}");
    assert!(rendered.contains("\nip_addresses:\n    - 10.109.0.3"), "{rendered}");
}

const TCP6_TABLE: &str = "\
  sl  local_address                         remote_address                        st tx_queue rx_queue
   0: 00000000000000000000000000000000:0050 00000000000000000000000000000000:0000 0A 00000000:00000000
   1: 0000000000000000FFFF00000100007F:0016 0000000000000000FFFF00000100007F:A2B4 01 00000000:00000000
";

#[rstest]
fn listening_rows_require_listen_state() {
    assert_eq!(
        parse_listening(TCP6_TABLE.lines(), false),
        ["00000000000000000000000000000000:0050"]
    );
}

#[rstest]
fn dual_stack_merges_and_normalises_ipv6(remote: ScriptedRemote) {
    remote.respond("cat /proc/sys/net/ipv6/bindv6only", 0, "0\n");
    let tcp4 = "  sl  local_address rem_address   st\n   0: 0100007F:0CEA 00000000:0000 0A\n";
    remote.respond(
        "cat /proc/net/tcp /proc/net/tcp6",
        0,
        &format!("{tcp4}{TCP6_TABLE}"),
    );

    let listening = get_ip_listen_stats(&remote, ListenProto::Tcp).expect("listen stats");

    assert_eq!(listening, ["0100007F:0CEA", "00000000:0050"]);
}

#[rstest]
fn dual_stack_reports_shared_port_once() {
    let rows = "\
   0: 00000000:0016 00000000:0000 0A
   1: 0100007F:0CEA 00000000:0000 0A
   0: 00000000000000000000000000000000:0016 00000000000000000000000000000000:0000 0A
";

    assert_eq!(
        parse_listening(rows.lines(), true),
        ["00000000:0016", "0100007F:0CEA"]
    );
}

#[rstest]
fn ipv6_only_reads_the_ipv4_table(remote: ScriptedRemote) {
    remote.respond("cat /proc/sys/net/ipv6/bindv6only", 0, "1\n");
    remote.respond(
        "cat /proc/net/udp",
        0,
        "  sl  local_address rem_address   st\n   0: 00000000:0043 00000000:0000 0A\n",
    );

    let listening = get_ip_listen_stats(&remote, ListenProto::Udp).expect("listen stats");

    assert_eq!(listening, ["00000000:0043"]);
    assert_eq!(
        remote.commands(),
        ["cat /proc/sys/net/ipv6/bindv6only", "cat /proc/net/udp"]
    );
}
