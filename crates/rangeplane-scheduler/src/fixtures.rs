use rangeplane_cluster::{Host, Hosts};
use rangeplane_types::{ExperimentSpec, General, Hardware, Interface, Network, Node, TopologySpec};

pub fn node(hostname: &str, vlan: &str, vcpus: u32, memory: u32) -> Node {
    Node {
        general: General {
            hostname: hostname.into(),
            ..Default::default()
        },
        hardware: Hardware {
            vcpus,
            memory,
            ..Default::default()
        },
        network: Network {
            interfaces: vec![Interface {
                name: "eth0".into(),
                vlan: vlan.into(),
                ..Default::default()
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// foo and sucka share VLAN `EXP`; bar and fish share `MGMT`.
pub fn spec() -> ExperimentSpec {
    let nodes = vec![
        node("foo", "EXP", 1, 512),
        node("bar", "MGMT", 1, 512),
        node("sucka", "EXP", 1, 512),
        node("fish", "MGMT", 1, 512),
    ];
    ExperimentSpec::new("test", TopologySpec { nodes }, None)
}

/// `compute0..` with the given VM counts and identical capacity.
pub fn hosts(vms: &[u32]) -> Hosts {
    vms.iter()
        .enumerate()
        .map(|(i, vms)| Host {
            vms: *vms,
            ..Host::new(format!("compute{i}"), 16, 49_152)
        })
        .collect()
}

pub fn assigned<'a>(spec: &'a ExperimentSpec, nodes: &[&str]) -> Vec<&'a str> {
    nodes
        .iter()
        .map(|n| spec.scheduled_host(n).unwrap_or("-"))
        .collect()
}
