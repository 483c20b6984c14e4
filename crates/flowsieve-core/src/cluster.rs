use std::collections::HashMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::counter::FreqTable;

/// One /24 bucket of destination traffic: the bucket network, its total
/// weight, and the per-member counts of the addresses inside it.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub network: Ipv4Network,
    pub weight: u64,
    pub members: FreqTable<String>,
}

/// Partition a destination-IP table into /24 buckets, heaviest first.
///
/// Keys that do not parse as IPv4 addresses are skipped, the same way
/// unparseable addresses are excluded from supernet computation. Equal-weight
/// buckets order by ascending network so the emission order is stable.
pub fn cluster_by_slash24(dst_ips: &FreqTable<String>) -> Vec<Cluster> {
    let mut buckets: HashMap<Ipv4Network, (u64, FreqTable<String>)> = HashMap::new();

    for (ip, count) in dst_ips.iter() {
        let Ok(addr) = ip.parse::<Ipv4Addr>() else {
            continue;
        };
        let base = Ipv4Addr::from(u32::from(addr) & 0xffff_ff00);
        let Ok(net) = Ipv4Network::new(base, 24) else {
            continue;
        };
        let (weight, members) = buckets.entry(net).or_default();
        *weight += count;
        members.add_count(ip.clone(), count);
    }

    let mut clusters: Vec<Cluster> = buckets
        .into_iter()
        .map(|(network, (weight, members))| Cluster {
            network,
            weight,
            members,
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.network.cmp(&b.network))
    });
    clusters
}
