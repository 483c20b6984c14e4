use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::counter::FreqTable;

// ---------------------------------------------------------------------------
// Network parsing and supernet computation
// ---------------------------------------------------------------------------

/// Parse an address or CIDR string into a network. Bare addresses become /32
/// host networks. Returns `None` for anything unparseable; callers treat the
/// input as excluded rather than failing.
pub fn parse_network(s: &str) -> Option<Ipv4Network> {
    s.trim().parse::<Ipv4Network>().ok()
}

/// Smallest single network containing every parseable input.
///
/// Computed as the common-prefix block over the span from the lowest network
/// address to the highest broadcast address, which is the minimal enclosing
/// CIDR. Unparseable entries are skipped; `None` only when nothing parses.
pub fn supernet<I, S>(addrs: I) -> Option<Ipv4Network>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut span: Option<(u32, u32)> = None;

    for addr in addrs {
        let Some(net) = parse_network(addr.as_ref()) else {
            continue;
        };
        let start = u32::from(net.network());
        let end = u32::from(net.broadcast());
        span = Some(match span {
            None => (start, end),
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
        });
    }

    let (lo, hi) = span?;
    let prefix = (lo ^ hi).leading_zeros().min(32) as u8;
    Ipv4Network::new(Ipv4Addr::from(mask(lo, prefix)), prefix).ok()
}

fn mask(addr: u32, prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        addr & (u32::MAX << (32 - prefix))
    }
}

// ---------------------------------------------------------------------------
// Coverage-threshold selection
// ---------------------------------------------------------------------------

/// Smallest descending-weight prefix of the table whose cumulative share of
/// the total reaches `target`. Returns the selected keys and the coverage
/// actually achieved: at least `target`, or 1.0 when the table is exhausted
/// first. An empty table yields `([], 0.0)`.
pub fn threshold_subset(table: &FreqTable<String>, target: f64) -> (Vec<String>, f64) {
    if table.is_empty() {
        return (Vec::new(), 0.0);
    }

    let total = table.total() as f64;
    let mut picked = Vec::new();
    let mut cum = 0u64;

    for (key, count) in table.ranked() {
        cum += count;
        picked.push(key);
        if cum as f64 / total >= target {
            break;
        }
    }

    (picked, cum as f64 / total)
}

/// `threshold_subset` followed by `supernet`, gated by the minimum-prefix
/// policy: a network broader than `/min_prefix` is rejected so a rule can
/// never widen into "allow everything". The achieved coverage is returned
/// either way so callers can fall back to explicit address lists.
pub fn best_network(
    table: &FreqTable<String>,
    target: f64,
    min_prefix: u8,
) -> (Option<Ipv4Network>, f64) {
    let (keys, coverage) = threshold_subset(table, target);
    if keys.is_empty() {
        return (None, coverage);
    }
    match supernet(&keys) {
        Some(net) if net.prefix() >= min_prefix => (Some(net), coverage),
        _ => (None, coverage),
    }
}
