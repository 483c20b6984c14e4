use std::collections::HashSet;

use crate::cidr::{best_network, threshold_subset};
use crate::cluster::cluster_by_slash24;
use crate::counter::TrafficCounts;
use crate::models::{SuggestParams, Suggestion};

/// Source scopes broader than a /21 are refused.
pub const SRC_MIN_PREFIX: u8 = 21;
/// Destination scopes broader than a /20 are refused.
pub const DST_MIN_PREFIX: u8 = 20;

const RARE_PORT_CUTOFF: u64 = 5;
const RARE_PORTS_SHOWN: usize = 10;
const FALLBACK_SOURCES_SHOWN: usize = 3;

/// Condense the accumulated counters into an ordered list of allow-rule
/// suggestions plus an anomaly note for rare destination ports.
///
/// Every degenerate case (no qualifying scope, no dominant port, empty
/// tables) becomes a fallback `Suggestion` rather than an error, so a run
/// over arbitrarily messy input always yields output.
pub fn suggest_rules(
    counts: &TrafficCounts,
    ip_threshold: f64,
    params: &SuggestParams,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    // Source scope: one network up to /21, else the explicit top addresses.
    let (src_net, mut src_cov) = best_network(&counts.src_ips, ip_threshold, SRC_MIN_PREFIX);
    let source = match src_net {
        Some(net) => net.to_string(),
        None => {
            let (tops, cov) = threshold_subset(&counts.src_ips, ip_threshold);
            src_cov = cov;
            let mut joined = tops
                .iter()
                .take(FALLBACK_SOURCES_SHOWN)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            if tops.len() > FALLBACK_SOURCES_SHOWN {
                joined.push('…');
            }
            joined
        }
    };

    // Dominant destination ports by traffic share.
    let port_total = counts.dst_ports.total() as f64;
    let ports: Vec<String> = counts
        .dst_ports
        .ranked()
        .into_iter()
        .filter(|(_, count)| *count as f64 / port_total >= params.min_port_share)
        .take(params.max_ports)
        .map(|(port, _)| port)
        .collect();

    if ports.is_empty() {
        return vec![Suggestion::Notice {
            message: "No destination port exceeds the minimum share threshold.".to_string(),
        }];
    }

    // One candidate rule per /24 cluster, heaviest first, condensed to a
    // destination scope no broader than /20.
    let clusters = cluster_by_slash24(&counts.dst_ips);
    let total_dst = counts.dst_ips.total();
    let mut covered = 0u64;
    let mut seen: HashSet<String> = HashSet::new();
    let mut rules = 0usize;

    for cluster in &clusters {
        let (dst_net, dst_cov) = best_network(&cluster.members, ip_threshold, DST_MIN_PREFIX);
        let Some(dst_net) = dst_net else {
            continue;
        };
        let destination = dst_net.to_string();
        if !seen.insert(destination.clone()) {
            continue;
        }

        suggestions.push(Suggestion::Allow {
            source: source.clone(),
            destination,
            ports: ports.clone(),
            src_coverage: src_cov,
            dst_coverage: dst_cov,
        });
        rules += 1;
        covered += cluster.weight;

        if covered as f64 / total_dst as f64 >= params.target_coverage
            || rules >= params.max_rules
        {
            break;
        }
    }

    // Anomaly note: destination ports that barely appear at all.
    let rare: Vec<String> = counts
        .dst_ports
        .ranked()
        .into_iter()
        .filter(|(_, count)| *count < RARE_PORT_CUTOFF)
        .map(|(port, _)| port)
        .collect();
    if !rare.is_empty() {
        let truncated = rare.len() > RARE_PORTS_SHOWN;
        suggestions.push(Suggestion::RarePorts {
            ports: rare.into_iter().take(RARE_PORTS_SHOWN).collect(),
            truncated,
        });
    }

    if suggestions.is_empty() {
        suggestions.push(Suggestion::Notice {
            message: "No patterns met the thresholds.".to_string(),
        });
    }

    tracing::info!(count = suggestions.len(), "rule suggestion complete");
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::FreqTable;

    fn counts(
        src_ips: &[(&str, u64)],
        dst_ips: &[(&str, u64)],
        dst_ports: &[(&str, u64)],
    ) -> TrafficCounts {
        let mut c = TrafficCounts::new();
        for (k, n) in src_ips {
            c.src_ips.add_count(k.to_string(), *n);
        }
        for (k, n) in dst_ips {
            c.dst_ips.add_count(k.to_string(), *n);
        }
        for (k, n) in dst_ports {
            c.dst_ports.add_count(k.to_string(), *n);
        }
        c
    }

    fn allow_rules(suggestions: &[Suggestion]) -> Vec<&Suggestion> {
        suggestions
            .iter()
            .filter(|s| matches!(s, Suggestion::Allow { .. }))
            .collect()
    }

    #[test]
    fn test_dominant_ports_selected_by_share() {
        // Port shares 0.9 and 0.1, both far above the 1% floor.
        let c = counts(
            &[("192.168.1.10", 1000)],
            &[("10.1.2.3", 900), ("10.1.2.4", 100)],
            &[("80", 900), ("22", 100)],
        );
        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());

        let rules = allow_rules(&suggestions);
        assert_eq!(rules.len(), 1);
        let Suggestion::Allow {
            source,
            destination,
            ports,
            src_coverage,
            dst_coverage,
        } = rules[0]
        else {
            unreachable!()
        };
        assert_eq!(source, "192.168.1.10/32");
        assert_eq!(destination, "10.1.2.3/32");
        assert_eq!(ports, &["80".to_string(), "22".to_string()]);
        assert_eq!(*src_coverage, 1.0);
        assert!(*dst_coverage >= 0.9);

        // All ports were seen well over the rare cutoff.
        assert!(!suggestions
            .iter()
            .any(|s| matches!(s, Suggestion::RarePorts { .. })));
    }

    #[test]
    fn test_no_qualifying_port_terminates_early() {
        // 150 ports with one hit each: every share is under 1%.
        let mut c = counts(&[("192.168.1.10", 150)], &[("10.1.2.3", 150)], &[]);
        for p in 0..150u32 {
            c.dst_ports.add(format!("{}", 10_000 + p));
        }

        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());
        assert_eq!(
            suggestions,
            vec![Suggestion::Notice {
                message: "No destination port exceeds the minimum share threshold.".to_string(),
            }]
        );
    }

    #[test]
    fn test_port_cap_respected() {
        let c = counts(
            &[("192.168.1.10", 100)],
            &[("10.1.2.3", 100)],
            &[("80", 40), ("443", 30), ("22", 20), ("8080", 10)],
        );
        let params = SuggestParams {
            max_ports: 2,
            ..Default::default()
        };
        let suggestions = suggest_rules(&c, 0.9, &params);
        let Suggestion::Allow { ports, .. } = &suggestions[0] else {
            panic!("expected a rule, got {:?}", suggestions[0]);
        };
        assert_eq!(ports, &["80".to_string(), "443".to_string()]);
    }

    #[test]
    fn test_rare_port_note_truncates_past_ten() {
        let mut c = counts(
            &[("192.168.1.10", 1000)],
            &[("10.1.2.3", 1000)],
            &[("443", 988)],
        );
        for p in 0..12u32 {
            c.dst_ports.add(format!("{}", 20_000 + p));
        }

        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());
        let note = suggestions
            .iter()
            .find(|s| matches!(s, Suggestion::RarePorts { .. }))
            .expect("rare-port note expected");
        let Suggestion::RarePorts { ports, truncated } = note else {
            unreachable!()
        };
        assert_eq!(ports.len(), 10);
        assert!(*truncated);
        // The note comes after the rules.
        assert!(matches!(suggestions[0], Suggestion::Allow { .. }));
    }

    #[test]
    fn test_target_coverage_stops_emission() {
        // Cluster weights 60/30/10: 60+30 reaches the 0.8 target, the third
        // cluster is never emitted.
        let c = counts(
            &[("192.168.1.10", 100)],
            &[("10.0.0.1", 60), ("10.0.1.1", 30), ("10.0.2.1", 10)],
            &[("443", 100)],
        );
        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());
        assert_eq!(allow_rules(&suggestions).len(), 2);
    }

    #[test]
    fn test_max_rules_stops_emission() {
        let c = counts(
            &[("192.168.1.10", 100)],
            &[
                ("10.0.0.1", 25),
                ("10.0.1.1", 25),
                ("10.0.2.1", 25),
                ("10.0.3.1", 25),
            ],
            &[("443", 100)],
        );
        let params = SuggestParams {
            max_rules: 2,
            target_coverage: 1.0,
            ..Default::default()
        };
        let suggestions = suggest_rules(&c, 0.9, &params);
        assert_eq!(allow_rules(&suggestions).len(), 2);
    }

    #[test]
    fn test_source_falls_back_to_explicit_list() {
        // Five equal sources scattered across the v4 space: the supernet
        // lands far above the /21 floor, so the rule lists addresses instead.
        let c = counts(
            &[
                ("1.0.0.1", 20),
                ("2.0.0.1", 20),
                ("3.0.0.1", 20),
                ("4.0.0.1", 20),
                ("5.0.0.1", 20),
            ],
            &[("10.1.2.3", 100)],
            &[("443", 100)],
        );
        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());
        let Suggestion::Allow {
            source,
            src_coverage,
            ..
        } = &suggestions[0]
        else {
            panic!("expected a rule, got {:?}", suggestions[0]);
        };
        assert_eq!(source, "1.0.0.1, 2.0.0.1, 3.0.0.1…");
        assert_eq!(*src_coverage, 1.0);
    }

    #[test]
    fn test_unroutable_destinations_yield_notice() {
        // Ports qualify but no destination key parses, so no rule and no
        // rare-port note: the engine reports that nothing matched.
        let c = counts(
            &[("192.168.1.10", 10)],
            &[("not-an-ip", 10)],
            &[("443", 10)],
        );
        let suggestions = suggest_rules(&c, 0.9, &SuggestParams::default());
        assert_eq!(
            suggestions,
            vec![Suggestion::Notice {
                message: "No patterns met the thresholds.".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_counts_report_no_port() {
        let suggestions = suggest_rules(&TrafficCounts::new(), 0.9, &SuggestParams::default());
        assert_eq!(
            suggestions,
            vec![Suggestion::Notice {
                message: "No destination port exceeds the minimum share threshold.".to_string(),
            }]
        );
    }
}
