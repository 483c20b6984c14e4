use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LogRecord: the normalized output of field extraction
// ---------------------------------------------------------------------------

/// One log row reduced to the four fields the engine counts. Values are kept
/// verbatim as text; a field the row did not carry stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    pub src_ip: Option<String>,
    pub dst_ip: Option<String>,
    pub src_port: Option<String>,
    pub dst_port: Option<String>,
}

impl LogRecord {
    pub fn is_empty(&self) -> bool {
        self.src_ip.is_none()
            && self.dst_ip.is_none()
            && self.src_port.is_none()
            && self.dst_port.is_none()
    }
}

// ---------------------------------------------------------------------------
// Counter categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SrcIp,
    DstIp,
    SrcPort,
    DstPort,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SrcIp,
        Category::DstIp,
        Category::SrcPort,
        Category::DstPort,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::SrcIp => "Source IP",
            Category::DstIp => "Destination IP",
            Category::SrcPort => "Source Port",
            Category::DstPort => "Destination Port",
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestions: the ordered output of the rule engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Suggestion {
    /// One condensed allow rule: source scope -> destination scope on the
    /// dominant ports, annotated with the coverage each scope achieved.
    Allow {
        source: String,
        destination: String,
        ports: Vec<String>,
        src_coverage: f64,
        dst_coverage: f64,
    },
    /// Anomaly note: destination ports seen fewer than five times.
    RarePorts { ports: Vec<String>, truncated: bool },
    /// Fallback message when no rule could be produced.
    Notice { message: String },
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::Allow {
                source,
                destination,
                ports,
                src_coverage,
                dst_coverage,
            } => write!(
                f,
                "Allow {} -> {} on [{}] (src {:.0}%, dst {:.0}%)",
                source,
                destination,
                ports.join(", "),
                src_coverage * 100.0,
                dst_coverage * 100.0,
            ),
            Suggestion::RarePorts { ports, truncated } => {
                write!(f, "Rare destination ports (<5 hits): {}", ports.join(", "))?;
                if *truncated {
                    write!(f, " …")?;
                }
                Ok(())
            }
            Suggestion::Notice { message } => f.write_str(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Coverage fraction a network scope must capture before it is proposed.
    pub ip_threshold: f64,
    /// Rows shown per category in ranking output.
    pub top_n: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ip_threshold: 0.9,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestParams {
    /// Upper bound on ports listed in a rule.
    pub max_ports: usize,
    /// Minimum share of destination-port traffic a port needs to be listed.
    pub min_port_share: f64,
    /// Upper bound on emitted rules.
    pub max_rules: usize,
    /// Stop once this fraction of destination traffic is covered.
    pub target_coverage: f64,
}

impl Default for SuggestParams {
    fn default() -> Self {
        Self {
            max_ports: 3,
            min_port_share: 0.01,
            max_rules: 10,
            target_coverage: 0.80,
        }
    }
}

// ---------------------------------------------------------------------------
// The report: what external callers render or export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub flowsieve_version: String,
    pub generated_at: DateTime<Utc>,
    pub log_filename: String,
    pub log_sha256: String,
    pub log_size_bytes: u64,
    pub total_records: u64,
    pub bad_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub top_source_ips: Vec<(String, u64)>,
    pub top_dest_ips: Vec<(String, u64)>,
    pub top_source_ports: Vec<(String, u64)>,
    pub top_dest_ports: Vec<(String, u64)>,
    pub suggestions: Vec<Suggestion>,
}
