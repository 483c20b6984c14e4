use std::io::Read;
use std::path::Path;

use anyhow::Result;

use crate::counter::{FreqTable, TrafficCounts};
use crate::ingest::{self, CsvSource};
use crate::models::{AnalyzerConfig, Category, SuggestParams, Suggestion};
use crate::suggest;

/// Summary of one `ingest_path` call.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub filename: String,
    pub file_size: u64,
    pub file_sha256: String,
    pub records: u64,
    pub bad_rows: u64,
}

/// The engine. Exclusively owns the accumulated frequency tables for its
/// lifetime: construct -> ingest* -> query*. Ingestion takes `&mut self` and
/// queries take `&self`, so one writer excludes all readers and independent
/// suggestion runs over settled state are safe to share.
pub struct Analyzer {
    config: AnalyzerConfig,
    counts: TrafficCounts,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            counts: TrafficCounts::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Stream a log file in bounded batches, accumulating into the running
    /// tables. May be called repeatedly to continue from further sources.
    pub fn ingest_path(&mut self, path: &Path, batch_size: usize) -> Result<IngestSummary> {
        let (mut source, info) = ingest::open_path(path)?;
        let (records, bad_rows) = self.drain(&mut source, batch_size)?;

        if bad_rows > 0 {
            tracing::warn!(count = bad_rows, "skipped malformed rows");
        }
        tracing::info!(records, bad_rows, "ingestion complete");

        Ok(IngestSummary {
            filename: info.filename,
            file_size: info.file_size,
            file_sha256: info.file_sha256,
            records,
            bad_rows,
        })
    }

    /// `ingest_path` for any readable source; returns (records, bad rows)
    /// seen in this pass.
    pub fn ingest_reader<R: Read>(&mut self, reader: R, batch_size: usize) -> Result<(u64, u64)> {
        let mut source = CsvSource::from_reader(reader)?;
        self.drain(&mut source, batch_size)
    }

    fn drain<R: Read>(
        &mut self,
        source: &mut CsvSource<R>,
        batch_size: usize,
    ) -> Result<(u64, u64)> {
        let mut records = 0;
        let mut bad_rows = 0;
        while let Some(batch) = source.next_batch(batch_size)? {
            records += batch.records;
            bad_rows += batch.bad_rows;
            self.counts.merge(batch);
        }
        Ok((records, bad_rows))
    }

    /// Fold counts produced elsewhere (e.g. a parallel ingestion worker)
    /// into the running totals.
    pub fn absorb(&mut self, counts: TrafficCounts) {
        self.counts.merge(counts);
    }

    /// Drop all accumulated state.
    pub fn reset(&mut self) {
        self.counts = TrafficCounts::new();
    }

    pub fn counts(&self) -> &TrafficCounts {
        &self.counts
    }

    pub fn records(&self) -> u64 {
        self.counts.records
    }

    pub fn bad_rows(&self) -> u64 {
        self.counts.bad_rows
    }

    pub fn table(&self, category: Category) -> &FreqTable<String> {
        self.counts.table(category)
    }

    /// The `n` highest-count keys of one category, highest first.
    pub fn top_n(&self, category: Category, n: usize) -> Vec<(String, u64)> {
        self.counts.table(category).top_n(n)
    }

    /// All four rankings at the configured depth, in category order.
    pub fn top_tables(&self) -> Vec<(Category, Vec<(String, u64)>)> {
        Category::ALL
            .iter()
            .map(|&cat| (cat, self.top_n(cat, self.config.top_n)))
            .collect()
    }

    /// Condensed allow-rule suggestions over the current state.
    pub fn suggest_rules(&self, params: &SuggestParams) -> Vec<Suggestion> {
        suggest::suggest_rules(&self.counts, self.config.ip_threshold, params)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr;

    fn skewed_log() -> Vec<u8> {
        // 90 hits on 10.0.0.5, 10 on 10.0.0.9, all on port 443.
        let mut s = String::from("srcip,dstip,srcport,dstport\n");
        for _ in 0..90 {
            s.push_str("192.168.0.1,10.0.0.5,50000,443\n");
        }
        for _ in 0..10 {
            s.push_str("192.168.0.2,10.0.0.9,50001,443\n");
        }
        s.into_bytes()
    }

    #[test]
    fn test_ingest_accumulates_across_calls() {
        let mut analyzer = Analyzer::default();
        let (records, bad) = analyzer.ingest_reader(&skewed_log()[..], 32).unwrap();
        assert_eq!((records, bad), (100, 0));
        analyzer.ingest_reader(&skewed_log()[..], 32).unwrap();

        assert_eq!(analyzer.records(), 200);
        assert_eq!(
            analyzer.top_n(Category::DstIp, 1),
            vec![("10.0.0.5".to_string(), 180)]
        );
    }

    #[test]
    fn test_dominant_destination_network() {
        let mut analyzer = Analyzer::default();
        analyzer.ingest_reader(&skewed_log()[..], 1_000).unwrap();

        let (net, cov) = cidr::best_network(analyzer.table(Category::DstIp), 0.9, 20);
        let net = net.unwrap();
        assert!(cov >= 0.9);
        assert!(net.contains("10.0.0.5".parse().unwrap()));
        assert!(net.prefix() >= 20);
    }

    #[test]
    fn test_top_n_idempotent_between_ingests() {
        let mut analyzer = Analyzer::default();
        analyzer.ingest_reader(&skewed_log()[..], 16).unwrap();
        let first = analyzer.top_n(Category::DstPort, 5);
        let second = analyzer.top_n(Category::DstPort, 5);
        assert_eq!(first, second);
        assert_eq!(first, vec![("443".to_string(), 100)]);
    }

    #[test]
    fn test_suggestions_end_to_end() {
        let mut analyzer = Analyzer::default();
        analyzer.ingest_reader(&skewed_log()[..], 1_000).unwrap();

        let suggestions = analyzer.suggest_rules(&SuggestParams::default());
        let Suggestion::Allow {
            source,
            destination,
            ports,
            ..
        } = &suggestions[0]
        else {
            panic!("expected a rule, got {:?}", suggestions[0]);
        };
        assert_eq!(source, "192.168.0.1/32");
        assert_eq!(destination, "10.0.0.5/32");
        assert_eq!(ports, &["443".to_string()]);
    }

    #[test]
    fn test_absorb_matches_direct_ingest() {
        let mut direct = Analyzer::default();
        direct.ingest_reader(&skewed_log()[..], 1_000).unwrap();

        // Counts produced by an out-of-band worker, folded in afterwards.
        let absorb_log = skewed_log();
        let mut source = CsvSource::from_reader(&absorb_log[..]).unwrap();
        let mut via_absorb = Analyzer::default();
        while let Some(batch) = source.next_batch(7).unwrap() {
            via_absorb.absorb(batch);
        }

        assert_eq!(via_absorb.records(), direct.records());
        assert_eq!(
            via_absorb.table(Category::SrcIp).ranked(),
            direct.table(Category::SrcIp).ranked()
        );
    }

    #[test]
    fn test_reset_clears_state() {
        let mut analyzer = Analyzer::default();
        analyzer.ingest_reader(&skewed_log()[..], 1_000).unwrap();
        analyzer.reset();
        assert_eq!(analyzer.records(), 0);
        assert!(analyzer.top_n(Category::DstIp, 10).is_empty());
    }
}
