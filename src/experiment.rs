use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use derive_new::new;
use log::{debug, info};

use crate::{
    config::{AnalysisConfig, DuplicatePolicy},
    orthology::OrthologIndex,
    utils::short_label,
};

/// Per-ortholog statistics for one experiment.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct ExperimentRecord {
    pub padj: f64,
    pub logfc: f64,
    pub basemean: f64,
}

impl ExperimentRecord {
    /// Placeholder for an ortholog absent from this experiment. NaN fields
    /// satisfy no significance or direction predicate.
    pub fn missing() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn is_missing(&self) -> bool {
        self.padj.is_nan() && self.logfc.is_nan()
    }
}

/// One experiment's rows translated onto ortholog groups.
#[derive(Debug, Clone)]
pub struct ExperimentTable {
    pub label: String,
    records: HashMap<String, ExperimentRecord>,
}

impl ExperimentTable {
    /// Read a differential-expression file, translate it onto ortholog
    /// groups, and apply calibration from `config`.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        index: &OrthologIndex,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let handle = File::open(path)
            .with_context(|| format!("could not open experiment file {}", path.display()))?;
        let mut table = Self::translate(
            BufReader::new(handle),
            short_label(path),
            index,
            config.duplicate_policy,
        )?;
        if let Some(group) = &config.calibration_group {
            table.calibrate(group)?;
        }
        Ok(table)
    }

    /// Translate 7-column differential-expression rows into per-ortholog
    /// records. The header row (`baseMean` in column 0) is skipped, as is
    /// any gene not indexed in a retained ortholog group.
    ///
    /// Column 6 (adjusted p-value) falls back to column 5 on parse failure:
    /// a literal `NA` defaults to 1.0, a raw p below 0.05 defaults to 0.05,
    /// anything else to 1.0. This conservative-default chain is deliberate.
    pub fn translate<R: BufRead>(
        reader: R,
        label: String,
        index: &OrthologIndex,
        duplicate_policy: DuplicatePolicy,
    ) -> Result<Self> {
        let mut records = HashMap::new();
        let mut contributions: HashMap<String, usize> = HashMap::new();

        for line in reader.lines() {
            let line = line.context("failed reading experiment file")?;
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != 7 || cols[0] == "baseMean" {
                continue;
            }
            let Some(group) = index.group_of(cols[0]) else {
                continue;
            };

            let padj = match cols[6].parse::<f64>() {
                Ok(p) => p,
                Err(_) => fallback_padj(cols[5]),
            };
            let logfc = cols[2].parse::<f64>().unwrap_or(0.0);
            let basemean = cols[1].parse::<f64>().unwrap_or(0.0);

            *contributions.entry(group.to_string()).or_insert(0) += 1;
            records.insert(group.to_string(), ExperimentRecord::new(padj, logfc, basemean));
        }

        if duplicate_policy == DuplicatePolicy::CollapseGroups {
            let before = records.len();
            records.retain(|group, _| contributions[group] == 1);
            debug!(
                "{}: dropped {} ortholog groups with duplicate contributions",
                label,
                before - records.len()
            );
        }

        info!("{}: {} orthologs translated", label, records.len());
        Ok(Self { label, records })
    }

    /// Sign-normalize fold changes against a reference ortholog known to
    /// move in the same direction in every experiment. When the reference
    /// row is negative the whole column is negated, so calibrating twice
    /// is a no-op.
    pub fn calibrate(&mut self, group: &str) -> Result<()> {
        let Some(reference) = self.records.get(group) else {
            bail!(
                "calibration group {} is absent from experiment {}",
                group,
                self.label
            );
        };
        if reference.logfc < 0.0 {
            debug!("{}: negating fold-change column against {}", self.label, group);
            for record in self.records.values_mut() {
                record.logfc = -record.logfc;
            }
        }
        Ok(())
    }

    pub fn get(&self, group: &str) -> Option<&ExperimentRecord> {
        self.records.get(group)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExperimentRecord)> {
        self.records.iter()
    }

    pub fn group_ids(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Ratio of significantly up- to significantly down-regulated
    /// orthologs, damped by one to survive zero denominators.
    pub fn expression_ratio(&self, alpha: f64) -> f64 {
        let pos = self.sig_count(alpha, 1.0);
        let neg = self.sig_count(alpha, -1.0);
        pos as f64 / (neg + 1) as f64
    }

    fn sig_count(&self, alpha: f64, direction: f64) -> usize {
        self.records
            .values()
            .filter(|r| r.padj <= alpha && r.logfc * direction > 0.0)
            .count()
    }
}

fn fallback_padj(raw: &str) -> f64 {
    if raw == "NA" {
        1.0
    } else if raw.parse::<f64>().map(|p| p < 0.05).unwrap_or(false) {
        0.05
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orthology::OrthologFilter;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    const ORTHOFILE: &str = "\
G1 AAAA|1 BBBB|1
G2 AAAA|2 BBBB|2
G3 AAAA|3 BBBB|3
";

    fn index() -> OrthologIndex {
        OrthologIndex::build(Cursor::new(ORTHOFILE), &OrthologFilter::default()).unwrap()
    }

    fn translate(body: &str) -> ExperimentTable {
        ExperimentTable::translate(
            Cursor::new(body),
            "test".to_string(),
            &index(),
            DuplicatePolicy::KeepLast,
        )
        .unwrap()
    }

    #[test]
    fn test_header_and_unindexed_rows_skipped() {
        let table = translate(
            "baseMean x x x x x x\n\
             AAAA|1 100.0 1.5 0.3 0.2 0.001 0.01\n\
             ZZZZ|9 100.0 1.5 0.3 0.2 0.001 0.01\n",
        );
        assert_eq!(table.len(), 1);
        let rec = table.get("G1").unwrap();
        assert_relative_eq!(rec.padj, 0.01);
        assert_relative_eq!(rec.logfc, 1.5);
        assert_relative_eq!(rec.basemean, 100.0);
    }

    #[test]
    fn test_padj_fallback_chain() {
        // NA raw p-value -> 1.0
        let table = translate("AAAA|1 10.0 1.0 0.3 0.2 NA NA\n");
        assert_relative_eq!(table.get("G1").unwrap().padj, 1.0);

        // raw p below 0.05 -> 0.05
        let table = translate("AAAA|1 10.0 1.0 0.3 0.2 0.01 NA\n");
        assert_relative_eq!(table.get("G1").unwrap().padj, 0.05);

        // raw p at or above 0.05 -> 1.0
        let table = translate("AAAA|1 10.0 1.0 0.3 0.2 0.9 NA\n");
        assert_relative_eq!(table.get("G1").unwrap().padj, 1.0);
    }

    #[test]
    fn test_malformed_numeric_fields_default_to_zero() {
        let table = translate("AAAA|1 NA NA 0.3 0.2 0.2 0.4\n");
        let rec = table.get("G1").unwrap();
        assert_relative_eq!(rec.logfc, 0.0);
        assert_relative_eq!(rec.basemean, 0.0);
        assert_relative_eq!(rec.padj, 0.4);
    }

    #[test]
    fn test_duplicate_genes_overwrite_by_default() {
        let table = translate(
            "AAAA|1 10.0 1.0 0.3 0.2 0.2 0.4\n\
             BBBB|1 20.0 2.0 0.3 0.2 0.2 0.3\n",
        );
        assert_eq!(table.len(), 1);
        assert_relative_eq!(table.get("G1").unwrap().logfc, 2.0);
    }

    #[test]
    fn test_collapse_policy_drops_duplicated_groups() {
        let table = ExperimentTable::translate(
            Cursor::new(
                "AAAA|1 10.0 1.0 0.3 0.2 0.2 0.4\n\
                 BBBB|1 20.0 2.0 0.3 0.2 0.2 0.3\n\
                 AAAA|2 30.0 3.0 0.3 0.2 0.2 0.2\n",
            ),
            "test".to_string(),
            &index(),
            DuplicatePolicy::CollapseGroups,
        )
        .unwrap();
        assert!(table.get("G1").is_none());
        assert!(table.get("G2").is_some());
    }

    #[test]
    fn test_calibration_is_idempotent() {
        let mut table = translate(
            "AAAA|1 10.0 -1.0 0.3 0.2 0.2 0.01\n\
             AAAA|2 10.0 2.0 0.3 0.2 0.2 0.01\n",
        );
        table.calibrate("G1").unwrap();
        assert_relative_eq!(table.get("G1").unwrap().logfc, 1.0);
        assert_relative_eq!(table.get("G2").unwrap().logfc, -2.0);

        // reference row is now positive, so a second pass changes nothing
        table.calibrate("G1").unwrap();
        assert_relative_eq!(table.get("G1").unwrap().logfc, 1.0);
        assert_relative_eq!(table.get("G2").unwrap().logfc, -2.0);
    }

    #[test]
    fn test_calibration_group_must_exist() {
        let mut table = translate("AAAA|1 10.0 1.0 0.3 0.2 0.2 0.01\n");
        assert!(table.calibrate("G9").is_err());
    }

    #[test]
    fn test_translation_round_trip() {
        let body = "AAAA|1 10.5 1.25 0.3 0.2 0.2 0.04\n\
                    AAAA|2 20.5 -0.75 0.3 0.2 0.2 0.5\n\
                    AAAA|3 30.5 2.0 0.3 0.2 0.2 0.001\n";
        let first = translate(body);
        let second = translate(body);
        for (group, rec) in first.iter() {
            let other = second.get(group).unwrap();
            assert_relative_eq!(rec.padj, other.padj);
            assert_relative_eq!(rec.logfc, other.logfc);
            assert_relative_eq!(rec.basemean, other.basemean);
        }
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_expression_ratio() {
        let table = translate(
            "AAAA|1 10.0 1.0 0.3 0.2 0.2 0.01\n\
             AAAA|2 10.0 3.0 0.3 0.2 0.2 0.02\n\
             AAAA|3 10.0 -1.0 0.3 0.2 0.2 0.01\n",
        );
        assert_relative_eq!(table.expression_ratio(0.05), 1.0);
    }
}
