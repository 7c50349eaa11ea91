use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use itertools::iproduct;
use log::{debug, info};

use crate::{
    classify::{classify_pair, intersect},
    config::{AnalysisConfig, NaPolicy},
    experiment::{ExperimentRecord, ExperimentTable},
    math::pearson,
    results::{PairwiseResults, ScoreMatrix},
};

/// Run the all-by-all pairwise comparison across every ordered pair of
/// distinct experiments, accumulating each metric into a label-keyed score
/// matrix and intersecting the concordant-significant sets into the
/// `common_to_all` deliverable.
pub fn run_pairwise(
    tables: &[ExperimentTable],
    config: &AnalysisConfig,
) -> Result<PairwiseResults> {
    if tables.len() < 2 {
        bail!(
            "pairwise analysis requires at least 2 experiments, got {}",
            tables.len()
        );
    }

    let labels: Vec<String> = tables.iter().map(|t| t.label.clone()).collect();
    let mut concordant_count = ScoreMatrix::new(labels.clone());
    let mut correlation = ScoreMatrix::new(labels.clone());
    let mut high_correlation = ScoreMatrix::new(labels.clone());
    let mut sig_correlation = ScoreMatrix::new(labels.clone());
    let mut bit_correlation = ScoreMatrix::new(labels.clone());
    let mut jaccard_distance = ScoreMatrix::new(labels.clone());
    let mut all_concordant = ScoreMatrix::new(labels.clone());
    let mut one_sig_concordant = ScoreMatrix::new(labels.clone());
    let mut relative_concordance = ScoreMatrix::new(labels.clone());
    let mut high_fold_count = ScoreMatrix::new(labels);

    let mut common_to_all: Option<HashSet<String>> = None;
    let mut pairs = Vec::new();

    for (i, j) in iproduct!(0..tables.len(), 0..tables.len()) {
        if i == j {
            continue;
        }
        let pair = classify_pair(&tables[i], &tables[j], config);
        info!(
            "{} ({} orthologs, er={:.1}) vs {} ({} orthologs, er={:.1}): {} shared, {} concordant DEGs",
            pair.label_a,
            tables[i].len(),
            pair.ratio_a,
            pair.label_b,
            tables[j].len(),
            pair.ratio_b,
            pair.shared,
            pair.concordant_sig.len(),
        );

        let (row, col) = (&pair.label_a, &pair.label_b);
        concordant_count.set(row, col, pair.concordant_sig.len() as f64);
        correlation.set(row, col, pair.correlation);
        high_correlation.set(row, col, pair.high_correlation);
        sig_correlation.set(row, col, pair.sig_correlation);
        bit_correlation.set(row, col, pair.bit_correlation);
        jaccard_distance.set(row, col, pair.jaccard_distance);
        all_concordant.set(row, col, pair.concordant_any as f64);
        one_sig_concordant.set(row, col, pair.concordant_one_sig as f64);
        relative_concordance.set(row, col, pair.relative_concordance);
        high_fold_count.set(row, col, pair.high_fold_count as f64);

        common_to_all = Some(match common_to_all {
            Some(acc) => intersect(&acc, &pair.concordant_sig),
            None => pair.concordant_sig.clone(),
        });
        pairs.push(pair);
    }

    let common_to_all = common_to_all.unwrap_or_default();
    info!(
        "{} orthologs concordant and significant across all pairwise comparisons",
        common_to_all.len()
    );

    Ok(PairwiseResults {
        concordant_count,
        correlation,
        high_correlation,
        sig_correlation,
        bit_correlation,
        jaccard_distance,
        all_concordant,
        one_sig_concordant,
        relative_concordance,
        high_fold_count,
        common_to_all,
        pairs,
    })
}

/// Whether a reduction over per-experiment predicates demands agreement
/// from every experiment with data, or evidence from at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Every present record must satisfy the predicate; missing records
    /// do not contradict.
    All,
    /// At least one present record must satisfy the predicate; missing
    /// records are not evidence.
    Any,
}

/// Wide table with one record column per experiment, joined on the first
/// experiment's ortholog groups.
#[derive(Debug, Clone)]
pub struct GlobalTable {
    labels: Vec<String>,
    groups: Vec<String>,
    rows: HashMap<String, Vec<Option<ExperimentRecord>>>,
}

impl GlobalTable {
    /// Build the wide table. Under the drop policy, orthologs missing from
    /// any experiment are removed; under the keep policy the gaps remain as
    /// `None`. An optional filter restricts the table to the given groups.
    pub fn build(
        tables: &[ExperimentTable],
        config: &AnalysisConfig,
        filter: Option<&HashSet<String>>,
    ) -> Result<Self> {
        if tables.len() < 2 {
            bail!(
                "global analysis requires at least 2 experiments, got {}",
                tables.len()
            );
        }

        let labels: Vec<String> = tables.iter().map(|t| t.label.clone()).collect();
        let mut groups: Vec<String> = tables[0]
            .group_ids()
            .filter(|g| filter.map_or(true, |f| f.contains(*g)))
            .cloned()
            .collect();
        groups.sort_unstable();

        let mut rows = HashMap::new();
        groups.retain(|group| {
            let records: Vec<Option<ExperimentRecord>> =
                tables.iter().map(|t| t.get(group).copied()).collect();
            if config.na_policy == NaPolicy::Drop && records.iter().any(Option::is_none) {
                return false;
            }
            rows.insert(group.clone(), records);
            true
        });

        info!("{} orthologs added to global table", groups.len());
        Ok(Self {
            labels,
            groups,
            rows,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn records(&self, group: &str) -> Option<&[Option<ExperimentRecord>]> {
        self.rows.get(group).map(Vec::as_slice)
    }

    /// Number of experiments with no data for `group`.
    pub fn missing_count(&self, group: &str) -> usize {
        self.records(group)
            .map(|r| r.iter().filter(|x| x.is_none()).count())
            .unwrap_or(self.labels.len())
    }

    /// Fold a per-experiment predicate across every ortholog under the
    /// given combinator. Missing records never contradict an `All`
    /// reduction and never support an `Any` reduction.
    pub fn reduce<F>(&self, reduction: Reduction, pred: F) -> HashSet<String>
    where
        F: Fn(&ExperimentRecord) -> bool,
    {
        self.groups
            .iter()
            .filter(|group| {
                let records = &self.rows[*group];
                match reduction {
                    Reduction::All => records
                        .iter()
                        .flatten()
                        .all(|r| pred(r)),
                    Reduction::Any => records
                        .iter()
                        .flatten()
                        .any(|r| pred(r)),
                }
            })
            .cloned()
            .collect()
    }

    /// Pearson correlation of fold change between each ordered pair of
    /// experiments, restricted to the given orthologs.
    fn correlation_matrix(&self, subset: &HashSet<String>) -> ScoreMatrix {
        let mut matrix = ScoreMatrix::new(self.labels.clone());
        let columns: Vec<Vec<f64>> = (0..self.labels.len())
            .map(|idx| {
                self.groups
                    .iter()
                    .filter(|g| subset.contains(*g))
                    .map(|g| {
                        self.rows[g][idx]
                            .map(|r| r.logfc)
                            .unwrap_or(f64::NAN)
                    })
                    .collect()
            })
            .collect();
        for (i, j) in iproduct!(0..self.labels.len(), 0..self.labels.len()) {
            if i == j {
                continue;
            }
            matrix.set(
                &self.labels[i],
                &self.labels[j],
                pearson(&columns[i], &columns[j]),
            );
        }
        matrix
    }
}

/// One ortholog surviving the global concordant-and-significant filter,
/// with its per-experiment records.
#[derive(Debug, Clone)]
pub struct GlobalHit {
    pub group: String,
    pub records: Vec<Option<ExperimentRecord>>,
}

/// Counts under each reduction plus the final filtered ortholog list.
#[derive(Debug, Clone)]
pub struct GlobalSummary {
    pub labels: Vec<String>,
    /// Total missing experiment slots across the table.
    pub missing_values: usize,
    /// Orthologs represented in enough experiments.
    pub enough: usize,
    pub positive_any: usize,
    pub positive_all: usize,
    pub negative_any: usize,
    pub negative_all: usize,
    pub concordant_all: usize,
    pub positive_sig: usize,
    pub negative_sig: usize,
    pub sig_concordant: usize,
    pub sig_any: usize,
    pub sig_all: usize,
    pub large_any: usize,
    pub large_all: usize,
    pub positive_large: usize,
    pub negative_large: usize,
    pub concordant_large: usize,
    pub fold_threshold: f64,
    /// Pearson matrix of fold change over orthologs highly differential in
    /// at least one experiment.
    pub correlation: ScoreMatrix,
    /// Orthologs concordant, significant, and sufficiently represented.
    pub hits: Vec<GlobalHit>,
}

/// Classify every ortholog of the wide table under AND- and OR-reductions
/// across all experiment columns and assemble the global results table.
pub fn summarize_global(table: &GlobalTable, config: &AnalysisConfig) -> GlobalSummary {
    let alpha = config.alpha;
    let threshold = config.high_fold_threshold;
    let n = table.labels().len();
    let max_missing = config.max_missing.unwrap_or(n.saturating_sub(1));

    let enough: HashSet<String> = table
        .groups()
        .iter()
        .filter(|g| table.missing_count(g) < max_missing)
        .cloned()
        .collect();

    let pos_all = table.reduce(Reduction::All, |r| r.logfc > 0.0);
    let pos_any = table.reduce(Reduction::Any, |r| r.logfc > 0.0);
    let neg_all = table.reduce(Reduction::All, |r| r.logfc < 0.0);
    let neg_any = table.reduce(Reduction::Any, |r| r.logfc < 0.0);
    let sig_all = table.reduce(Reduction::All, |r| r.padj <= alpha);
    let sig_any = table.reduce(Reduction::Any, |r| r.padj <= alpha);
    let large_all = table.reduce(Reduction::All, |r| r.logfc.abs() >= threshold);
    let large_any = table.reduce(Reduction::Any, |r| r.logfc.abs() >= threshold);

    // concordant across all experiments: same direction wherever data exists
    let concordant: HashSet<String> = pos_all.union(&neg_all).cloned().collect();

    let missing_values: usize = table
        .groups()
        .iter()
        .map(|g| table.missing_count(g))
        .sum();

    let count =
        |x: &HashSet<String>, y: &HashSet<String>| x.intersection(y).filter(|g| enough.contains(*g)).count();

    let mut hit_groups: Vec<String> = concordant
        .intersection(&sig_all)
        .filter(|g| enough.contains(*g))
        .cloned()
        .collect();
    hit_groups.sort_unstable();
    debug!("{} orthologs significant and concordant", hit_groups.len());

    let hits = hit_groups
        .into_iter()
        .map(|group| {
            let records = table.records(&group).unwrap_or(&[]).to_vec();
            GlobalHit { group, records }
        })
        .collect();

    GlobalSummary {
        labels: table.labels().to_vec(),
        missing_values,
        enough: enough.len(),
        positive_any: pos_any.len(),
        positive_all: pos_all.intersection(&enough).count(),
        negative_any: neg_any.len(),
        negative_all: neg_all.intersection(&enough).count(),
        concordant_all: concordant.intersection(&enough).count(),
        positive_sig: count(&pos_all, &sig_all),
        negative_sig: count(&neg_all, &sig_all),
        sig_concordant: count(&sig_all, &concordant),
        sig_any: sig_any.len(),
        sig_all: sig_all.intersection(&enough).count(),
        large_any: large_any.len(),
        large_all: large_all.intersection(&enough).count(),
        positive_large: count(&pos_all, &large_all),
        negative_large: count(&neg_all, &large_all),
        concordant_large: count(&concordant, &large_all),
        fold_threshold: threshold,
        correlation: table.correlation_matrix(&large_any),
        hits,
    }
}

impl GlobalSummary {
    /// Fixed-width results table for logging or writing to a summary file.
    pub fn summary_lines(&self) -> Vec<String> {
        let n = self.labels.len();
        let mut lines = Vec::new();
        lines.push(format!("{} species/genes with missing values", self.missing_values));
        lines.push(format!("{} orthologs with enough species", self.enough));
        lines.push(String::new());
        lines.push(format!("{:<20} {:>10} {:>10}", " ", "(>=1 spp)", format!("(all {n} spp)")));
        lines.push(format!("{:<20} {:>10} {:>10}", "positive", self.positive_any, self.positive_all));
        lines.push(format!("{:<20} {:>10} {:>10}", "negative", self.negative_any, self.negative_all));
        lines.push(format!("{:<20} {:>10} {:>10}", "concordant", "n/a", self.concordant_all));
        lines.push(format!("{:<20} {:>10} {:>10}", "positive and sig", "n/a", self.positive_sig));
        lines.push(format!("{:<20} {:>10} {:>10}", "negative and sig", "n/a", self.negative_sig));
        lines.push(format!("{:<20} {:>10} {:>10}", "sig and conc", "n/a", self.sig_concordant));
        lines.push(format!("{:<20} {:>10} {:>10}", "significant", self.sig_any, self.sig_all));
        lines.push(format!(
            "{:<20} {:>10} {:>10}",
            format!(">= {:.2} fold diff", 2f64.powf(self.fold_threshold)),
            self.large_any,
            self.large_all
        ));
        lines.push(format!("{:<20} {:>10} {:>10}", "positive and large", "n/a", self.positive_large));
        lines.push(format!("{:<20} {:>10} {:>10}", "negative and large", "n/a", self.negative_large));
        lines.push(format!("{:<20} {:>10} {:>10}", "concordant and large", "n/a", self.concordant_large));
        lines
    }
}
