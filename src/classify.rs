use std::collections::HashSet;

use crate::{
    config::{AnalysisConfig, NaPolicy},
    experiment::{ExperimentRecord, ExperimentTable},
    math::{pearson, sign_fold},
};

/// One ortholog group with its records from both experiments of a pair.
/// A missing side under the keep-NA policy carries NaN fields.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    pub group: String,
    pub a: ExperimentRecord,
    pub b: ExperimentRecord,
}

/// Join two experiment tables on ortholog group: an inner join under the
/// drop policy, or a left join on `a` with NaN-filled gaps under the keep
/// policy.
pub fn join_pair(a: &ExperimentTable, b: &ExperimentTable, policy: NaPolicy) -> Vec<JoinedRow> {
    let mut rows = Vec::new();
    for (group, rec_a) in a.iter() {
        match (b.get(group), policy) {
            (Some(rec_b), _) => rows.push(JoinedRow {
                group: group.clone(),
                a: *rec_a,
                b: *rec_b,
            }),
            (None, NaPolicy::Keep) => rows.push(JoinedRow {
                group: group.clone(),
                a: *rec_a,
                b: ExperimentRecord::missing(),
            }),
            (None, NaPolicy::Drop) => {}
        }
    }
    rows
}

/// The four significance/direction sets of one experiment over the joined
/// ortholog universe. NaN records land in no set.
#[derive(Debug, Clone, Default)]
pub struct SignificanceSets {
    pub sig_pos: HashSet<String>,
    pub sig_neg: HashSet<String>,
    pub nonsig_pos: HashSet<String>,
    pub nonsig_neg: HashSet<String>,
}

impl SignificanceSets {
    fn insert(&mut self, group: &str, record: &ExperimentRecord, alpha: f64) {
        let set = if record.padj <= alpha && record.logfc > 0.0 {
            &mut self.sig_pos
        } else if record.padj <= alpha && record.logfc < 0.0 {
            &mut self.sig_neg
        } else if record.padj > alpha && record.logfc > 0.0 {
            &mut self.nonsig_pos
        } else if record.padj > alpha && record.logfc < 0.0 {
            &mut self.nonsig_neg
        } else {
            return;
        };
        set.insert(group.to_string());
    }

    pub fn significant(&self) -> HashSet<String> {
        union(&self.sig_pos, &self.sig_neg)
    }
}

/// Eight-way breakdown of the significant-in-at-least-one orthologs,
/// guaranteed to be a true partition (no group claimed twice).
#[derive(Debug, Clone)]
pub struct VennPartition {
    pub unique_pos_a: HashSet<String>,
    pub unique_pos_b: HashSet<String>,
    pub unique_neg_a: HashSet<String>,
    pub unique_neg_b: HashSet<String>,
    pub concordant_pos: HashSet<String>,
    pub concordant_neg: HashSet<String>,
    /// Significantly positive in A, significantly negative in B.
    pub discordant_a_pos: HashSet<String>,
    /// Significantly positive in B, significantly negative in A.
    pub discordant_b_pos: HashSet<String>,
}

impl VennPartition {
    fn build(a: &SignificanceSets, b: &SignificanceSets) -> Self {
        let concordant_pos = intersect(&a.sig_pos, &b.sig_pos);
        let concordant_neg = intersect(&a.sig_neg, &b.sig_neg);
        let discordant_a_pos = intersect(&a.sig_pos, &b.sig_neg);
        let discordant_b_pos = intersect(&b.sig_pos, &a.sig_neg);

        let unique_pos_a = minus(&minus(&a.sig_pos, &concordant_pos), &discordant_a_pos);
        let unique_pos_b = minus(&minus(&b.sig_pos, &concordant_pos), &discordant_b_pos);
        let unique_neg_a = minus(&minus(&a.sig_neg, &concordant_neg), &discordant_b_pos);
        let unique_neg_b = minus(&minus(&b.sig_neg, &concordant_neg), &discordant_a_pos);

        Self {
            unique_pos_a,
            unique_pos_b,
            unique_neg_a,
            unique_neg_b,
            concordant_pos,
            concordant_neg,
            discordant_a_pos,
            discordant_b_pos,
        }
    }

    pub fn subsets(&self) -> [&HashSet<String>; 8] {
        [
            &self.unique_pos_a,
            &self.unique_pos_b,
            &self.unique_neg_a,
            &self.unique_neg_b,
            &self.concordant_pos,
            &self.concordant_neg,
            &self.discordant_a_pos,
            &self.discordant_b_pos,
        ]
    }
}

/// Per-experiment concordance category counts and the background
/// concordance frequency used as a null-model baseline.
#[derive(Debug, Clone, Copy)]
pub struct ConcordanceCounts {
    pub con_sig_a: usize,
    pub con_nsig_a: usize,
    pub ncon_sig_a: usize,
    pub ncon_nsig_a: usize,
    pub con_sig_b: usize,
    pub con_nsig_b: usize,
    pub ncon_sig_b: usize,
    pub ncon_nsig_b: usize,
    /// Fraction of same-significance pairs that agree in direction;
    /// NaN when no such pairs exist.
    pub background_freq: f64,
}

impl ConcordanceCounts {
    fn build(a: &SignificanceSets, b: &SignificanceSets) -> Self {
        let con_sig = intersect(&a.sig_pos, &b.sig_pos).len() + intersect(&a.sig_neg, &b.sig_neg).len();
        let bkgd_con = con_sig
            + intersect(&a.nonsig_pos, &b.nonsig_pos).len()
            + intersect(&a.nonsig_neg, &b.nonsig_neg).len();
        let bkgd_dis = intersect(&a.sig_pos, &b.sig_neg).len()
            + intersect(&a.sig_neg, &b.sig_pos).len()
            + intersect(&a.nonsig_pos, &b.nonsig_neg).len()
            + intersect(&a.nonsig_neg, &b.nonsig_pos).len();
        let background_freq = if bkgd_con + bkgd_dis == 0 {
            f64::NAN
        } else {
            bkgd_con as f64 / (bkgd_con + bkgd_dis) as f64
        };

        Self {
            con_sig_a: con_sig,
            con_nsig_a: intersect(&a.sig_pos, &b.nonsig_pos).len()
                + intersect(&a.sig_neg, &b.nonsig_neg).len(),
            ncon_sig_a: intersect(&a.sig_pos, &b.sig_neg).len()
                + intersect(&a.sig_neg, &b.sig_pos).len(),
            ncon_nsig_a: intersect(&a.sig_pos, &b.nonsig_neg).len()
                + intersect(&a.sig_neg, &b.nonsig_pos).len(),
            con_sig_b: con_sig,
            con_nsig_b: intersect(&a.nonsig_pos, &b.sig_pos).len()
                + intersect(&a.nonsig_neg, &b.sig_neg).len(),
            ncon_sig_b: intersect(&a.sig_pos, &b.sig_neg).len()
                + intersect(&a.sig_neg, &b.sig_pos).len(),
            ncon_nsig_b: intersect(&a.nonsig_pos, &b.sig_neg).len()
                + intersect(&a.nonsig_neg, &b.sig_pos).len(),
            background_freq,
        }
    }
}

/// Full classification of one experiment pair: sets, the eight-way venn
/// partition, category counts, and scalar similarity metrics.
#[derive(Debug, Clone)]
pub struct PairClassification {
    pub label_a: String,
    pub label_b: String,
    /// Rows in the joined table.
    pub shared: usize,
    /// Up/down expression ratio of each side over its full table.
    pub ratio_a: f64,
    pub ratio_b: f64,
    pub sets_a: SignificanceSets,
    pub sets_b: SignificanceSets,
    pub concordant_sig: HashSet<String>,
    pub discordant_sig: HashSet<String>,
    pub venn: VennPartition,
    pub counts: ConcordanceCounts,
    /// Pearson r of log2(fold change) over all joined rows.
    pub correlation: f64,
    /// Restricted to rows highly differential in either experiment.
    pub high_correlation: f64,
    /// Restricted to rows significant in at least one experiment.
    pub sig_correlation: f64,
    /// Over sign-only (+1/-1) fold changes.
    pub bit_correlation: f64,
    /// Inverse Jaccard: union / (union - intersection) over significant
    /// orthologs. This is a distance (large = dissimilar); NaN when the
    /// union equals the intersection.
    pub jaccard_distance: f64,
    /// Rows highly differential in both experiments.
    pub high_fold_count: usize,
    /// Direction-concordant rows, significant or not.
    pub concordant_any: usize,
    /// Direction-concordant rows significant in at least one experiment.
    pub concordant_one_sig: usize,
    /// `concordant_one_sig` scaled by the significant-in-at-least-one
    /// count; NaN when nothing is significant.
    pub relative_concordance: f64,
    /// Orthologs significant in at least one experiment.
    pub num_sig: usize,
}

/// Classify a pair of translated experiments joined on ortholog group.
pub fn classify_pair(
    a: &ExperimentTable,
    b: &ExperimentTable,
    config: &AnalysisConfig,
) -> PairClassification {
    let alpha = config.alpha;
    let threshold = config.high_fold_threshold;
    let rows = join_pair(a, b, config.na_policy);

    let mut sets_a = SignificanceSets::default();
    let mut sets_b = SignificanceSets::default();
    for row in &rows {
        sets_a.insert(&row.group, &row.a, alpha);
        sets_b.insert(&row.group, &row.b, alpha);
    }

    let logfc_a: Vec<f64> = rows.iter().map(|r| r.a.logfc).collect();
    let logfc_b: Vec<f64> = rows.iter().map(|r| r.b.logfc).collect();
    let correlation = pearson(&logfc_a, &logfc_b);

    let high: Vec<&JoinedRow> = rows
        .iter()
        .filter(|r| r.a.logfc.abs() >= threshold || r.b.logfc.abs() >= threshold)
        .collect();
    let high_correlation = pearson(
        &high.iter().map(|r| r.a.logfc).collect::<Vec<_>>(),
        &high.iter().map(|r| r.b.logfc).collect::<Vec<_>>(),
    );

    let sig: Vec<&JoinedRow> = rows
        .iter()
        .filter(|r| r.a.padj <= alpha || r.b.padj <= alpha)
        .collect();
    let sig_correlation = pearson(
        &sig.iter().map(|r| r.a.logfc).collect::<Vec<_>>(),
        &sig.iter().map(|r| r.b.logfc).collect::<Vec<_>>(),
    );

    let bit_correlation = pearson(
        &rows.iter().map(|r| sign_fold(r.a.logfc)).collect::<Vec<_>>(),
        &rows.iter().map(|r| sign_fold(r.b.logfc)).collect::<Vec<_>>(),
    );

    let high_fold_count = rows
        .iter()
        .filter(|r| r.a.logfc.abs() >= threshold && r.b.logfc.abs() >= threshold)
        .count();

    let concordant_any = rows
        .iter()
        .filter(|r| same_direction(&r.a, &r.b))
        .count();
    let concordant_one_sig = rows
        .iter()
        .filter(|r| same_direction(&r.a, &r.b) && (r.a.padj <= alpha || r.b.padj <= alpha))
        .count();
    let num_sig = sig.len();
    let relative_concordance = if num_sig == 0 {
        f64::NAN
    } else {
        concordant_one_sig as f64 / num_sig as f64
    };

    let concordant_sig = union(
        &intersect(&sets_a.sig_pos, &sets_b.sig_pos),
        &intersect(&sets_a.sig_neg, &sets_b.sig_neg),
    );
    let discordant_sig = union(
        &intersect(&sets_a.sig_pos, &sets_b.sig_neg),
        &intersect(&sets_a.sig_neg, &sets_b.sig_pos),
    );

    let sig_union = union(&sets_a.significant(), &sets_b.significant()).len();
    let sig_intersection = intersect(&sets_a.sig_pos, &sets_b.sig_pos).len()
        + intersect(&sets_a.sig_neg, &sets_b.sig_neg).len();
    let jaccard_distance = if sig_union == sig_intersection {
        f64::NAN
    } else {
        sig_union as f64 / (sig_union - sig_intersection) as f64
    };

    let venn = VennPartition::build(&sets_a, &sets_b);
    let counts = ConcordanceCounts::build(&sets_a, &sets_b);

    PairClassification {
        label_a: a.label.clone(),
        label_b: b.label.clone(),
        shared: rows.len(),
        ratio_a: a.expression_ratio(alpha),
        ratio_b: b.expression_ratio(alpha),
        sets_a,
        sets_b,
        concordant_sig,
        discordant_sig,
        venn,
        counts,
        correlation,
        high_correlation,
        sig_correlation,
        bit_correlation,
        jaccard_distance,
        high_fold_count,
        concordant_any,
        concordant_one_sig,
        relative_concordance,
        num_sig,
    }
}

fn same_direction(a: &ExperimentRecord, b: &ExperimentRecord) -> bool {
    (a.logfc > 0.0 && b.logfc > 0.0) || (a.logfc < 0.0 && b.logfc < 0.0)
}

pub(crate) fn union(x: &HashSet<String>, y: &HashSet<String>) -> HashSet<String> {
    x.union(y).cloned().collect()
}

pub(crate) fn intersect(x: &HashSet<String>, y: &HashSet<String>) -> HashSet<String> {
    x.intersection(y).cloned().collect()
}

fn minus(x: &HashSet<String>, y: &HashSet<String>) -> HashSet<String> {
    x.difference(y).cloned().collect()
}
