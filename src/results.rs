use std::collections::{HashMap, HashSet};

use crate::classify::PairClassification;

/// Label-by-label matrix of pairwise scores. Cells are filled once per
/// ordered pair; unfilled cells (the diagonal) render as NA.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    labels: Vec<String>,
    cells: HashMap<(String, String), f64>,
}

impl ScoreMatrix {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            cells: HashMap::new(),
        }
    }

    pub fn set(&mut self, row: &str, col: &str, value: f64) {
        self.cells.insert((row.to_string(), col.to_string()), value);
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        self.cells.get(&(row.to_string(), col.to_string())).copied()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Tab-separated rendering with a leading label column; absent cells
    /// and NaN scores print as NA.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        out.push('.');
        for label in &self.labels {
            out.push('\t');
            out.push_str(label);
        }
        out.push('\n');
        for row in &self.labels {
            out.push_str(row);
            for col in &self.labels {
                out.push('\t');
                match self.get(row, col) {
                    Some(v) if v.is_finite() => out.push_str(&format!("{v:.4}")),
                    _ => out.push_str("NA"),
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Everything the pairwise mode produces: one score matrix per metric,
/// the per-pair classifications, and the orthologs concordantly significant
/// in every pairwise comparison.
#[derive(Debug, Clone)]
pub struct PairwiseResults {
    pub concordant_count: ScoreMatrix,
    pub correlation: ScoreMatrix,
    pub high_correlation: ScoreMatrix,
    pub sig_correlation: ScoreMatrix,
    pub bit_correlation: ScoreMatrix,
    pub jaccard_distance: ScoreMatrix,
    pub all_concordant: ScoreMatrix,
    pub one_sig_concordant: ScoreMatrix,
    pub relative_concordance: ScoreMatrix,
    pub high_fold_count: ScoreMatrix,
    pub common_to_all: HashSet<String>,
    pub pairs: Vec<PairClassification>,
}

impl PairwiseResults {
    /// The matrices by name, in a stable order, for downstream chart and
    /// tree builders.
    pub fn named_matrices(&self) -> [(&'static str, &ScoreMatrix); 10] {
        [
            ("concordant_count", &self.concordant_count),
            ("correlation", &self.correlation),
            ("high_correlation", &self.high_correlation),
            ("sig_correlation", &self.sig_correlation),
            ("bit_correlation", &self.bit_correlation),
            ("jaccard_distance", &self.jaccard_distance),
            ("all_concordant", &self.all_concordant),
            ("one_sig_concordant", &self.one_sig_concordant),
            ("relative_concordance", &self.relative_concordance),
            ("high_fold_count", &self.high_fold_count),
        ]
    }

    pub fn pprint(&self) {
        for (name, matrix) in self.named_matrices() {
            println!("# {name}");
            print!("{}", matrix.to_tsv());
            println!();
        }
        println!(
            "{} orthologs concordant and significant in every pairwise comparison",
            self.common_to_all.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_score_matrix_roundtrip() {
        let mut matrix = ScoreMatrix::new(vec!["exp_a".to_string(), "exp_b".to_string()]);
        matrix.set("exp_a", "exp_b", 0.5);
        matrix.set("exp_b", "exp_a", 0.5);
        assert_relative_eq!(matrix.get("exp_a", "exp_b").unwrap(), 0.5);
        assert!(matrix.get("exp_a", "exp_a").is_none());
    }

    #[test]
    fn test_score_matrix_tsv_renders_missing_as_na() {
        let mut matrix = ScoreMatrix::new(vec!["a".to_string(), "b".to_string()]);
        matrix.set("a", "b", 1.0);
        matrix.set("b", "a", f64::NAN);
        let tsv = matrix.to_tsv();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], ".\ta\tb");
        assert_eq!(lines[1], "a\tNA\t1.0000");
        assert_eq!(lines[2], "b\tNA\tNA");
    }
}
