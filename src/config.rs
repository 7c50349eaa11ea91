use bon::Builder;

/// How orthologs lacking data in one or more experiments are treated when
/// experiment tables are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaPolicy {
    /// Drop any ortholog missing from one of the joined experiments.
    Drop,
    /// Keep the ortholog; the missing experiment contributes NaN values,
    /// which never satisfy a significance or direction predicate.
    Keep,
}

/// How multiple genes mapping to the same ortholog group are resolved
/// during translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Later rows overwrite earlier ones.
    KeepLast,
    /// Any group with more than one contributing row is dropped entirely.
    CollapseGroups,
}

/// Shared knobs for translation, classification, and aggregation.
#[derive(Debug, Clone, Builder)]
pub struct AnalysisConfig {
    /// Adjusted p-value cutoff for calling a gene significant.
    #[builder(default = 0.05)]
    pub alpha: f64,
    /// Absolute log2(fold change) at or above which a gene counts as
    /// highly differential.
    #[builder(default = 1.0)]
    pub high_fold_threshold: f64,
    #[builder(default = NaPolicy::Drop)]
    pub na_policy: NaPolicy,
    #[builder(default = DuplicatePolicy::KeepLast)]
    pub duplicate_policy: DuplicatePolicy,
    /// Ortholog group known to move in the same direction in every
    /// experiment; used to sign-normalize fold changes.
    pub calibration_group: Option<String>,
    /// Maximum number of experiments an ortholog may be missing from and
    /// still count as sufficiently represented in global mode.
    /// Defaults to `n_experiments - 1` when unset.
    pub max_missing: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_relative_eq!(config.alpha, 0.05);
        assert_relative_eq!(config.high_fold_threshold, 1.0);
        assert_eq!(config.na_policy, NaPolicy::Drop);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepLast);
        assert!(config.calibration_group.is_none());
        assert!(config.max_missing.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = AnalysisConfig::builder()
            .alpha(0.01)
            .na_policy(NaPolicy::Keep)
            .calibration_group("OG0001".to_string())
            .build();
        assert_relative_eq!(config.alpha, 0.01);
        assert_eq!(config.na_policy, NaPolicy::Keep);
        assert_eq!(config.calibration_group.as_deref(), Some("OG0001"));
    }
}
