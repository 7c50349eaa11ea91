//! Orthocord: Cross-Species Concordance of Differential Expression
//!
//! This library compares differential-gene-expression results across multiple
//! species or experiments by mapping each experiment's genes onto shared
//! ortholog groups, then classifying, per ortholog, whether expression
//! direction and significance agree across experiments.
//!
//! The main components of this library are:
//! - `OrthologIndex`: a filtered, validated gene -> ortholog-group index
//! - `ExperimentTable`: one experiment's statistics translated onto ortholog
//!   groups under consistent sign calibration
//! - `classify_pair`: significance/direction set classification of one
//!   experiment pair
//! - `run_pairwise` / `GlobalTable`: pairwise and global aggregation into
//!   score matrices, concordance counts, and the common-to-all ortholog set
//! - `enrich`: Fisher's-exact-test domain enrichment with
//!   Benjamini-Hochberg FDR correction

mod aggregate;
mod classify;
mod config;
mod enrich;
mod experiment;
mod math;
mod orthology;
mod results;
mod utils;

pub use aggregate::{run_pairwise, summarize_global, GlobalHit, GlobalSummary, GlobalTable, Reduction};
pub use classify::{
    classify_pair, join_pair, ConcordanceCounts, JoinedRow, PairClassification, SignificanceSets,
    VennPartition,
};
pub use config::{AnalysisConfig, DuplicatePolicy, NaPolicy};
pub use enrich::{enrich, DomainIndex, EnrichmentFinding, FdrStatus, FisherTestCase};
pub use experiment::{ExperimentRecord, ExperimentTable};
pub use orthology::{OrthologFilter, OrthologGroup, OrthologIndex};
pub use results::{PairwiseResults, ScoreMatrix};
pub use utils::{describe_group, local_id, short_label, NameChart};
