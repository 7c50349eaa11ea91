use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use adjustp::{adjust, Procedure};
use anyhow::{Context, Result};
use derive_new::new;
use log::{debug, info};
use statrs::distribution::{DiscreteCDF, Hypergeometric};

use crate::{
    orthology::OrthologIndex,
    utils::local_id,
};

/// Domain-annotation lookup built from a PFAM-style scan file.
///
/// Lines starting with `#` are comments; column 1 holds the domain
/// accession, column 3 the gene id, and columns 22 onward the joined
/// domain description.
#[derive(Debug, Clone, Default)]
pub struct DomainIndex {
    genes_with: HashMap<String, Vec<String>>,
    domains_of: HashMap<String, Vec<String>>,
    descriptions: HashMap<String, String>,
}

impl DomainIndex {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let handle = File::open(path)
            .with_context(|| format!("could not open domain-annotation file {}", path.display()))?;
        Self::from_reader(BufReader::new(handle))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = Self::default();
        for line in reader.lines() {
            let line = line.context("failed reading domain-annotation file")?;
            if line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                continue;
            }
            let accession = cols[1];
            let gene = cols[3];
            let description = cols.get(22..).unwrap_or(&[]).join(" ");
            index.insert(accession, gene, &description);
        }
        info!(
            "{} domains annotated across {} genes",
            index.genes_with.len(),
            index.domains_of.len()
        );
        Ok(index)
    }

    fn insert(&mut self, accession: &str, gene: &str, description: &str) {
        self.descriptions
            .entry(accession.to_string())
            .or_insert_with(|| description.to_string());
        self.genes_with
            .entry(accession.to_string())
            .or_default()
            .push(gene.to_string());
        self.domains_of
            .entry(gene.to_string())
            .or_default()
            .push(accession.to_string());
    }

    pub fn domains_of(&self, gene: &str) -> Option<&[String]> {
        self.domains_of.get(gene).map(Vec::as_slice)
    }

    pub fn genes_with(&self, accession: &str) -> Option<&[String]> {
        self.genes_with.get(accession).map(Vec::as_slice)
    }

    pub fn description(&self, accession: &str) -> Option<&str> {
        self.descriptions.get(accession).map(String::as_str)
    }
}

/// One 2x2 contingency table: target orthologs with/without the domain
/// against background orthologs with/without it.
#[derive(Debug, Clone, new)]
pub struct FisherTestCase {
    pub id: String,
    pub description: String,
    pub target_with: usize,
    pub target_without: usize,
    pub background_with: usize,
    pub background_without: usize,
}

impl FisherTestCase {
    /// One-sided exact test for over-representation, delegated to the
    /// hypergeometric survival function. An empty background column is an
    /// undefined (NaN) result, not an error.
    pub fn p_value(&self) -> f64 {
        let twg = self.target_with as u64;
        let twog = self.target_without as u64;
        let nwg = self.background_with as u64;
        let nwog = self.background_without as u64;

        if nwg + nwog == 0 {
            return f64::NAN;
        }
        if twg == 0 {
            return 1.0;
        }
        let population = twg + twog + nwg + nwog;
        let successes = twg + nwg;
        let draws = twg + twog;
        match Hypergeometric::new(population, successes, draws) {
            // sf excludes the observed count, so step down one
            Ok(hyper) => hyper.sf(twg - 1),
            Err(_) => f64::NAN,
        }
    }
}

/// Multiple-testing status of one finding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FdrStatus {
    Corrected(f64),
    /// No corrected value could be computed; judge by the raw p-value.
    Indeterminate,
}

/// One tested domain, ranked by corrected significance.
#[derive(Debug, Clone)]
pub struct EnrichmentFinding {
    pub case: FisherTestCase,
    pub p_value: f64,
    pub fdr: FdrStatus,
    /// Corrected value at or below alpha with at least two supporting
    /// target genes.
    pub significant: bool,
    /// At least two target genes carry the domain. Single-gene findings
    /// are reported but sit below the evidentiary bar.
    pub well_supported: bool,
}

/// Test every domain observed among the target orthologs for enrichment
/// against the background orthologs, correcting across all tests with
/// Benjamini-Hochberg FDR.
pub fn enrich(
    target_groups: &HashSet<String>,
    background_groups: &HashSet<String>,
    index: &OrthologIndex,
    domains: &DomainIndex,
    alpha: f64,
) -> Vec<EnrichmentFinding> {
    // genes of every background ortholog, keyed by both full and local id
    let mut background_genes = HashSet::new();
    for group in background_groups {
        for gene in index.members_of(group).unwrap_or(&[]) {
            background_genes.insert(gene.clone());
            background_genes.insert(local_id(gene).to_string());
        }
    }

    // one representative gene per target ortholog contributes its domains
    let mut observed: HashMap<String, usize> = HashMap::new();
    let mut sorted_targets: Vec<&String> = target_groups.iter().collect();
    sorted_targets.sort_unstable();
    for group in sorted_targets {
        for gene in index.members_of(group).unwrap_or(&[]) {
            let found = domains
                .domains_of(local_id(gene))
                .or_else(|| domains.domains_of(gene));
            if let Some(accessions) = found {
                let unique: HashSet<&String> = accessions.iter().collect();
                for accession in unique {
                    *observed.entry(accession.clone()).or_insert(0) += 1;
                }
                break;
            }
        }
    }
    info!(
        "{} pfam domains found across {} target orthologs",
        observed.len(),
        target_groups.len()
    );

    let mut cases = Vec::new();
    let mut accessions: Vec<(String, usize)> = observed.into_iter().collect();
    accessions.sort_unstable();
    for (accession, target_with) in accessions {
        let target_without = target_groups.len().saturating_sub(target_with);
        let background_with = domains
            .genes_with(&accession)
            .map(|genes| genes.iter().filter(|g| background_genes.contains(*g)).count())
            .unwrap_or(0)
            .saturating_sub(target_with);
        let background_without = background_groups
            .len()
            .saturating_sub(target_groups.len())
            .saturating_sub(background_with);
        let description = format!(
            "{} ({})",
            accession,
            domains.description(&accession).unwrap_or("")
        );
        cases.push(FisherTestCase::new(
            accession,
            description,
            target_with,
            target_without,
            background_with,
            background_without,
        ));
    }

    let pvalues: Vec<f64> = cases.iter().map(FisherTestCase::p_value).collect();

    // correct across the finite tests only; the rest stay indeterminate
    let finite: Vec<usize> = (0..pvalues.len())
        .filter(|&i| pvalues[i].is_finite())
        .collect();
    let corrected = adjust(
        &finite.iter().map(|&i| pvalues[i]).collect::<Vec<_>>(),
        Procedure::BenjaminiHochberg,
    );
    let mut qvalues: Vec<Option<f64>> = vec![None; pvalues.len()];
    for (slot, q) in finite.into_iter().zip(corrected) {
        qvalues[slot] = Some(q);
    }

    let mut findings: Vec<EnrichmentFinding> = cases
        .into_iter()
        .zip(pvalues)
        .zip(qvalues)
        .map(|((case, p_value), qvalue)| {
            let well_supported = case.target_with >= 2;
            let (fdr, significant) = match qvalue {
                Some(q) => (FdrStatus::Corrected(q), q <= alpha && well_supported),
                None => {
                    debug!("FDR not determined for {} (p={})", case.id, p_value);
                    (FdrStatus::Indeterminate, false)
                }
            };
            EnrichmentFinding {
                case,
                p_value,
                fdr,
                significant,
                well_supported,
            }
        })
        .collect();

    findings.sort_by(|a, b| {
        let key = |f: &EnrichmentFinding| match f.fdr {
            FdrStatus::Corrected(q) => (0, q, f.p_value),
            FdrStatus::Indeterminate => (1, f.p_value, f.p_value),
        };
        let (ka, kb) = (key(a), key(b));
        ka.0.cmp(&kb.0)
            .then(ka.1.partial_cmp(&kb.1).unwrap_or(std::cmp::Ordering::Equal))
            .then(ka.2.partial_cmp(&kb.2).unwrap_or(std::cmp::Ordering::Equal))
    });
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orthology::OrthologFilter;
    use itertools::Itertools;
    use std::io::Cursor;

    fn domain_line(accession: &str, gene: &str, description: &str) -> String {
        // columns 4..=21 are unused scan fields
        let filler = (0..18).map(|_| "x").join(" ");
        format!("seq {accession} x {gene} {filler} {description}")
    }

    fn group_set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_domain_index_parsing() {
        let body = format!(
            "# comment line\n\n{}\n{}\n",
            domain_line("PF00001", "g1", "7 transmembrane receptor"),
            domain_line("PF00001", "g2", "7 transmembrane receptor"),
        );
        let index = DomainIndex::from_reader(Cursor::new(body)).unwrap();
        assert_eq!(index.genes_with("PF00001").unwrap().len(), 2);
        assert_eq!(index.domains_of("g1").unwrap(), ["PF00001"]);
        assert_eq!(index.description("PF00001"), Some("7 transmembrane receptor"));
    }

    #[test]
    fn test_fisher_case_monotonicity() {
        // stronger enrichment signal yields a smaller p-value
        let strong = FisherTestCase::new("PF00001".into(), String::new(), 3, 0, 7, 90);
        let weak = FisherTestCase::new("PF00001".into(), String::new(), 3, 0, 50, 47);
        assert!(strong.p_value() < weak.p_value());
        assert!(strong.p_value() > 0.0);
        assert!(weak.p_value() <= 1.0);
    }

    #[test]
    fn test_fisher_case_undefined_background() {
        let case = FisherTestCase::new("PF00001".into(), String::new(), 3, 0, 0, 0);
        assert!(case.p_value().is_nan());
    }

    #[test]
    fn test_enrichment_scenario() {
        // 100 background orthologs, 10 of which carry PF00001; all 3
        // target orthologs carry it
        let orthofile = (1..=100)
            .map(|i| format!("OG{i:03} AAAA|g{i}"))
            .join("\n");
        let index =
            OrthologIndex::build(Cursor::new(orthofile), &OrthologFilter::default()).unwrap();
        let annotations = (1..=10)
            .map(|i| domain_line("PF00001", &format!("g{i}"), "GPCR"))
            .join("\n");
        let domains = DomainIndex::from_reader(Cursor::new(annotations)).unwrap();

        let target = group_set(&["OG001", "OG002", "OG003"]);
        let background: HashSet<String> =
            (1..=100).map(|i| format!("OG{i:03}")).collect();

        let findings = enrich(&target, &background, &index, &domains, 0.05);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.case.target_with, 3);
        assert_eq!(finding.case.target_without, 0);
        assert_eq!(finding.case.background_with, 7);
        assert_eq!(finding.case.background_without, 90);
        assert!(finding.well_supported);
        assert!(matches!(finding.fdr, FdrStatus::Corrected(_)));
    }

    #[test]
    fn test_single_gene_finding_flagged_not_dropped() {
        let orthofile = (1..=20).map(|i| format!("OG{i:02} AAAA|g{i}")).join("\n");
        let index =
            OrthologIndex::build(Cursor::new(orthofile), &OrthologFilter::default()).unwrap();
        let annotations = domain_line("PF00002", "g1", "kinase");
        let domains = DomainIndex::from_reader(Cursor::new(annotations)).unwrap();

        let target = group_set(&["OG01", "OG02"]);
        let background: HashSet<String> = (1..=20).map(|i| format!("OG{i:02}")).collect();

        let findings = enrich(&target, &background, &index, &domains, 0.05);
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].well_supported);
        assert!(!findings[0].significant);
    }

    #[test]
    fn test_indeterminate_fdr_reported_with_raw_p() {
        // background identical to the target set leaves empty background
        // cells, so the test is undefined and FDR cannot be computed
        let orthofile = "OG1 AAAA|g1\nOG2 AAAA|g2\n";
        let index =
            OrthologIndex::build(Cursor::new(orthofile), &OrthologFilter::default()).unwrap();
        let annotations = format!(
            "{}\n{}\n",
            domain_line("PF00003", "g1", "domain"),
            domain_line("PF00003", "g2", "domain"),
        );
        let domains = DomainIndex::from_reader(Cursor::new(annotations)).unwrap();

        let target = group_set(&["OG1", "OG2"]);
        let background = group_set(&["OG1", "OG2"]);

        let findings = enrich(&target, &background, &index, &domains, 0.05);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].fdr, FdrStatus::Indeterminate);
        assert!(findings[0].p_value.is_nan());
        assert!(!findings[0].significant);
    }
}
