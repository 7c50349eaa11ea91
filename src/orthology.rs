use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

/// One ortholog group as it appears in the orthology file.
///
/// Members keep file order and the `SSSS|localid` form (4-letter species
/// code, pipe, local gene id).
#[derive(Debug, Clone)]
pub struct OrthologGroup {
    pub id: String,
    pub members: Vec<String>,
}

impl OrthologGroup {
    /// Species code of a member gene: the prefix before the `|` separator.
    pub fn species_code(gene: &str) -> &str {
        gene.split('|').next().unwrap_or(gene)
    }
}

/// Which ortholog groups are admitted into the gene -> group mapping.
#[derive(Debug, Clone, Default)]
pub struct OrthologFilter {
    /// Species that must be present in a group for it to be retained.
    /// When unset, every species observed in the group is required, which
    /// reduces the check to the at-most-once constraint.
    pub required_species: Option<HashSet<String>>,
    /// Species whose duplication within a group is tolerated.
    pub ignorable_species: Option<HashSet<String>>,
    /// Tolerate duplication for every species. Downstream translation still
    /// decides how the extra genes are resolved.
    pub collapse_duplicates: bool,
}

/// Gene -> ortholog-group index built once from the orthology file.
///
/// Groups live in an arena; `group_of` holds arena indices for genes whose
/// group passed the filter, while `id_of` covers every group in the file.
/// The unfiltered side is needed later for name lookup and enrichment,
/// independent of which groups were retained.
#[derive(Debug, Clone)]
pub struct OrthologIndex {
    groups: Vec<OrthologGroup>,
    id_of: HashMap<String, usize>,
    group_of: HashMap<String, usize>,
    retained: usize,
}

impl OrthologIndex {
    pub fn from_path<P: AsRef<Path>>(path: P, filter: &OrthologFilter) -> Result<Self> {
        let path = path.as_ref();
        info!("indexing ortholog groups from {}", path.display());
        let handle = File::open(path)
            .with_context(|| format!("could not open orthology file {}", path.display()))?;
        Self::build(BufReader::new(handle), filter)
    }

    /// Parse the orthology file: each non-empty line is
    /// `group_id member_1 member_2 ...`. Empty lines are skipped silently.
    pub fn build<R: BufRead>(reader: R, filter: &OrthologFilter) -> Result<Self> {
        let mut groups = Vec::new();
        let mut id_of = HashMap::new();
        let mut group_of = HashMap::new();
        let mut retained = 0;

        for line in reader.lines() {
            let line = line.context("failed reading orthology file")?;
            let mut cols = line.split_whitespace();
            let Some(id) = cols.next() else {
                continue;
            };
            let members: Vec<String> = cols.map(str::to_string).collect();
            let arena_idx = groups.len();

            if Self::passes(&members, filter) {
                for gene in &members {
                    group_of.insert(gene.clone(), arena_idx);
                }
                retained += 1;
            }

            id_of.insert(id.to_string(), arena_idx);
            groups.push(OrthologGroup {
                id: id.to_string(),
                members,
            });
        }

        info!(
            "{} genes indexed across {} of {} ortholog groups",
            group_of.len(),
            retained,
            groups.len()
        );
        if retained == 0 {
            debug!("no ortholog groups passed the species filter");
        }

        Ok(Self {
            groups,
            id_of,
            group_of,
            retained,
        })
    }

    /// The inclusion predicate: after coercion, every species occurs at most
    /// once and every required species is present.
    fn passes(members: &[String], filter: &OrthologFilter) -> bool {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for gene in members {
            let species = OrthologGroup::species_code(gene);
            if filter.collapse_duplicates
                || filter
                    .ignorable_species
                    .as_ref()
                    .is_some_and(|x| x.contains(species))
            {
                counts.insert(species, 1);
            } else {
                *counts.entry(species).or_insert(0) += 1;
            }
        }

        let unique = counts.values().all(|&c| c <= 1);
        let complete = match &filter.required_species {
            Some(required) => required.iter().all(|s| counts.contains_key(s.as_str())),
            None => true,
        };
        unique && complete
    }

    /// Group id owning `gene`, if the gene belongs to a retained group.
    pub fn group_of(&self, gene: &str) -> Option<&str> {
        self.group_of
            .get(gene)
            .map(|&idx| self.groups[idx].id.as_str())
    }

    /// Member genes of `group_id`, filtered or not.
    pub fn members_of(&self, group_id: &str) -> Option<&[String]> {
        self.id_of
            .get(group_id)
            .map(|&idx| self.groups[idx].members.as_slice())
    }

    pub fn contains_gene(&self, gene: &str) -> bool {
        self.group_of.contains_key(gene)
    }

    /// Every group present in the file.
    pub fn groups(&self) -> &[OrthologGroup] {
        &self.groups
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of groups passing the filter. Zero is a reportable outcome,
    /// not an error.
    pub fn retained_group_count(&self) -> usize {
        self.retained
    }

    pub fn retained_gene_count(&self) -> usize {
        self.group_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn species(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const ORTHOFILE: &str = "\
G1 AAAA|1 BBBB|1
G2 AAAA|2 AAAA|3

G3 AAAA|4 BBBB|2 CCCC|1
";

    #[test]
    fn test_duplicate_species_excludes_group() {
        let filter = OrthologFilter {
            required_species: Some(species(&["AAAA", "BBBB"])),
            ..Default::default()
        };
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();

        assert_eq!(index.group_of("AAAA|1"), Some("G1"));
        assert_eq!(index.group_of("BBBB|1"), Some("G1"));
        // G2 duplicates AAAA and fails the at-most-once constraint
        assert_eq!(index.group_of("AAAA|2"), None);
        assert_eq!(index.group_of("AAAA|3"), None);
        // members_of reflects the raw file regardless
        assert_eq!(index.members_of("G2").unwrap().len(), 2);
        assert_eq!(index.num_groups(), 3);
        assert_eq!(index.retained_group_count(), 2);
    }

    #[test]
    fn test_collapse_duplicates_admits_group() {
        let filter = OrthologFilter {
            collapse_duplicates: true,
            ..Default::default()
        };
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();
        assert_eq!(index.group_of("AAAA|2"), Some("G2"));
        assert_eq!(index.retained_group_count(), 3);
    }

    #[test]
    fn test_ignorable_species_tolerates_duplication() {
        let filter = OrthologFilter {
            ignorable_species: Some(species(&["AAAA"])),
            ..Default::default()
        };
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();
        assert_eq!(index.group_of("AAAA|3"), Some("G2"));
    }

    #[test]
    fn test_missing_required_species_excludes_group() {
        let filter = OrthologFilter {
            required_species: Some(species(&["AAAA", "BBBB", "CCCC"])),
            ..Default::default()
        };
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();
        // only G3 carries all three species
        assert_eq!(index.retained_group_count(), 1);
        assert_eq!(index.group_of("AAAA|1"), None);
        assert_eq!(index.group_of("CCCC|1"), Some("G3"));
    }

    #[test]
    fn test_required_species_never_present_yields_zero_retained() {
        let filter = OrthologFilter {
            required_species: Some(species(&["ZZZZ"])),
            ..Default::default()
        };
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();
        assert_eq!(index.retained_group_count(), 0);
        assert_eq!(index.retained_gene_count(), 0);
        assert_eq!(index.num_groups(), 3);
    }

    #[test]
    fn test_every_retained_gene_resolves_to_an_indexed_group() {
        let filter = OrthologFilter::default();
        let index = OrthologIndex::build(Cursor::new(ORTHOFILE), &filter).unwrap();
        for group in index.groups() {
            for gene in &group.members {
                if let Some(id) = index.group_of(gene) {
                    assert!(index.members_of(id).is_some());
                }
            }
        }
    }
}
