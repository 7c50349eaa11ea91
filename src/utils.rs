use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::orthology::OrthologIndex;

/// Short experiment label used to key score matrices: the first five
/// characters of the file name.
pub fn short_label<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.chars().take(5).collect()
}

/// Local gene id with the `SSSS|` species prefix removed. Ids without the
/// prefix pass through unchanged.
pub fn local_id(gene: &str) -> &str {
    match gene.find('|') {
        Some(pos) => &gene[pos + 1..],
        None => gene,
    }
}

/// Gene id -> display name lookup built from a two-or-more column file
/// (column 0 = gene id, remainder joined = display name).
#[derive(Debug, Clone, Default)]
pub struct NameChart {
    names: HashMap<String, String>,
}

impl NameChart {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let handle = File::open(path)
            .with_context(|| format!("could not open gene-name file {}", path.display()))?;
        Self::from_reader(BufReader::new(handle))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut names = HashMap::new();
        for line in reader.lines() {
            let line = line.context("failed reading gene-name file")?;
            let mut cols = line.split_whitespace();
            let Some(gene) = cols.next() else {
                continue;
            };
            let name = cols.collect::<Vec<_>>().join(" ");
            if !name.is_empty() {
                names.insert(gene.to_string(), name);
            }
        }
        Ok(Self { names })
    }

    pub fn get(&self, gene: &str) -> Option<&str> {
        self.names.get(gene).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Human-readable line for one ortholog group: group id, a representative
/// gene id, and the first member with a chart name (falling back to the
/// group's leading members when none is named).
pub fn describe_group(group_id: &str, index: &OrthologIndex, chart: Option<&NameChart>) -> String {
    let mut name = None;
    let mut gene_id = None;
    let members = index.members_of(group_id).unwrap_or(&[]);

    if let Some(chart) = chart {
        for gene in members {
            if let Some(display) = chart.get(local_id(gene)) {
                name = Some(display.to_string());
                gene_id = Some(gene.as_str());
            }
        }
    }

    let name = name.unwrap_or_else(|| {
        members
            .iter()
            .skip(1)
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    });
    let gene_id = gene_id.or_else(|| members.first().map(String::as_str)).unwrap_or("---");

    format!("{:<20} {:<18} {}", group_id, gene_id, name)
}
