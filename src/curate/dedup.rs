// src/curate/dedup.rs
//! Near-duplicate detection and representative selection.
//!
//! - Exact identity first: equal canonical links (or, when both links are
//!   absent, equal content fingerprints) always land in the same group.
//! - Similarity: `strsim::normalized_levenshtein` on lowercase title and summary.
//! - Grouping is either anchor-based (first unprocessed item anchors a group,
//!   later matches join it, no closure) or transitive (union-find over the
//!   match graph).
//!
//! O(n²) pair comparisons; batches are expected to be a few hundred items.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strsim::normalized_levenshtein;

use crate::curate::ScoredArticle;
use crate::ingest::types::RawArticle;

/// How matches are turned into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Anchor scan in input order; A~B and B~C does not imply A~C.
    Anchor,
    /// Connected components of the match graph.
    #[default]
    Transitive,
}

/// Similarity thresholds. Comparisons are strict (`>`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub title_threshold: f64,
    pub summary_threshold: f64,
    pub loose_title_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.8,
            summary_threshold: 0.7,
            loose_title_threshold: 0.5,
        }
    }
}

/// Indices (into the curation batch) judged equivalent, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
    grouping: Grouping,
}

impl Deduplicator {
    pub fn new(config: DedupConfig, grouping: Grouping) -> Self {
        Self { config, grouping }
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    /// Every group with at least two members, ordered by first member.
    pub fn find_duplicates(&self, articles: &[RawArticle]) -> Vec<DuplicateGroup> {
        let keys: Vec<Compared> = articles.iter().map(Compared::from).collect();
        let units = exact_classes(articles);

        let merged = match self.grouping {
            Grouping::Anchor => self.anchor_scan(&units, &keys),
            Grouping::Transitive => self.union_units(&units, &keys),
        };
        finish(merged)
    }

    /// Exact-identity groups only (no similarity scan). Used by fast-track.
    pub fn find_exact_duplicates(&self, articles: &[RawArticle]) -> Vec<DuplicateGroup> {
        finish(exact_classes(articles))
    }

    /// Pairwise similarity test, exposed for diagnostics and tests.
    pub fn is_similar(&self, a: &RawArticle, b: &RawArticle) -> bool {
        self.similar(&Compared::from(a), &Compared::from(b))
    }

    fn similar(&self, a: &Compared, b: &Compared) -> bool {
        let title_sim = normalized_levenshtein(&a.title, &b.title);
        if title_sim > self.config.title_threshold {
            return true;
        }
        if a.summary.is_empty() || b.summary.is_empty() {
            return false;
        }
        title_sim > self.config.loose_title_threshold
            && normalized_levenshtein(&a.summary, &b.summary) > self.config.summary_threshold
    }

    fn units_match(&self, a: &[usize], b: &[usize], keys: &[Compared]) -> bool {
        a.iter()
            .any(|&i| b.iter().any(|&j| self.similar(&keys[i], &keys[j])))
    }

    fn anchor_scan(&self, units: &[Vec<usize>], keys: &[Compared]) -> Vec<Vec<usize>> {
        let mut processed = vec![false; units.len()];
        let mut out = Vec::new();

        for anchor in 0..units.len() {
            if processed[anchor] {
                continue;
            }
            processed[anchor] = true;
            let mut group = units[anchor].clone();

            for later in (anchor + 1)..units.len() {
                if processed[later] {
                    continue;
                }
                if self.units_match(&units[anchor], &units[later], keys) {
                    group.extend_from_slice(&units[later]);
                    processed[later] = true;
                }
            }
            out.push(group);
        }
        out
    }

    fn union_units(&self, units: &[Vec<usize>], keys: &[Compared]) -> Vec<Vec<usize>> {
        let mut uf = UnionFind::new(units.len());
        for a in 0..units.len() {
            for b in (a + 1)..units.len() {
                if uf.find(a) != uf.find(b) && self.units_match(&units[a], &units[b], keys) {
                    uf.union(a, b);
                }
            }
        }

        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for (u, members) in units.iter().enumerate() {
            by_root.entry(uf.find(u)).or_default().extend_from_slice(members);
        }
        by_root.into_values().collect()
    }
}

/// Pick the kept member: highest total score, then longer raw content,
/// then earliest index. `None` for an empty group.
pub fn select_representative(group: &[usize], scored: &[ScoredArticle]) -> Option<usize> {
    let (&first, rest) = group.split_first()?;
    let mut best = first;
    for &idx in rest {
        let cand = &scored[idx];
        let cur = &scored[best];
        if cand.total_score > cur.total_score
            || (cand.total_score == cur.total_score
                && cand.article.content.chars().count() > cur.article.content.chars().count())
        {
            best = idx;
        }
    }
    Some(best)
}

/// Lowercase comparison keys, computed once per article.
struct Compared {
    title: String,
    summary: String,
}

impl From<&RawArticle> for Compared {
    fn from(a: &RawArticle) -> Self {
        Self {
            title: a.title.to_lowercase(),
            summary: a.summary.trim().to_lowercase(),
        }
    }
}

/// Partition indices into exact-identity classes in first-seen order.
fn exact_classes(articles: &[RawArticle]) -> Vec<Vec<usize>> {
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut classes: Vec<Vec<usize>> = Vec::with_capacity(articles.len());

    for (i, a) in articles.iter().enumerate() {
        // links and fingerprints live in separate key spaces
        let key = match a.canonical_link() {
            Some(link) => format!("link:{link}"),
            None => format!("fp:{}", a.fingerprint()),
        };
        match slot_of.get(&key) {
            Some(&slot) => classes[slot].push(i),
            None => {
                slot_of.insert(key, classes.len());
                classes.push(vec![i]);
            }
        }
    }
    classes
}

fn finish(groups: Vec<Vec<usize>>) -> Vec<DuplicateGroup> {
    let mut out: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|g| g.len() > 1)
        .map(|mut members| {
            members.sort_unstable();
            DuplicateGroup { members }
        })
        .collect();
    out.sort_by_key(|g| g.members[0]);
    out
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // keep the lower root so component ids follow input order
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
