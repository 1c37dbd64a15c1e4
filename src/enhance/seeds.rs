// src/enhance/seeds.rs
//! Pre-verified seed dataset: exact-title cache and few-shot material.
//!
//! Loaded from a versioned JSON file; a copy is bundled into the binary and
//! used when the file is absent or unreadable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::Path};

use super::client::FewShot;
use super::{prompt, Annotation, Bilingual, Languages};
use crate::ingest::types::RawArticle;

const BUNDLED: &str = include_str!("../../config/seed_examples.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedExample {
    pub title: String,
    #[serde(default)]
    pub original_summary: String,
    pub simplified_title: Bilingual,
    pub summary: Bilingual,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Deserialize)]
struct SeedFile {
    version: String,
    #[serde(default = "default_source_language")]
    source_language: String,
    #[serde(default = "default_target_language")]
    target_language: String,
    examples: Vec<SeedExample>,
}

fn default_source_language() -> String {
    Languages::default().source
}

fn default_target_language() -> String {
    Languages::default().target
}

#[derive(Debug, Clone)]
pub struct SeedSet {
    version: String,
    languages: Languages,
    examples: Vec<SeedExample>,
    by_title: HashMap<String, usize>,
}

impl SeedSet {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SeedFile = serde_json::from_str(json).context("parsing seed dataset")?;
        let mut by_title = HashMap::with_capacity(file.examples.len());
        for (i, ex) in file.examples.iter().enumerate() {
            // first entry wins on repeated titles
            by_title.entry(title_key(&ex.title)).or_insert(i);
        }
        Ok(Self {
            version: file.version,
            languages: Languages {
                source: file.source_language,
                target: file.target_language,
            },
            examples: file.examples,
            by_title,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading seed dataset from {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Dataset compiled into the binary.
    pub fn bundled() -> Self {
        match Self::from_json(BUNDLED) {
            Ok(set) => set,
            Err(e) => {
                tracing::error!(target: "enhance", error = %e, "bundled seed dataset invalid");
                Self::empty()
            }
        }
    }

    /// File when given and readable, bundled copy otherwise.
    pub fn load_or_bundled(path: Option<&Path>) -> Self {
        match path.map(Self::load_from_file) {
            Some(Ok(set)) => set,
            Some(Err(e)) => {
                tracing::warn!(target: "enhance", error = %e, "seed dataset unavailable; using bundled copy");
                Self::bundled()
            }
            None => Self::bundled(),
        }
    }

    pub fn empty() -> Self {
        Self {
            version: "empty".to_string(),
            languages: Languages::default(),
            examples: Vec::new(),
            by_title: HashMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Exact title match, ignoring case and surrounding/duplicate whitespace.
    pub fn lookup(&self, title: &str) -> Option<&SeedExample> {
        self.by_title
            .get(&title_key(title))
            .map(|&i| &self.examples[i])
    }

    /// The first `n` seeds as prompt/answer pairs in the task format.
    pub fn few_shot(&self, n: usize, langs: &Languages) -> Vec<FewShot> {
        self.examples
            .iter()
            .take(n)
            .map(|ex| {
                let article = RawArticle::titled(ex.title.clone()).with_summary(ex.original_summary.clone());
                FewShot {
                    user: prompt::task_prompt(&article, langs),
                    assistant: prompt::example_answer(ex),
                }
            })
            .collect()
    }
}

fn title_key(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
