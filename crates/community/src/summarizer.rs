use crate::partition::{CommunityId, Partition};
use atlas_graph::{EntityGraph, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text generation backend (usually an LLM client)
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Representative entities listed in a prompt
    pub max_entities: usize,

    /// Stored when generation fails
    pub placeholder: String,

    /// Length hint passed to the generator
    pub max_words: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_entities: 30,
            placeholder: "Summary unavailable.".to_string(),
            max_words: 100,
        }
    }
}

/// Describes each community from its files and classes
pub struct CommunitySummarizer<G> {
    generator: G,
    config: SummarizerConfig,
}

impl<G: TextGenerator> CommunitySummarizer<G> {
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, SummarizerConfig::default())
    }

    pub fn with_config(generator: G, config: SummarizerConfig) -> Self {
        Self { generator, config }
    }

    /// `- id (kind)` lines for the File and Class members, capped at `max_entities`
    pub fn representatives(&self, graph: &EntityGraph, members: &[&str]) -> Vec<String> {
        members
            .iter()
            .filter_map(|id| graph.node_by_id(id))
            .filter(|node| matches!(node.kind, EntityKind::File | EntityKind::Class))
            .take(self.config.max_entities)
            .map(|node| format!("- {} ({})", node.id, node.kind.as_str()))
            .collect()
    }

    pub fn prompt(&self, representatives: &[String]) -> String {
        format!(
            "You are a senior software architect. The code entities below form one logical \
             community of a repository. Describe in at most {} words what this community is \
             responsible for and where it sits in the overall project.\n\n\
             Code entities:\n{}\n\nReply with the summary only.",
            self.config.max_words,
            representatives.join("\n")
        )
    }

    /// Summaries keyed by community id
    ///
    /// Communities without files or classes get no entry. A failed generation stores the
    /// placeholder and the run continues.
    pub fn summarize(
        &self,
        graph: &EntityGraph,
        partition: &Partition,
    ) -> BTreeMap<CommunityId, String> {
        let mut summaries = BTreeMap::new();
        for (id, members) in partition.iter() {
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            let representatives = self.representatives(graph, &members);
            if representatives.is_empty() {
                log::debug!("Community {} has no files or classes, skipping summary", id);
                continue;
            }

            let summary = match self.generator.generate(&self.prompt(&representatives)) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    log::warn!("Failed to summarize community {}: {:#}", id, e);
                    self.config.placeholder.clone()
                }
            };
            summaries.insert(id, summary);
        }

        log::info!(
            "Summarized {} of {} communities",
            summaries.len(),
            partition.len()
        );
        summaries
    }
}
