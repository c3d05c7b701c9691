use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::bm25::Bm25Params;
use crate::error::{Result, SearchError};

/// Retrieval settings, loadable from JSON or TOML
///
/// Every section and field is optional; missing values take the defaults below.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    pub bm25: Bm25Params,
    pub community: CommunityConfig,
    pub hybrid: HybridConfig,
    pub mmr: MmrConfig,
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommunityConfig {
    pub top_k_communities: usize,
    pub top_k_per_community: usize,
    pub top_k_total: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            top_k_communities: 3,
            top_k_per_community: 5,
            top_k_total: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    /// Dense weight; sparse gets `1 - alpha`
    pub alpha: f64,
    pub top_k: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            top_k: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MmrConfig {
    pub lambda: f64,
    pub top_n: usize,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            top_n: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Base result count per category
    pub category_top_k: BTreeMap<String, usize>,
    pub dense_multiplier: usize,
    pub sparse_multiplier: usize,
    pub min_method_k: usize,
    pub max_method_k: usize,
    pub max_total_candidates: usize,
    pub dense_weight: f64,
    pub sparse_weight: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let mut category_top_k = BTreeMap::new();
        category_top_k.insert("code".to_string(), 5);
        category_top_k.insert("text".to_string(), 2);
        Self {
            category_top_k,
            dense_multiplier: 6,
            sparse_multiplier: 4,
            min_method_k: 6,
            max_method_k: 30,
            max_total_candidates: 60,
            dense_weight: 0.6,
            sparse_weight: 0.4,
        }
    }
}

impl RetrievalConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read retrieval config {}", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Invalid retrieval config {}", path.display()))
    }

    /// Parse JSON, falling back to TOML, then validate
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let config: Self = match serde_json::from_slice(bytes) {
            Ok(config) => config,
            Err(json_err) => {
                let text = std::str::from_utf8(bytes).map_err(|err| anyhow!("{json_err}; {err}"))?;
                toml::from_str(text).map_err(|toml_err| {
                    anyhow!("Config is not valid JSON ({json_err}) or TOML ({toml_err})")
                })?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("hybrid.alpha", self.hybrid.alpha)?;
        check_unit("mmr.lambda", self.mmr.lambda)?;
        check_unit("planner.dense_weight", self.planner.dense_weight)?;
        check_unit("planner.sparse_weight", self.planner.sparse_weight)?;

        if !(self.bm25.k1.is_finite() && self.bm25.k1 >= 0.0) {
            return Err(invalid(format!("bm25.k1 must be >= 0, got {}", self.bm25.k1)));
        }
        check_unit("bm25.b", self.bm25.b)?;

        let planner = &self.planner;
        if planner.min_method_k == 0 {
            return Err(invalid("planner.min_method_k must be at least 1".to_string()));
        }
        if planner.min_method_k > planner.max_method_k {
            return Err(invalid(format!(
                "planner.min_method_k ({}) exceeds planner.max_method_k ({})",
                planner.min_method_k, planner.max_method_k
            )));
        }
        if planner.dense_multiplier == 0 || planner.sparse_multiplier == 0 {
            return Err(invalid("planner multipliers must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

fn invalid(message: String) -> SearchError {
    SearchError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = RetrievalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.planner.category_top_k["code"], 5);
        assert_eq!(config.bm25.k1, 1.5);
    }

    #[test]
    fn parses_partial_json() {
        let config =
            RetrievalConfig::from_bytes(br#"{"hybrid": {"alpha": 0.3}, "bm25": {"k1": 1.2}}"#)
                .unwrap();
        assert_eq!(config.hybrid.alpha, 0.3);
        assert_eq!(config.hybrid.top_k, 10);
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.bm25.b, 0.75);
    }

    #[test]
    fn parses_toml() {
        let toml = r#"
[mmr]
lambda = 0.7

[planner]
max_total_candidates = 20

[planner.category_top_k]
code = 3
"#;
        let config = RetrievalConfig::from_bytes(toml.as_bytes()).unwrap();
        assert_eq!(config.mmr.lambda, 0.7);
        assert_eq!(config.planner.max_total_candidates, 20);
        assert_eq!(config.planner.category_top_k.len(), 1);
    }

    #[test]
    fn rejects_out_of_range_and_unknown_fields() {
        assert!(RetrievalConfig::from_bytes(br#"{"hybrid": {"alpha": 1.5}}"#).is_err());
        assert!(RetrievalConfig::from_bytes(
            br#"{"planner": {"min_method_k": 40, "max_method_k": 30}}"#
        )
        .is_err());
        assert!(RetrievalConfig::from_bytes(br#"{"hybird": {}}"#).is_err());
        assert!(RetrievalConfig::from_bytes(b"not = [valid").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[community]\ntop_k_total = 4").unwrap();
        let config = RetrievalConfig::from_file(file.path()).unwrap();
        assert_eq!(config.community.top_k_total, 4);
        assert_eq!(config.community.top_k_communities, 3);

        let missing = RetrievalConfig::from_file(Path::new("/definitely/missing.toml"));
        assert!(missing.is_err());
    }
}
