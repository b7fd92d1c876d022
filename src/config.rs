//! Declarative search-index definitions with TOML persistence.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::QueryFactory;
use crate::index::{CompositeIndex, RelationIndex, TransitiveIndex};
use crate::types::{IndexError, IndexResult, Query, Token};

/// Every search index a catalog should host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub transitive: Vec<TransitiveConfig>,
    #[serde(default)]
    pub composite: Vec<CompositeConfig>,
}

/// Definition of a [`TransitiveIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitiveConfig {
    /// Role followed outward.
    pub forward: String,
    /// Role pointing back at `forward` values.
    pub reverse: String,
    /// Secondary roles to close over.
    #[serde(default)]
    pub names: Vec<String>,
    /// Fixed role values a relation must carry to participate.
    #[serde(default, rename = "static")]
    pub statics: BTreeMap<String, u64>,
}

/// Role pair for a transposing query factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransposingConfig {
    pub forward: String,
    pub reverse: String,
}

/// Definition of a [`CompositeIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Roles forming the combination key.
    pub names: Vec<String>,
    /// Answer with values of this role.
    #[serde(default)]
    pub output: Option<String>,
    /// Roles that trigger re-indexing; defaults to `names` plus `output`.
    #[serde(default)]
    pub update: Option<Vec<String>>,
    #[serde(default)]
    pub transposing: Option<TransposingConfig>,
}

impl TransitiveConfig {
    pub fn build(&self) -> IndexResult<TransitiveIndex> {
        if self.forward == self.reverse {
            return Err(IndexError::Config(format!(
                "forward and reverse roles are both {:?}",
                self.forward
            )));
        }
        if self.statics.contains_key(&self.forward) || self.statics.contains_key(&self.reverse) {
            return Err(IndexError::Config(
                "static constraints may not pin the forward or reverse role".to_string(),
            ));
        }
        let statics: Query = self
            .statics
            .iter()
            .map(|(role, &value)| (role.clone(), Token(value)))
            .collect();
        Ok(TransitiveIndex::new(
            self.forward.clone(),
            self.reverse.clone(),
            statics,
            self.names.iter().cloned(),
        ))
    }
}

impl CompositeConfig {
    pub fn build(&self) -> IndexResult<CompositeIndex> {
        if self.names.is_empty() {
            return Err(IndexError::Config(
                "composite index needs at least one name".to_string(),
            ));
        }
        let mut index = CompositeIndex::new(self.names.iter().cloned());
        if let Some(output) = &self.output {
            index = index.with_output(output.clone());
        }
        if let Some(update) = &self.update {
            index = index.with_update(update.iter().cloned());
        }
        if let Some(t) = &self.transposing {
            index = index.with_factory(QueryFactory::transposing(
                t.forward.clone(),
                t.reverse.clone(),
            ));
        }
        Ok(index)
    }
}

impl IndexConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> IndexResult<Self> {
        toml::from_str(text).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| IndexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Construct every configured index, transitive ones first.
    pub fn build(&self) -> IndexResult<Vec<RelationIndex>> {
        let mut indexes: Vec<RelationIndex> =
            Vec::with_capacity(self.transitive.len() + self.composite.len());
        for t in &self.transitive {
            indexes.push(t.build()?.into());
        }
        for c in &self.composite {
            indexes.push(c.build()?.into());
        }
        Ok(indexes)
    }
}
