use logtally_core::{Result, TallyError};
use serde::{Deserialize, Serialize};

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on upstream pages followed for one fetch
    pub max_pages: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_pages: 10_000 }
    }
}

impl OrchestratorConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Reject settings that would stop every fetch after its first page
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(TallyError::Config(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
