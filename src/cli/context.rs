use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use policy_facade::{
    DecisionCache, FacadeOptions, HttpPolicyEngine, PolicyEngine, PolicyFacade, StaticSubject,
    SubjectProvider,
};
use tracing::warn;

use crate::config::AppConfig;

/// Shared state for one CLI invocation: one cache, one engine client.
pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    cache: DecisionCache,
    engine: Arc<dyn PolicyEngine>,
    subjects: Arc<dyn SubjectProvider>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf, subject: Option<String>) -> Result<Self> {
        let ttl = config.cache.ttl()?;
        let engine = HttpPolicyEngine::new(config.engine.http_config()?)
            .context("Failed to create policy engine client")?;

        let subject = subject.or_else(|| config.subject.clone());
        let subjects: Arc<dyn SubjectProvider> = match subject {
            Some(subject) => Arc::new(StaticSubject::new(subject)),
            None => {
                warn!("No subject configured; permission checks will report nothing");
                Arc::new(StaticSubject::anonymous())
            }
        };

        Ok(Self {
            config: Arc::new(config),
            config_path,
            cache: DecisionCache::with_ttl(ttl),
            engine: Arc::new(engine),
            subjects,
        })
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn facade(&self) -> PolicyFacade {
        self.facade_with(self.config.facade.clone())
    }

    pub fn facade_with(&self, options: FacadeOptions) -> PolicyFacade {
        PolicyFacade::new(
            self.cache.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.subjects),
        )
        .with_options(options)
    }
}
