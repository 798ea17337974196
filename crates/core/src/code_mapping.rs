//! Disease/pathogen code to transmission-category translation.
//!
//! Two providers exist and one is chosen at construction from configuration:
//! - [`CachedCodeMapper`] holds one reloadable cache per concept map
//! - [`ExternalCodeMapper`] asks a lookup service per code
//!
//! Lookup failures never escape: they are logged and answer `None`.

use crate::cache::{Reloadable, ReloadableCache};
use crate::collaborators::{CodeLookupService, ConceptMapSource};
use crate::config::{CodeMappingConfig, CodeMappingProvider};
use crate::notification::ReportType;
use std::sync::Arc;

pub struct CachedCodeMapper {
    disease: Arc<ReloadableCache<String, String>>,
    laboratory: Arc<ReloadableCache<String, String>>,
}

impl CachedCodeMapper {
    pub fn new(source: Arc<dyn ConceptMapSource>, config: &CodeMappingConfig) -> Self {
        Self {
            disease: Arc::new(concept_map_cache(
                Arc::clone(&source),
                config.disease_concept_map.as_str(),
            )),
            laboratory: Arc::new(concept_map_cache(
                source,
                config.laboratory_concept_map.as_str(),
            )),
        }
    }

    pub fn map_disease_code(&self, code: &str) -> Option<String> {
        self.disease.get(code)
    }

    pub fn map_laboratory_code(&self, code: &str) -> Option<String> {
        self.laboratory.get(code)
    }
}

fn concept_map_cache(
    source: Arc<dyn ConceptMapSource>,
    name: &str,
) -> ReloadableCache<String, String> {
    let concept_map = name.to_string();
    ReloadableCache::new(
        name,
        Box::new(move || source.fetch_concept_map(&concept_map)),
    )
}

pub struct ExternalCodeMapper {
    service: Arc<dyn CodeLookupService>,
    disease_concept_map: String,
    laboratory_concept_map: String,
}

impl ExternalCodeMapper {
    pub fn new(service: Arc<dyn CodeLookupService>, config: &CodeMappingConfig) -> Self {
        Self {
            service,
            disease_concept_map: config.disease_concept_map.to_string(),
            laboratory_concept_map: config.laboratory_concept_map.to_string(),
        }
    }

    pub fn map_disease_code(&self, code: &str) -> Option<String> {
        self.lookup(&self.disease_concept_map, code)
    }

    pub fn map_laboratory_code(&self, code: &str) -> Option<String> {
        self.lookup(&self.laboratory_concept_map, code)
    }

    fn lookup(&self, concept_map: &str, code: &str) -> Option<String> {
        match self.service.lookup(concept_map, code) {
            Ok(mapped) => mapped,
            Err(err) => {
                tracing::warn!(concept_map, code, error = %err, "code lookup failed");
                None
            }
        }
    }
}

/// The configured code-mapping provider.
pub enum CodeMapper {
    Cached(CachedCodeMapper),
    External(ExternalCodeMapper),
}

impl CodeMapper {
    pub fn from_config(
        config: &CodeMappingConfig,
        concept_maps: Arc<dyn ConceptMapSource>,
        lookup: Arc<dyn CodeLookupService>,
    ) -> Self {
        match config.provider {
            CodeMappingProvider::Cache => {
                CodeMapper::Cached(CachedCodeMapper::new(concept_maps, config))
            }
            CodeMappingProvider::External => {
                CodeMapper::External(ExternalCodeMapper::new(lookup, config))
            }
        }
    }

    pub fn map_disease_code(&self, code: &str) -> Option<String> {
        match self {
            CodeMapper::Cached(mapper) => mapper.map_disease_code(code),
            CodeMapper::External(mapper) => mapper.map_disease_code(code),
        }
    }

    pub fn map_laboratory_code(&self, code: &str) -> Option<String> {
        match self {
            CodeMapper::Cached(mapper) => mapper.map_laboratory_code(code),
            CodeMapper::External(mapper) => mapper.map_laboratory_code(code),
        }
    }

    pub fn map_for(&self, report_type: ReportType, code: &str) -> Option<String> {
        match report_type {
            ReportType::Disease => self.map_disease_code(code),
            ReportType::Laboratory => self.map_laboratory_code(code),
        }
    }

    /// Caches the refresh task should drive. Empty for the external provider.
    pub fn reloadables(&self) -> Vec<Arc<dyn Reloadable>> {
        match self {
            CodeMapper::Cached(mapper) => vec![
                Arc::clone(&mapper.disease) as Arc<dyn Reloadable>,
                Arc::clone(&mapper.laboratory) as Arc<dyn Reloadable>,
            ],
            CodeMapper::External(_) => Vec::new(),
        }
    }
}
