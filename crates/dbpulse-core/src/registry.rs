//! Collector set, the scrapers a process runs keyed by name.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::CollectorSetError;
use crate::metric::MetricDesc;
use crate::scraper::Scraper;
use crate::scrapers::{self, Descriptors};

/// Immutable mapping from scraper name to scraper, in registration order.
///
/// Construction rejects empty or duplicate names, duplicate descriptor names
/// and statements that are not a single `SELECT`.
#[derive(Clone)]
pub struct CollectorSet {
    scrapers: Vec<Arc<dyn Scraper>>,
    by_name: HashMap<&'static str, usize>,
}

impl CollectorSet {
    pub fn new(
        scrapers: impl IntoIterator<Item = Arc<dyn Scraper>>,
    ) -> Result<Self, CollectorSetError> {
        let scrapers: Vec<Arc<dyn Scraper>> = scrapers.into_iter().collect();
        let mut by_name = HashMap::with_capacity(scrapers.len());
        let mut fq_names = HashSet::with_capacity(scrapers.len());

        for (idx, scraper) in scrapers.iter().enumerate() {
            let name = scraper.name();
            if name.is_empty() {
                return Err(CollectorSetError::EmptyName);
            }
            if by_name.insert(name, idx).is_some() {
                return Err(CollectorSetError::DuplicateName(name.to_string()));
            }

            let fq_name = scraper.descriptor().fq_name();
            if !fq_names.insert(fq_name) {
                return Err(CollectorSetError::DuplicateDescriptor(fq_name.to_string()));
            }

            scraper
                .statement()
                .validate()
                .map_err(|reason| CollectorSetError::NotReadOnly {
                    name: name.to_string(),
                    reason,
                })?;
        }

        Ok(Self { scrapers, by_name })
    }

    /// Every built-in collector.
    pub fn with_defaults(descriptors: &Descriptors) -> Result<Self, CollectorSetError> {
        Self::new(scrapers::all(descriptors))
    }

    /// Keep only the named collectors; an empty list keeps everything.
    ///
    /// Registration order is preserved regardless of the order of `enabled`.
    pub fn filter<S: AsRef<str>>(&self, enabled: &[S]) -> Result<Self, CollectorSetError> {
        if enabled.is_empty() {
            return Ok(self.clone());
        }

        let mut wanted = HashSet::with_capacity(enabled.len());
        for name in enabled {
            let name = name.as_ref();
            if !self.by_name.contains_key(name) {
                return Err(CollectorSetError::UnknownCollector(name.to_string()));
            }
            wanted.insert(name);
        }

        let kept = self
            .scrapers
            .iter()
            .filter(|s| wanted.contains(s.name()))
            .cloned();
        let set = Self::new(kept)?;
        info!(collectors = ?set.names(), "collector set filtered");
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Scraper>> {
        self.by_name.get(name).map(|&idx| &self.scrapers[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Scraper>> {
        self.scrapers.iter()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    /// Descriptors of every collector, for upfront registration.
    pub fn descriptors(&self) -> Vec<Arc<MetricDesc>> {
        self.scrapers
            .iter()
            .map(|s| Arc::clone(s.descriptor()))
            .collect()
    }
}

impl fmt::Debug for CollectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorSet")
            .field("collectors", &self.names())
            .finish()
    }
}
