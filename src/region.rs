use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{errors::StoreError, query::AdminLevel, store::EdgeStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRef {
    pub id: String,
    pub label: Option<String>,
}

/// A place and the regions enclosing it at each admin level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub label: Option<String>,
    pub country: Option<PlaceRef>,
    pub admin1: Option<PlaceRef>,
    pub admin2: Option<PlaceRef>,
    pub admin3: Option<PlaceRef>,
}

impl Region {
    pub fn level(&self, level: AdminLevel) -> Option<&PlaceRef> {
        match level {
            AdminLevel::Country => self.country.as_ref(),
            AdminLevel::Admin1 => self.admin1.as_ref(),
            AdminLevel::Admin2 => self.admin2.as_ref(),
            AdminLevel::Admin3 => self.admin3.as_ref(),
        }
    }

    fn set_level(&mut self, level: AdminLevel, place: PlaceRef) {
        let slot = match level {
            AdminLevel::Country => &mut self.country,
            AdminLevel::Admin1 => &mut self.admin1,
            AdminLevel::Admin2 => &mut self.admin2,
            AdminLevel::Admin3 => &mut self.admin3,
        };
        *slot = Some(place);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memoizes region lookups. Owned by the caller; nothing here is process-global.
#[derive(Default)]
pub struct RegionCache {
    inner: RwLock<AHashMap<String, Region>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RegionCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: &str) -> Option<Region> {
        if let Some(region) = self.inner.read().get(id).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(region)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Returns the cached region or runs `fetch` and memoizes its result. `Ok(None)` from
    /// `fetch` is not cached, so a region added later is picked up.
    pub fn get_or_fetch<F>(&self, id: &str, fetch: F) -> Result<Option<Region>, StoreError>
    where
        F: FnOnce(&str) -> Result<Option<Region>, StoreError>,
    {
        if let Some(region) = self.get(id) {
            return Ok(Some(region));
        }
        let fetched = fetch(id)?;
        if let Some(region) = &fetched {
            self.inner.write().insert(id.to_string(), region.clone());
        }
        Ok(fetched)
    }

    pub fn invalidate(&self, id: &str) {
        self.inner.write().remove(id);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.read().len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

impl EdgeStore {
    /// Reads `id`'s label and its per-level member-of edges. `None` when the node has
    /// neither.
    pub fn fetch_region(&self, id: &str) -> Result<Option<Region>, StoreError> {
        let mut region = Region {
            id: id.to_string(),
            label: self.node_label(id)?,
            ..Region::default()
        };
        let mut found = region.label.is_some();
        for level in AdminLevel::ALL {
            let edges = self.lookup_by_subject_predicate(id, level.predicate())?;
            if let Some(edge) = edges.into_iter().next() {
                let label = self.node_label(&edge.node2)?;
                region.set_level(
                    level,
                    PlaceRef {
                        id: edge.node2,
                        label,
                    },
                );
                found = true;
            }
        }
        Ok(found.then_some(region))
    }

    pub fn cached_region(
        &self,
        cache: &RegionCache,
        id: &str,
    ) -> Result<Option<Region>, StoreError> {
        cache.get_or_fetch(id, |id| self.fetch_region(id))
    }
}
