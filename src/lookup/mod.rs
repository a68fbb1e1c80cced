//! Stable identifier lookup
//!
//! Maps normalized canonical names to the identifiers issued by earlier
//! backbone builds, so that a rebuilt backbone reuses them. Matching is
//! exact on the normalized name and lenient on rank, kingdom and
//! authorship.

mod store;

pub use store::{LookupStore, MemoryLookupStore, SqliteLookupStore};

use crate::authorship::AuthorComparator;
use crate::config::LookupConfig;
use crate::model::{Equality, Kingdom, Rank};
use crate::parsers::SciNameNormalizer;
use crate::storage::{OpenStore, StorageError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Lookup storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// What to do when several live candidates remain for a specific rank and
/// kingdom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// The oldest identifier wins
    #[default]
    LowestKey,
    /// Leave the match unresolved so a new identifier is issued
    Unresolved,
}

/// A previously issued backbone identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupUsage {
    pub key: i64,
    pub canonical: String,
    pub authorship: Option<String>,
    pub year: Option<String>,
    pub rank: Rank,
    pub kingdom: Kingdom,
    pub deleted: bool,
}

impl LookupUsage {
    pub fn new(key: i64, canonical: impl Into<String>, rank: Rank, kingdom: Kingdom) -> Self {
        Self {
            key,
            canonical: canonical.into(),
            authorship: None,
            year: None,
            rank,
            kingdom,
            deleted: false,
        }
    }

    pub fn with_authorship(mut self, authorship: impl Into<String>) -> Self {
        self.authorship = Some(authorship.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Normalized lookup key of a canonical name, `None` for blank names.
pub fn lookup_key(canonical: &str) -> Option<String> {
    let normed = SciNameNormalizer::normalize(canonical);
    if normed.trim().is_empty() {
        None
    } else {
        Some(normed.to_lowercase())
    }
}

/// Identifier lookup over a memory or disk store.
///
/// Reads are safe from many threads, additions must be serialized by the
/// caller which holds the only `&mut`.
pub struct IdLookup {
    store: Box<dyn LookupStore>,
    comparator: AuthorComparator,
    policy: AmbiguityPolicy,
    size: usize,
    deleted: usize,
    key_max: i64,
}

impl IdLookup {
    /// An empty memory resident lookup.
    pub fn temporary() -> Self {
        Self::with_store(Box::new(MemoryLookupStore::new()))
    }

    /// Opens or creates a disk lookup, restoring its counters.
    pub fn persistent(path: impl AsRef<Path>) -> LookupResult<Self> {
        let store = SqliteLookupStore::open(path)?;
        let mut lookup = Self::with_store(Box::new(store));
        lookup.restore_counters()?;
        Ok(lookup)
    }

    pub fn from_config(cfg: &LookupConfig) -> LookupResult<Self> {
        let lookup = match &cfg.file {
            Some(file) => Self::persistent(file)?,
            None => Self::temporary(),
        };
        Ok(lookup.with_policy(cfg.policy))
    }

    pub fn with_store(store: Box<dyn LookupStore>) -> Self {
        Self {
            store,
            comparator: AuthorComparator,
            policy: AmbiguityPolicy::default(),
            size: 0,
            deleted: 0,
            key_max: 0,
        }
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    fn restore_counters(&mut self) -> LookupResult<()> {
        for usages in self.store.values()? {
            for u in &usages {
                self.count(u);
            }
        }
        if self.size > 0 {
            info!(usages = self.size, deleted = self.deleted, key_max = self.key_max, "Reopened id lookup");
        }
        Ok(())
    }

    fn count(&mut self, u: &LookupUsage) {
        self.size += 1;
        if u.deleted {
            self.deleted += 1;
        }
        self.key_max = self.key_max.max(u.key);
    }

    /// Loads known identifiers, returning how many were added.
    pub fn load(&mut self, usages: impl IntoIterator<Item = LookupUsage>) -> LookupResult<usize> {
        let mut counter = 0;
        for u in usages {
            if self.add(u)? {
                counter += 1;
            }
        }
        info!(usages = counter, key_max = self.key_max, "Loaded existing backbone into id lookup");
        Ok(counter)
    }

    /// Adds one identifier. Usages without a usable canonical name are
    /// skipped and reported as `false`.
    pub fn add(&mut self, usage: LookupUsage) -> LookupResult<bool> {
        let Some(name) = lookup_key(&usage.canonical) else {
            warn!(key = usage.key, kingdom = %usage.kingdom, "Missing canonical name for lookup usage");
            return Ok(false);
        };
        let mut usages = self.store.get(&name)?.unwrap_or_default();
        self.count(&usage);
        usages.push(usage);
        self.store.put(&name, &usages)?;
        Ok(true)
    }

    /// All candidates sharing the normalized canonical name.
    pub fn match_canonical(&self, canonical: &str) -> LookupResult<Vec<LookupUsage>> {
        match lookup_key(canonical) {
            Some(name) => Ok(self.store.get(&name)?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Finds the identifier to reuse for a name, or `None` if a new one
    /// has to be issued.
    ///
    /// `Rank::Unranked` and `Kingdom::IncertaeSedis` match any candidate.
    /// Authorship is only compared if an author or a year is given.
    pub fn match_usage(
        &self,
        canonical: &str,
        authorship: Option<&str>,
        year: Option<&str>,
        rank: Rank,
        kingdom: Kingdom,
    ) -> LookupResult<Option<LookupUsage>> {
        let compare_authorship = authorship.is_some() || year.is_some();
        let hits: Vec<LookupUsage> = self
            .match_canonical(canonical)?
            .into_iter()
            .filter(|u| rank_matches(rank, u.rank) && kingdom_matches(kingdom, u.kingdom))
            .filter(|u| {
                !compare_authorship
                    || self
                        .comparator
                        .compare(authorship, year, u.authorship.as_deref(), u.year.as_deref())
                        != Equality::Different
            })
            .collect();

        match hits.len() {
            0 => return Ok(None),
            1 => return Ok(hits.into_iter().next()),
            _ => {}
        }

        if let Some(exact) = exact_match(canonical, authorship, year, &hits) {
            debug!(hits = hits.len(), key = exact.key, name = canonical, "Single exact match");
            return Ok(Some(exact.clone()));
        }

        let mut live = hits.iter().filter(|u| !u.deleted);
        if let (Some(current), None) = (live.next(), live.next()) {
            debug!(hits = hits.len(), key = current.key, name = canonical, "Single current usage");
            return Ok(Some(current.clone()));
        }

        if rank != Rank::Unranked && kingdom != Kingdom::IncertaeSedis && self.policy == AmbiguityPolicy::LowestKey {
            if let Some(lowest) = hits.iter().min_by_key(|u| u.key) {
                debug!(hits = hits.len(), key = lowest.key, name = canonical, "Lowest key for ambiguous match");
                return Ok(Some(lowest.clone()));
            }
        }
        Ok(None)
    }

    /// Number of identifiers including deleted ones
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted
    }

    /// Largest identifier known
    pub fn key_max(&self) -> i64 {
        self.key_max
    }

    /// Iterates all identifiers.
    pub fn iter(&self) -> LookupResult<impl Iterator<Item = LookupUsage>> {
        Ok(self.store.values()?.into_iter().flatten())
    }
}

fn rank_matches(r1: Rank, r2: Rank) -> bool {
    if r1 == Rank::Unranked || r2 == Rank::Unranked {
        return true;
    }
    match (r1, r2) {
        (Rank::InfraspecificName, r) | (r, Rank::InfraspecificName) => r.is_infraspecific(),
        (Rank::InfrasubspecificName, r) | (r, Rank::InfrasubspecificName) => {
            r.is_infraspecific() && r != Rank::Subspecies
        }
        _ => r1 == r2,
    }
}

fn kingdom_matches(k1: Kingdom, k2: Kingdom) -> bool {
    k1 == Kingdom::IncertaeSedis || k2 == Kingdom::IncertaeSedis || k1 == k2
}

/// The only candidate with literally the same name, authorship and year.
fn exact_match<'a>(
    canonical: &str,
    authorship: Option<&str>,
    year: Option<&str>,
    candidates: &'a [LookupUsage],
) -> Option<&'a LookupUsage> {
    let mut exact = candidates.iter().filter(|u| {
        u.canonical == canonical && u.authorship.as_deref() == authorship && u.year.as_deref() == year
    });
    match (exact.next(), exact.next()) {
        (Some(u), None) => Some(u),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn abies(key: i64) -> LookupUsage {
        LookupUsage::new(key, "Abies alba", Rank::Species, Kingdom::Plantae)
    }

    // ========================================================================
    // Ladder
    // ========================================================================

    #[test]
    fn test_single_candidate() {
        let mut lookup = IdLookup::temporary();
        lookup.add(abies(42)).unwrap();

        let hit = lookup
            .match_usage("Abies alba", None, None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(42));
        // normalization folds case and whitespace
        let hit = lookup
            .match_usage("abies  ALBA", None, None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(42));
    }

    #[test]
    fn test_live_candidate_beats_deleted() {
        let mut lookup = IdLookup::temporary();
        lookup.load(vec![abies(10).deleted(), abies(11).deleted(), abies(12)]).unwrap();
        assert_eq!(lookup.size(), 3);
        assert_eq!(lookup.deleted_count(), 2);

        let hit = lookup
            .match_usage("Abies alba", None, None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(12));
    }

    #[test]
    fn test_exact_authorship_wins() {
        let mut lookup = IdLookup::temporary();
        lookup
            .load(vec![abies(1).with_authorship("Mill."), abies(2).with_authorship("Miller")])
            .unwrap();

        let hit = lookup
            .match_usage("Abies alba", Some("Miller"), None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(2));
    }

    #[test]
    fn test_different_authors_are_filtered() {
        let mut lookup = IdLookup::temporary();
        lookup.load(vec![abies(1).with_authorship("Mill."), abies(2)]).unwrap();

        let hit = lookup
            .match_usage("Abies alba", Some("Linnaeus"), None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(2));
    }

    #[test]
    fn test_ambiguity_policy() {
        let mut lookup = IdLookup::temporary();
        lookup.load(vec![abies(7), abies(3), abies(5)]).unwrap();

        let hit = lookup
            .match_usage("Abies alba", None, None, Rank::Species, Kingdom::Plantae)
            .unwrap();
        assert_eq!(hit.map(|u| u.key), Some(3));

        // unspecific rank or kingdom never picks the lowest key
        assert!(lookup
            .match_usage("Abies alba", None, None, Rank::Unranked, Kingdom::Plantae)
            .unwrap()
            .is_none());
        assert!(lookup
            .match_usage("Abies alba", None, None, Rank::Species, Kingdom::IncertaeSedis)
            .unwrap()
            .is_none());

        let lookup = lookup.with_policy(AmbiguityPolicy::Unresolved);
        assert!(lookup
            .match_usage("Abies alba", None, None, Rank::Species, Kingdom::Plantae)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rank_and_kingdom_wildcards() {
        let mut lookup = IdLookup::temporary();
        lookup
            .load(vec![
                LookupUsage::new(1, "Abies alba alba", Rank::Subspecies, Kingdom::Plantae),
                LookupUsage::new(2, "Abies alba alba", Rank::Variety, Kingdom::Animalia),
            ])
            .unwrap();

        let hit = |rank, kingdom| {
            lookup
                .match_usage("Abies alba alba", None, None, rank, kingdom)
                .unwrap()
                .map(|u| u.key)
        };
        assert_eq!(hit(Rank::InfrasubspecificName, Kingdom::IncertaeSedis), Some(2));
        assert_eq!(hit(Rank::InfraspecificName, Kingdom::Plantae), Some(1));
        assert_eq!(hit(Rank::Unranked, Kingdom::Animalia), Some(2));
        assert_eq!(hit(Rank::Species, Kingdom::Plantae), None);
        assert_eq!(hit(Rank::Form, Kingdom::IncertaeSedis), None);
    }

    #[test]
    fn test_blank_names_are_skipped() {
        let mut lookup = IdLookup::temporary();
        assert!(!lookup.add(LookupUsage::new(1, "  ", Rank::Genus, Kingdom::Plantae)).unwrap());
        assert_eq!(lookup.size(), 0);
        assert!(lookup.match_canonical("").unwrap().is_empty());
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    #[test]
    fn test_reopen_restores_counters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lookup.db");
        {
            let mut lookup = IdLookup::persistent(&path).unwrap();
            lookup
                .load(vec![abies(4), abies(9).deleted(), LookupUsage::new(2, "Abies", Rank::Genus, Kingdom::Plantae)])
                .unwrap();
        }

        let lookup = IdLookup::persistent(&path).unwrap();
        assert_eq!(lookup.size(), 3);
        assert_eq!(lookup.deleted_count(), 1);
        assert_eq!(lookup.key_max(), 9);
        assert_eq!(lookup.match_canonical("Abies alba").unwrap().len(), 2);
        let mut keys: Vec<i64> = lookup.iter().unwrap().map(|u| u.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![2, 4, 9]);
    }

    #[test]
    fn test_from_config() {
        let cfg = LookupConfig {
            file: None,
            policy: AmbiguityPolicy::Unresolved,
        };
        let lookup = IdLookup::from_config(&cfg).unwrap();
        assert_eq!(lookup.policy(), AmbiguityPolicy::Unresolved);
        assert_eq!(lookup.size(), 0);
    }
}
