use super::{MatchError, MatchResult, NubDb, NubMatch};
use crate::model::{Equality, Kingdom, NameUsageIssue, NubUsage, Rank, SrcUsage};
use crate::parsers::{ParseResult, TermParser};
use crate::storage::StorageResult;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

impl NubDb {
    /// Finds the backbone usage representing a source usage.
    ///
    /// Candidates share the canonical name and rank, and neither their
    /// authorship nor their kingdom contradicts the source usage. Ties are
    /// resolved in this order: a single candidate; the only candidate with
    /// authorship; no match for accepted usages competing only with usages
    /// of the current source; a snap to the first candidate when all share
    /// one parent; finally the first accepted candidate flagged HOMONYM.
    pub fn find_match(
        &self,
        current_source: &Uuid,
        u: &SrcUsage,
        kingdom: Option<Kingdom>,
        current_parent: Option<&NubUsage>,
    ) -> MatchResult<NubMatch> {
        let name = u.canonical_name();
        let mut checked = Vec::new();
        let mut anonymous = 0;
        for candidate in self.find_nub_usages(&name)? {
            if self.matches_nub(u, kingdom, &candidate, current_parent)? {
                if !candidate.parsed_name.has_authorship() {
                    anonymous += 1;
                }
                checked.push(candidate);
            }
        }

        match checked.len() {
            0 => return Ok(self.match_kingdom(u)),
            1 => return Ok(checked.pop().map_or(NubMatch::Empty, NubMatch::Matched)),
            n if n - anonymous == 1 => {
                if let Some(authored) = checked.into_iter().find(|c| c.parsed_name.has_authorship()) {
                    return Ok(NubMatch::Matched(authored));
                }
                return Ok(NubMatch::Empty);
            }
            _ => {}
        }

        if u.status.is_accepted() {
            let sources: HashSet<Option<Uuid>> = checked.iter().map(|c| c.dataset_key).collect();
            if sources.len() == 1 && sources.contains(&Some(*current_source)) {
                debug!(
                    candidates = checked.len(),
                    name = %u.scientific_name,
                    "Homonyms only from the current source"
                );
                return Ok(NubMatch::Empty);
            }
        }

        if self.share_parent(&checked)? {
            let usage = checked.swap_remove(0);
            return Ok(NubMatch::Ambiguous { usage, homonym: false });
        }

        let candidates = checked.len();
        match checked.into_iter().find(|c| c.status.is_accepted()) {
            Some(mut usage) => {
                usage.issues.insert(NameUsageIssue::Homonym);
                usage.add_remark(format!("Homonym known in other sources: {}", u.scientific_name));
                warn!(
                    candidates,
                    name = %u.scientific_name,
                    source = %current_source,
                    "Ambiguous homonyms encountered"
                );
                Ok(NubMatch::Ambiguous { usage, homonym: true })
            }
            None => Err(MatchError::Homonym {
                name: u.scientific_name.clone(),
            }),
        }
    }

    /// Matches names above phylum to a kingdom by name alone.
    fn match_kingdom(&self, u: &SrcUsage) -> NubMatch {
        if !u.rank.higher_than(Rank::Phylum) {
            return NubMatch::Empty;
        }
        match self.kingdom_parser.parse(&u.scientific_name) {
            ParseResult::Success(k) => match self.kingdoms.get(&k) {
                Some(usage) => NubMatch::Ambiguous {
                    usage: usage.clone(),
                    homonym: false,
                },
                None => NubMatch::Empty,
            },
            ParseResult::Failure => NubMatch::Empty,
        }
    }

    /// True if all candidates hang off the same parent or accepted node.
    fn share_parent(&self, candidates: &[NubUsage]) -> StorageResult<bool> {
        let mut parent = None;
        for (i, c) in candidates.iter().enumerate() {
            let Some(node) = c.node else {
                return Ok(false);
            };
            let p = self.parent_of(node)?;
            if p.is_none() || (i > 0 && p != parent) {
                return Ok(false);
            }
            parent = p;
        }
        Ok(parent.is_some())
    }

    fn matches_nub(
        &self,
        u: &SrcUsage,
        kingdom: Option<Kingdom>,
        candidate: &NubUsage,
        current_parent: Option<&NubUsage>,
    ) -> StorageResult<bool> {
        if u.rank != candidate.rank {
            return Ok(false);
        }
        // no homonyms above genus
        if u.rank.is_suprageneric() {
            return Ok(true);
        }
        let author = self.authors.compare_names(&u.parsed_name, &candidate.parsed_name);
        if author == Equality::Different || compare_kingdom(kingdom, candidate.kingdom) == Equality::Different {
            return Ok(false);
        }
        match author {
            Equality::Equal => Ok(true),
            _ if u.rank.is_species_or_below() => Ok(true),
            // without authors the classification must not contradict
            _ => match (current_parent.and_then(|p| p.node), candidate.node) {
                (Some(parent), Some(node)) => self.exists_in_classification(node, parent),
                _ => Ok(true),
            },
        }
    }
}

fn compare_kingdom(kingdom: Option<Kingdom>, other: Kingdom) -> Equality {
    let Some(kingdom) = kingdom else {
        return Equality::Unknown;
    };
    match (kingdom.nub_bucket(), other.nub_bucket()) {
        (Kingdom::IncertaeSedis, _) | (_, Kingdom::IncertaeSedis) => Equality::Unknown,
        (a, b) if a == b => Equality::Equal,
        _ => Equality::Different,
    }
}
