//! Relation setup: accepted, parent and basionym references become edges

use super::metadata::InsertMetadata;
use super::{node_by_name, NameRef, Placeholder};
use crate::model::{NameUsage, NameUsageIssue, Origin, TaxonomicStatus, Term, VerbatimUsage, INCERTAE_SEDIS};
use crate::storage::{Label, NodeId, NodeProperty, RelType, StorageResult, UsageDao};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Delimiters tried in order when a multi-value id list has no declared
/// delimiter.
const COMMON_DELIMITERS: [char; 5] = ['[', '|', ';', ',', ' '];

/// Splits a value by the first common delimiter that yields two or more
/// parts, otherwise returns the value alone.
pub fn split_by_common_delimiters(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    for delimiter in COMMON_DELIMITERS {
        let parts: Vec<String> = value
            .split(delimiter)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if parts.len() > 1 {
            return parts;
        }
    }
    vec![value.to_string()]
}

/// Outcome of resolving a taxonID reference
enum IdRef {
    Found(NodeId),
    /// A placeholder created earlier for the same missing id
    Placeholder(NodeId),
    Missing,
}

pub(super) struct RelationResolver<'a> {
    dao: &'a UsageDao,
    meta: &'a InsertMetadata,
    missing_ids: HashSet<String>,
}

impl<'a> RelationResolver<'a> {
    pub(super) fn new(dao: &'a UsageDao, meta: &'a InsertMetadata) -> Self {
        Self {
            dao,
            meta,
            missing_ids: HashSet::new(),
        }
    }

    /// Visits every node by ascending id, including the placeholders
    /// created on the way.
    pub(super) fn run(&mut self) -> StorageResult<usize> {
        info!("Start processing explicit relations");
        let mut cursor = self.dao.cursor()?;
        let mut last = None;
        loop {
            let page = self.dao.graph().node_ids_after(last, self.dao.batch_size())?;
            if page.is_empty() {
                break;
            }
            for node in page {
                self.setup_relations(node)?;
                last = Some(node);
                if cursor.tick()? {
                    debug!(nodes = cursor.processed(), "Processed relations");
                }
            }
        }
        let processed = cursor.finish()?;
        info!(nodes = processed, placeholders = self.missing_ids.len(), "Relation setup completed");
        Ok(processed)
    }

    fn setup_relations(&mut self, node: NodeId) -> StorageResult<()> {
        let Some(mut usage) = self.dao.read_usage(node, false)? else {
            return Ok(());
        };
        let verbatim = self.dao.read_verbatim(node)?;
        self.setup_accepted(node, &mut usage, verbatim.as_ref())?;
        self.setup_parent(node, &mut usage, verbatim.as_ref())?;
        self.setup_basionym(node, &mut usage, verbatim.as_ref())?;
        self.dao.store_usage(node, &usage)
    }

    fn resolve_id(&self, id: &str) -> StorageResult<IdRef> {
        Ok(match self.dao.graph().find_unique(NodeProperty::TaxonId, id)? {
            Some(node) if self.missing_ids.contains(id) => IdRef::Placeholder(node),
            Some(node) => IdRef::Found(node),
            None => IdRef::Missing,
        })
    }

    /// Accepted ids of a usage, split into pro parte targets where needed.
    fn accepted_ids(&self, usage: &NameUsage, v: &VerbatimUsage) -> StorageResult<Vec<String>> {
        let Some(unsplit) = v.core_field(Term::AcceptedNameUsageId) else {
            return Ok(Vec::new());
        };
        if usage.taxon_id.as_deref() == Some(unsplit) {
            return Ok(Vec::new());
        }
        if let Some(ids) = self.meta.split(Term::AcceptedNameUsageId, unsplit) {
            return Ok(ids);
        }
        if self.dao.graph().find_unique(NodeProperty::TaxonId, unsplit)?.is_some() {
            return Ok(vec![unsplit.to_string()]);
        }
        Ok(split_by_common_delimiters(unsplit))
    }

    fn setup_accepted(&mut self, node: NodeId, usage: &mut NameUsage, v: Option<&VerbatimUsage>) -> StorageResult<()> {
        let mut accepted = None;
        if let Some(v) = v.filter(|_| self.meta.accepted_name_mapped) {
            let ids = self.accepted_ids(usage, v)?;
            if let Some((first, others)) = ids.split_first() {
                accepted = Some(match self.resolve_id(first)? {
                    IdRef::Found(a) => a,
                    IdRef::Placeholder(a) => {
                        usage.add_issue(NameUsageIssue::AcceptedNameUsageIdInvalid);
                        a
                    }
                    IdRef::Missing => {
                        usage.add_issue(NameUsageIssue::AcceptedNameUsageIdInvalid);
                        debug!(id = %first, "acceptedNameUsageID not existing");
                        let name = v.core_field(Term::AcceptedNameUsage).unwrap_or(INCERTAE_SEDIS);
                        let remark = format!(
                            "Placeholder for the missing accepted taxonID for synonym {}",
                            usage.display_name()
                        );
                        let a = Placeholder::new(Origin::MissingAccepted, name, TaxonomicStatus::Doubtful)
                            .rank(usage.rank)
                            .taxon_id(first)
                            .remarks(remark)
                            .create_with_classification(self.dao, usage, v)?;
                        self.missing_ids.insert(first.clone());
                        a
                    }
                });
                for id in others {
                    match self.resolve_id(id)? {
                        IdRef::Found(a) if a != node => {
                            self.dao.add_edge(node, a, RelType::ProparteSynonymOf)?;
                        }
                        IdRef::Found(_) => {}
                        IdRef::Placeholder(_) | IdRef::Missing => {
                            usage.add_issue(NameUsageIssue::AcceptedNameUsageIdInvalid);
                            debug!(id = %id, "Pro parte acceptedNameUsageID not existing");
                        }
                    }
                }
            } else if let Some(name) = v
                .core_field(Term::AcceptedNameUsage)
                .filter(|n| usage.scientific_name.as_deref() != Some(*n))
            {
                let placeholder = Placeholder::new(Origin::VerbatimAccepted, name, TaxonomicStatus::Doubtful);
                accepted = match node_by_name(self.dao, name, usage)? {
                    NameRef::Found(a) => Some(a),
                    NameRef::Own => None,
                    NameRef::Missing => {
                        debug!(name, "acceptedNameUsage not existing, materialize it");
                        Some(placeholder.create_with_classification(self.dao, usage, v)?)
                    }
                    NameRef::NotUnique => {
                        usage.add_issue(NameUsageIssue::AcceptedNameNotUnique);
                        warn!(
                            name,
                            synonym = usage.display_name(),
                            taxon_id = usage.taxon_id.as_deref().unwrap_or(""),
                            "acceptedNameUsage not unique"
                        );
                        Some(placeholder.create_with_classification(self.dao, usage, v)?)
                    }
                };
            }
        }

        let mut accepted = accepted.filter(|a| *a != node);
        // a synonym without any accepted reference gets an incertae sedis placeholder
        if usage.synonym && accepted.is_none() {
            usage.add_issue(NameUsageIssue::AcceptedNameMissing);
            let remark = format!("Placeholder for the missing accepted taxon for synonym {}", usage.display_name());
            let placeholder = Placeholder::new(Origin::MissingAccepted, INCERTAE_SEDIS, TaxonomicStatus::Doubtful)
                .rank(usage.rank)
                .remarks(remark);
            accepted = Some(match v {
                Some(v) => placeholder.create_with_classification(self.dao, usage, v)?,
                None => placeholder.create(self.dao, true)?,
            });
        }

        if let Some(accepted) = accepted {
            if !usage.synonym {
                usage.set_status(TaxonomicStatus::Synonym);
            }
            self.dao.add_edge(node, accepted, RelType::SynonymOf)?;
        }
        Ok(())
    }

    fn setup_parent(&mut self, node: NodeId, usage: &mut NameUsage, v: Option<&VerbatimUsage>) -> StorageResult<()> {
        let mut parent = None;
        if let Some(v) = v {
            if let Some(id) = v.core_field(Term::ParentNameUsageId) {
                if usage.taxon_id.as_deref() != Some(id) {
                    parent = Some(match self.resolve_id(id)? {
                        IdRef::Found(p) => p,
                        IdRef::Placeholder(p) => {
                            usage.add_issue(NameUsageIssue::ParentNameUsageIdInvalid);
                            p
                        }
                        IdRef::Missing => {
                            usage.add_issue(NameUsageIssue::ParentNameUsageIdInvalid);
                            debug!(id, "parentNameUsageID not existing");
                            let name = v.core_field(Term::ParentNameUsage).unwrap_or(INCERTAE_SEDIS);
                            let p = Placeholder::new(Origin::VerbatimParent, name, TaxonomicStatus::Doubtful)
                                .taxon_id(id)
                                .remarks(format!("Placeholder for the missing parentNameUsageID {id}"))
                                .create(self.dao, true)?;
                            self.missing_ids.insert(id.to_string());
                            p
                        }
                    });
                }
            } else if let Some(name) = v
                .core_field(Term::ParentNameUsage)
                .filter(|n| usage.scientific_name.as_deref() != Some(*n))
            {
                let placeholder = Placeholder::new(Origin::VerbatimParent, name, TaxonomicStatus::Doubtful);
                parent = match node_by_name(self.dao, name, usage)? {
                    NameRef::Found(p) => Some(p),
                    NameRef::Own => None,
                    NameRef::Missing => {
                        debug!(name, "parentNameUsage not existing, materialize it");
                        Some(placeholder.create(self.dao, true)?)
                    }
                    NameRef::NotUnique => {
                        usage.add_issue(NameUsageIssue::ParentNameNotUnique);
                        warn!(
                            name,
                            usage = usage.display_name(),
                            taxon_id = usage.taxon_id.as_deref().unwrap_or(""),
                            "parentNameUsage not unique"
                        );
                        Some(placeholder.create(self.dao, true)?)
                    }
                };
            }
        }

        match parent.filter(|p| *p != node) {
            Some(parent) => {
                self.dao.add_edge(parent, node, RelType::ParentOf)?;
            }
            None if !usage.synonym => self.dao.graph().add_label(node, Label::Root)?,
            None => {}
        }
        Ok(())
    }

    fn setup_basionym(&mut self, node: NodeId, usage: &mut NameUsage, v: Option<&VerbatimUsage>) -> StorageResult<()> {
        let Some(v) = v.filter(|_| self.meta.original_name_mapped) else {
            return Ok(());
        };
        let mut basionym = None;
        if let Some(id) = v.core_field(Term::OriginalNameUsageId) {
            if usage.taxon_id.as_deref() != Some(id) {
                basionym = match self.resolve_id(id)? {
                    IdRef::Found(b) | IdRef::Placeholder(b) => Some(b),
                    IdRef::Missing => {
                        usage.add_issue(NameUsageIssue::OriginalNameUsageIdInvalid);
                        debug!(id, "originalNameUsageID not existing");
                        None
                    }
                };
            }
        } else if let Some(name) = v
            .core_field(Term::OriginalNameUsage)
            .filter(|n| usage.scientific_name.as_deref() != Some(*n))
        {
            let placeholder = Placeholder::new(Origin::VerbatimBasionym, name, TaxonomicStatus::Doubtful);
            basionym = match node_by_name(self.dao, name, usage)? {
                NameRef::Found(b) => Some(b),
                NameRef::Own => None,
                NameRef::Missing => {
                    debug!(name, "originalNameUsage not existing, materialize it");
                    Some(placeholder.create(self.dao, true)?)
                }
                NameRef::NotUnique => {
                    usage.add_issue(NameUsageIssue::OriginalNameNotUnique);
                    warn!(
                        name,
                        taxon_id = usage.taxon_id.as_deref().unwrap_or(""),
                        "originalNameUsage not unique"
                    );
                    Some(placeholder.create(self.dao, true)?)
                }
            };
        }
        if let Some(basionym) = basionym.filter(|b| *b != node) {
            self.dao.add_edge(basionym, node, RelType::BasionymOf)?;
        }
        Ok(())
    }
}
