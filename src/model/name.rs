//! Structured scientific names as returned by a name parser

use super::vocab::{NameType, Rank};
use serde::{Deserialize, Serialize};

/// A scientific name split into its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    /// The name string the components were parsed from
    pub scientific_name: String,
    pub genus_or_above: Option<String>,
    pub infra_generic: Option<String>,
    pub specific_epithet: Option<String>,
    pub infra_specific_epithet: Option<String>,
    pub rank: Option<Rank>,
    pub authorship: Option<String>,
    pub year: Option<String>,
    pub bracket_authorship: Option<String>,
    pub bracket_year: Option<String>,
    /// Nomenclatural status note found in the name, e.g. `nom. illeg.`
    pub nom_status: Option<String>,
    pub name_type: NameType,
}

impl ParsedName {
    pub fn new(scientific_name: impl Into<String>, name_type: NameType) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            genus_or_above: None,
            infra_generic: None,
            specific_epithet: None,
            infra_specific_epithet: None,
            rank: None,
            authorship: None,
            year: None,
            bracket_authorship: None,
            bracket_year: None,
            nom_status: None,
            name_type,
        }
    }

    /// A scientific name built from atomized parts
    pub fn from_parts(
        genus: impl Into<String>,
        specific_epithet: Option<String>,
        infra_specific_epithet: Option<String>,
        rank: Option<Rank>,
    ) -> Self {
        let mut pn = Self::new("", NameType::Scientific);
        pn.genus_or_above = Some(genus.into());
        pn.specific_epithet = specific_epithet;
        pn.infra_specific_epithet = infra_specific_epithet;
        pn.rank = rank;
        pn.scientific_name = pn.full_name();
        pn
    }

    pub fn with_authorship(mut self, authorship: Option<String>, year: Option<String>) -> Self {
        self.authorship = authorship;
        self.year = year;
        self
    }

    pub fn is_binomial(&self) -> bool {
        self.genus_or_above.is_some() && self.specific_epithet.is_some()
    }

    pub fn has_authorship(&self) -> bool {
        self.authorship.is_some()
            || self.year.is_some()
            || self.bracket_authorship.is_some()
            || self.bracket_year.is_some()
    }

    /// The name without authorship or rank markers.
    pub fn canonical_name(&self) -> Option<String> {
        let genus = self.genus_or_above.as_deref();
        match (&self.specific_epithet, &self.infra_generic) {
            (Some(epithet), _) => {
                let mut name = format!("{} {}", genus?, epithet);
                if let Some(infra) = &self.infra_specific_epithet {
                    name.push(' ');
                    name.push_str(infra);
                }
                Some(name)
            }
            (None, Some(infra_generic)) => Some(infra_generic.clone()),
            (None, None) => genus.map(str::to_string),
        }
    }

    /// Canonical name with rank marker for infraspecific names.
    pub fn canonical_name_with_marker(&self) -> Option<String> {
        let mut name = String::new();
        name.push_str(self.genus_or_above.as_deref()?);
        if let Some(infra_generic) = &self.infra_generic {
            name.push_str(&format!(" ({})", infra_generic));
        }
        if let Some(epithet) = &self.specific_epithet {
            name.push(' ');
            name.push_str(epithet);
            if let Some(infra) = &self.infra_specific_epithet {
                if let Some(marker) = self.rank.filter(|r| r.is_infraspecific()).and_then(Rank::marker) {
                    name.push(' ');
                    name.push_str(marker);
                }
                name.push(' ');
                name.push_str(infra);
            }
        } else if self.rank == Some(Rank::Species) && self.name_type == NameType::Informal {
            name.push_str(" sp.");
        }
        Some(name)
    }

    /// Bracket and combination authorship, e.g. `(L., 1753) Mill., 1768`.
    pub fn authorship_complete(&self) -> Option<String> {
        let combination = join_author_year(self.authorship.as_deref(), self.year.as_deref());
        let basionym = join_author_year(self.bracket_authorship.as_deref(), self.bracket_year.as_deref());
        match (basionym, combination) {
            (Some(b), Some(c)) => Some(format!("({}) {}", b, c)),
            (Some(b), None) => Some(format!("({})", b)),
            (None, Some(c)) => Some(c),
            (None, None) => None,
        }
    }

    /// The full rendering of the name, falling back to the raw string when
    /// the name has no genus.
    pub fn full_name(&self) -> String {
        match self.canonical_name_with_marker() {
            Some(mut name) => {
                if let Some(author) = self.authorship_complete() {
                    name.push(' ');
                    name.push_str(&author);
                }
                name
            }
            None => self.scientific_name.clone(),
        }
    }
}

fn join_author_year(author: Option<&str>, year: Option<&str>) -> Option<String> {
    match (author, year) {
        (Some(a), Some(y)) => Some(format!("{}, {}", a, y)),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(y)) => Some(y.to_string()),
        (None, None) => None,
    }
}
