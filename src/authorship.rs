//! Author and year comparison of scientific names

use crate::model::{Equality, ParsedName};
use crate::parsers::SciNameNormalizer;

/// Compares authorships leniently: abbreviations (`L.` and `Linnaeus`,
/// `Mill.` and `Miller`), initials, `ex` authors and ordering noise are
/// tolerated, years must match exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorComparator;

impl AuthorComparator {
    pub fn compare(
        &self,
        author1: Option<&str>,
        year1: Option<&str>,
        author2: Option<&str>,
        year2: Option<&str>,
    ) -> Equality {
        let years = compare_years(year1, year2);
        let a1 = author1.map(surnames).filter(|a| !a.is_empty());
        let a2 = author2.map(surnames).filter(|a| !a.is_empty());
        match (a1, a2) {
            (Some(a1), Some(a2)) => compare_surnames(&a1, &a2).and(years),
            _ => years,
        }
    }

    /// Compares the combination authorship, falling back to the bracket
    /// authorship when the combination authors cannot be compared.
    pub fn compare_names(&self, n1: &ParsedName, n2: &ParsedName) -> Equality {
        let combination = self.compare(
            n1.authorship.as_deref(),
            n1.year.as_deref(),
            n2.authorship.as_deref(),
            n2.year.as_deref(),
        );
        if combination != Equality::Unknown {
            return combination;
        }
        self.compare(
            n1.bracket_authorship.as_deref(),
            n1.bracket_year.as_deref(),
            n2.bracket_authorship.as_deref(),
            n2.bracket_year.as_deref(),
        )
    }
}

fn compare_years(y1: Option<&str>, y2: Option<&str>) -> Equality {
    match (y1.map(str::trim), y2.map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            if a == b {
                Equality::Equal
            } else {
                Equality::Different
            }
        }
        _ => Equality::Unknown,
    }
}

/// Normalized surnames of an author team, in order.
fn surnames(authorship: &str) -> Vec<String> {
    let folded = SciNameNormalizer::normalize(authorship).to_lowercase();
    // only the publishing author counts for `A ex B`
    let publishing = folded.rsplit(" ex ").next().unwrap_or(&folded);
    let team = publishing
        .replace(" et al.", "")
        .replace(" et al", "")
        .replace('&', ",")
        .replace(" et ", ",")
        .replace(" and ", ",");
    team.split(',')
        .filter_map(|author| {
            let tokens: Vec<String> = author
                .split(|c: char| c.is_whitespace() || c == '.')
                .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.len() > 1 {
                // drop initials, keep the surname
                tokens
                    .iter()
                    .rev()
                    .find(|t| t.chars().count() > 2)
                    .or_else(|| tokens.last())
                    .cloned()
            } else {
                tokens.into_iter().next()
            }
        })
        .collect()
}

fn compare_surnames(a1: &[String], a2: &[String]) -> Equality {
    if a1 == a2 {
        return Equality::Equal;
    }
    match (a1.first(), a2.first()) {
        (Some(s1), Some(s2)) if s1.starts_with(s2.as_str()) || s2.starts_with(s1.as_str()) => Equality::Equal,
        _ => Equality::Different,
    }
}
