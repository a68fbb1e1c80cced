//! Scientific name parsing

use super::terms::{RankParser, TermParser};
use crate::model::{NameType, ParsedName, Rank};
use regex_lite::Regex;
use thiserror::Error;

/// A name that could be classified but not split into components
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparsable {name_type:?} name: {name}")]
pub struct UnparsableName {
    pub name_type: NameType,
    pub name: String,
}

impl UnparsableName {
    fn new(name_type: NameType, name: &str) -> Self {
        Self {
            name_type,
            name: name.to_string(),
        }
    }
}

/// Splits scientific names into their components
pub trait NameParser: Send + Sync {
    fn parse(&self, name: &str, rank: Option<Rank>) -> Result<ParsedName, UnparsableName>;

    /// The canonical name, or `None` if the name cannot be parsed.
    fn parse_to_canonical(&self, name: &str, rank: Option<Rank>) -> Option<String> {
        self.parse(name, rank).ok().and_then(|pn| pn.canonical_name())
    }
}

const AUTHOR_PARTICLES: &[&str] = &[
    "de", "van", "von", "der", "den", "du", "da", "la", "le", "del", "della", "ex", "et", "in", "non", "sensu",
    "auct", "hort",
];

/// Name parser for botanical and zoological names of the usual shapes:
/// uninomials, binomials and trinomials with or without rank markers,
/// infrageneric names in brackets, bracket authorship and years.
///
/// Virus names, hybrid formulas and placeholders are reported as unparsable
/// with their name type.
#[derive(Debug, Clone)]
pub struct BasicNameParser {
    virus: Regex,
    placeholder: Regex,
    hybrid_formula: Regex,
    nom_status: Regex,
    sensu: Regex,
    author_year: Regex,
}

impl BasicNameParser {
    pub fn new() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            virus: Regex::new(r"(?i)\b(virus|viruses|phage|phages|viroid|viroids)\b")?,
            placeholder: Regex::new(
                r"(?i)^(incertae\s+sedis|unknown|unassigned|not\s+assigned|unidentified|undetermined)(\s|$)",
            )?,
            hybrid_formula: Regex::new(r"\s[×xX]\s")?,
            nom_status: Regex::new(
                r"(?i)[,\s]+(nom\.?\s*(illeg|inval|nud|cons|rej|dub|superfl)\.?|nomen\s+(nudum|dubium|oblitum))\s*$",
            )?,
            sensu: Regex::new(r"(?i)\s+(sensu|auct\.|non)\s.*$")?,
            author_year: Regex::new(r"^(.*?)[,\s]*\(?(\d{4})[a-z]?\)?$")?,
        })
    }

    fn split_author_year(&self, part: &str) -> (Option<String>, Option<String>) {
        let part = part.trim().trim_end_matches(',').trim();
        if part.is_empty() {
            return (None, None);
        }
        match self.author_year.captures(part) {
            Some(caps) => {
                let author = caps.get(1).map(|m| m.as_str().trim().trim_end_matches(',').trim());
                let year = caps.get(2).map(|m| m.as_str().to_string());
                (author.filter(|a| !a.is_empty()).map(str::to_string), year)
            }
            None => (Some(part.to_string()), None),
        }
    }

    fn parse_authorship(&self, pn: &mut ParsedName, authorship: &str) {
        let authorship = authorship.trim();
        if authorship.is_empty() {
            return;
        }
        let combination = if let Some(inner) = authorship.strip_prefix('(') {
            match inner.find(')') {
                Some(end) => {
                    let (author, year) = self.split_author_year(&inner[..end]);
                    pn.bracket_authorship = author;
                    pn.bracket_year = year;
                    &inner[end + 1..]
                }
                None => inner,
            }
        } else {
            authorship
        };
        let (author, year) = self.split_author_year(combination);
        pn.authorship = author;
        pn.year = year;
    }
}

fn is_monomial(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_uppercase() => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    !rest.is_empty() && rest.iter().all(|c| c.is_lowercase() || *c == '-')
}

fn is_epithet(token: &str) -> bool {
    token.chars().count() >= 2
        && token.chars().all(|c| c.is_lowercase() || c == '-')
        && !AUTHOR_PARTICLES.contains(&token)
}

/// Rank markers that introduce an infraspecific or infrageneric epithet.
fn marker_rank(token: &str) -> Option<Rank> {
    let token = token.strip_prefix("notho").unwrap_or(token);
    if !token.ends_with('.') && !matches!(token, "forma" | "subsp" | "ssp" | "var" | "f" | "cv") {
        return None;
    }
    RankParser
        .parse(token)
        .into_option()
        .filter(|r| r.is_infraspecific() || matches!(r, Rank::Subgenus | Rank::Section | Rank::Series))
}

impl NameParser for BasicNameParser {
    fn parse(&self, name: &str, rank: Option<Rank>) -> Result<ParsedName, UnparsableName> {
        let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.chars().any(char::is_alphabetic) {
            return Err(UnparsableName::new(NameType::NoName, name));
        }
        if self.virus.is_match(&cleaned) {
            return Err(UnparsableName::new(NameType::Virus, name));
        }
        if self.placeholder.is_match(&cleaned) {
            return Err(UnparsableName::new(NameType::Placeholder, name));
        }
        if self.hybrid_formula.is_match(&cleaned) {
            return Err(UnparsableName::new(NameType::Hybrid, name));
        }

        let mut pn = ParsedName::new(cleaned.clone(), NameType::Scientific);
        let mut rest = cleaned.trim_start_matches('×').trim_start().to_string();
        let nom_status = self
            .nom_status
            .captures(&rest)
            .and_then(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str().to_string())));
        if let Some((start, status)) = nom_status {
            pn.nom_status = Some(status);
            rest.truncate(start);
        }
        if let Some(start) = self.sensu.find(&rest).map(|m| m.start()) {
            rest.truncate(start);
        }

        let mut tokens: Vec<&str> = rest.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.first() == Some(&"Candidatus") {
            pn.name_type = NameType::Candidatus;
            tokens.remove(0);
        }
        let Some(first) = tokens.first() else {
            return Err(UnparsableName::new(NameType::NoName, name));
        };
        if !is_monomial(first) {
            return Err(UnparsableName::new(NameType::Doubtful, name));
        }
        pn.genus_or_above = Some(first.to_string());
        let mut idx = 1;
        let mut inferred: Option<Rank> = None;

        // infrageneric name in brackets, only when followed by an epithet or nothing
        if let Some(tok) = tokens.get(idx) {
            if let Some(inner) = tok.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
                let next_is_epithet = tokens.get(idx + 1).map_or(true, |t| is_epithet(t));
                if is_monomial(inner) && next_is_epithet {
                    pn.infra_generic = Some(inner.to_string());
                    inferred = Some(Rank::InfragenericName);
                    idx += 1;
                }
            }
        }
        // infrageneric name with marker, e.g. `Abies sect. Pseudabies`
        if pn.infra_generic.is_none() {
            if let (Some(marker), Some(next)) = (tokens.get(idx), tokens.get(idx + 1)) {
                if let Some(r) = marker_rank(marker).filter(|r| !r.is_infraspecific()) {
                    if is_monomial(next) {
                        pn.infra_generic = Some(next.to_string());
                        inferred = Some(r);
                        idx += 2;
                    }
                }
            }
        }

        match tokens.get(idx) {
            Some(&"sp.") | Some(&"spec.") | Some(&"sp") => {
                pn.name_type = NameType::Informal;
                pn.rank = Some(rank.unwrap_or(Rank::Species));
                return Ok(pn);
            }
            Some(tok) if is_epithet(tok) => {
                pn.specific_epithet = Some(tok.to_string());
                inferred = Some(Rank::Species);
                idx += 1;
                if let (Some(marker), Some(next)) = (tokens.get(idx), tokens.get(idx + 1)) {
                    if let Some(r) = marker_rank(marker).filter(|r| r.is_infraspecific()) {
                        if is_epithet(next) {
                            pn.infra_specific_epithet = Some(next.to_string());
                            inferred = Some(r);
                            idx += 2;
                        }
                    }
                }
                if pn.infra_specific_epithet.is_none() {
                    if let Some(tok) = tokens.get(idx).filter(|t| is_epithet(t)) {
                        pn.infra_specific_epithet = Some(tok.to_string());
                        inferred = Some(Rank::InfraspecificName);
                        idx += 1;
                    }
                }
            }
            _ => {}
        }

        pn.rank = rank.or(inferred);
        let authorship = tokens[idx.min(tokens.len())..].join(" ");
        self.parse_authorship(&mut pn, &authorship);
        Ok(pn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> BasicNameParser {
        BasicNameParser::new().unwrap()
    }

    #[test]
    fn test_binomial_with_author() {
        let pn = parser().parse("Abies alba Mill.", None).unwrap();
        assert_eq!(pn.genus_or_above.as_deref(), Some("Abies"));
        assert_eq!(pn.specific_epithet.as_deref(), Some("alba"));
        assert_eq!(pn.authorship.as_deref(), Some("Mill."));
        assert_eq!(pn.rank, Some(Rank::Species));
        assert_eq!(pn.canonical_name().as_deref(), Some("Abies alba"));
    }

    #[test]
    fn test_bracket_authorship_and_year() {
        let pn = parser().parse("Puma concolor (Linnaeus, 1771)", None).unwrap();
        assert_eq!(pn.bracket_authorship.as_deref(), Some("Linnaeus"));
        assert_eq!(pn.bracket_year.as_deref(), Some("1771"));
        assert_eq!(pn.authorship, None);

        let pn = parser().parse("Abies alba Mill., 1768", None).unwrap();
        assert_eq!(pn.authorship.as_deref(), Some("Mill."));
        assert_eq!(pn.year.as_deref(), Some("1768"));
    }

    #[test]
    fn test_trinomials() {
        let pn = parser().parse("Abies alba var. acutifolia L.", None).unwrap();
        assert_eq!(pn.infra_specific_epithet.as_deref(), Some("acutifolia"));
        assert_eq!(pn.rank, Some(Rank::Variety));
        assert_eq!(pn.authorship.as_deref(), Some("L."));

        let pn = parser().parse("Felis silvestris lybica", None).unwrap();
        assert_eq!(pn.rank, Some(Rank::InfraspecificName));
        assert_eq!(pn.canonical_name().as_deref(), Some("Felis silvestris lybica"));
    }

    #[test]
    fn test_uninomial_and_given_rank() {
        let pn = parser().parse("Pinaceae", Some(Rank::Family)).unwrap();
        assert_eq!(pn.canonical_name().as_deref(), Some("Pinaceae"));
        assert_eq!(pn.rank, Some(Rank::Family));
        assert!(!pn.has_authorship());

        let pn = parser().parse("Abies Mill.", None).unwrap();
        assert_eq!(pn.rank, None);
        assert_eq!(pn.authorship.as_deref(), Some("Mill."));
    }

    #[test]
    fn test_infrageneric() {
        let pn = parser().parse("Abies (Pseudabies) alba", None).unwrap();
        assert_eq!(pn.infra_generic.as_deref(), Some("Pseudabies"));
        assert_eq!(pn.canonical_name().as_deref(), Some("Abies alba"));
    }

    #[test]
    fn test_nom_status_is_split_off() {
        let pn = parser().parse("Abies alba Mill., nom. illeg.", None).unwrap();
        assert_eq!(pn.nom_status.as_deref(), Some("nom. illeg."));
        assert_eq!(pn.authorship.as_deref(), Some("Mill."));
    }

    #[test]
    fn test_unparsable_names() {
        let p = parser();
        assert_eq!(p.parse("Tobacco mosaic virus", None).unwrap_err().name_type, NameType::Virus);
        assert_eq!(p.parse("Incertae sedis", None).unwrap_err().name_type, NameType::Placeholder);
        assert_eq!(p.parse("Abies alba × Abies nordmanniana", None).unwrap_err().name_type, NameType::Hybrid);
        assert_eq!(p.parse("1234", None).unwrap_err().name_type, NameType::NoName);
        assert_eq!(p.parse("abies alba", None).unwrap_err().name_type, NameType::Doubtful);
    }

    #[test]
    fn test_informal_species() {
        let pn = parser().parse("Abies sp.", None).unwrap();
        assert_eq!(pn.name_type, NameType::Informal);
        assert_eq!(pn.rank, Some(Rank::Species));
    }
}
