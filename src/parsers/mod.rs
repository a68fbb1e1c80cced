//! Parsers for names and controlled term values
//!
//! Term parsers never fail hard: an unknown value yields
//! [`ParseResult::Failure`] which callers record as a usage issue.

mod name;
mod normalize;
mod terms;

pub use name::{BasicNameParser, NameParser, UnparsableName};
pub use normalize::SciNameNormalizer;
pub use terms::{KingdomParser, NomStatusParser, ParseResult, RankParser, TaxStatusParser, TermParser};
