//! Locale independent folding of scientific names

/// Folds diacritics, ligatures, hybrid markers and punctuation noise out of
/// a name so that spelling variants share one key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SciNameNormalizer;

impl SciNameNormalizer {
    pub fn normalize(name: &str) -> String {
        let mut folded = String::with_capacity(name.len());
        for c in name.chars() {
            match fold_char(c) {
                Fold::Keep => folded.push(c),
                Fold::Replace(s) => folded.push_str(s),
                Fold::Space => folded.push(' '),
                Fold::Drop => {}
            }
        }
        folded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

enum Fold {
    Keep,
    Replace(&'static str),
    Space,
    Drop,
}

fn fold_char(c: char) -> Fold {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' => Fold::Replace("a"),
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => Fold::Replace("A"),
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ě' => Fold::Replace("e"),
        'É' | 'È' | 'Ê' | 'Ë' => Fold::Replace("E"),
        'í' | 'ì' | 'î' | 'ï' => Fold::Replace("i"),
        'Í' | 'Ì' | 'Î' | 'Ï' => Fold::Replace("I"),
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ő' => Fold::Replace("o"),
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => Fold::Replace("O"),
        'ú' | 'ù' | 'û' | 'ü' | 'ű' => Fold::Replace("u"),
        'Ú' | 'Ù' | 'Û' | 'Ü' => Fold::Replace("U"),
        'ý' | 'ÿ' => Fold::Replace("y"),
        'ç' | 'č' => Fold::Replace("c"),
        'Ç' | 'Č' => Fold::Replace("C"),
        'ñ' | 'ń' => Fold::Replace("n"),
        'š' | 'ś' => Fold::Replace("s"),
        'ž' | 'ź' | 'ż' => Fold::Replace("z"),
        'ł' => Fold::Replace("l"),
        'æ' => Fold::Replace("ae"),
        'Æ' => Fold::Replace("Ae"),
        'œ' => Fold::Replace("oe"),
        'Œ' => Fold::Replace("Oe"),
        'ß' => Fold::Replace("ss"),
        '×' | '†' | '"' | '\'' | '`' | '´' | '‘' | '’' | '“' | '”' | '?' | '!' => Fold::Drop,
        '-' | '.' | '&' | '(' | ')' | '[' | ']' | ',' | ';' | ':' => Fold::Keep,
        c if c.is_whitespace() => Fold::Space,
        c if !c.is_alphanumeric() => Fold::Space,
        _ => Fold::Keep,
    }
}
