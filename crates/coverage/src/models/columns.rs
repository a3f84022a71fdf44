use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{AnalysisError, AnalysisResult};

/// Runs of whitespace and underscores collapse into a single separator
static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s_]+").expect("Invalid regex pattern for column separators")
});

/// Canonical form of a column header or candidate substring.
///
/// Trims, lowercases, collapses whitespace/underscore runs to `_`, folds
/// accented Latin letters to their base letter, maps the ordinal indicators
/// `º`/`ª` to `o`/`a` and `≥`/`≤` to `>=`/`<=`.
///
/// # Example
/// ```rust
/// use coverage::models::columns::normalize_column_name;
///
/// assert_eq!(normalize_column_name("DSEI_Gestão"), "dsei_gestao");
/// assert_eq!(normalize_column_name("Dsei Gestao "), "dsei_gestao");
/// assert_eq!(normalize_column_name("Nº GESTANTES"), "no_gestantes");
/// assert_eq!(normalize_column_name("≥6 consultas"), ">=6_consultas");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.trim().chars() {
        for lower in c.to_lowercase() {
            match fold_char(lower) {
                Some(replacement) => folded.push_str(replacement),
                None => folded.push(lower),
            }
        }
    }
    SEPARATOR_RUN.replace_all(&folded, "_").into_owned()
}

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' | 'ª' => "a",
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'í' | 'ì' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => "i",
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' | 'º' | '°' => "o",
        'ú' | 'ù' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ý' | 'ÿ' => "y",
        'ś' | 'ş' | 'š' => "s",
        'ź' | 'ż' | 'ž' => "z",
        '≥' => ">=",
        '≤' => "<=",
        _ => return None,
    };
    Some(folded)
}

/// A semantic field and the header substrings that identify it, in priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub candidates: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn required(name: &str, candidates: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            required: true,
        }
    }

    pub fn optional(name: &str, candidates: &[&str]) -> Self {
        Self {
            required: false,
            ..Self::required(name, candidates)
        }
    }
}

/// Find the column for `field` among `columns`.
///
/// Candidates are tried in priority order; for each candidate the first
/// column (in table order) whose normalized name contains the normalized
/// candidate wins.
///
/// # Returns
/// * `Ok(Some(column))` - the original (unnormalized) column name
/// * `Ok(None)` - nothing matched and the field is optional
/// * `Err(AnalysisError::MissingColumn)` - nothing matched a required field
/// * `Err(AnalysisError::EmptyCandidates)` - the field has no candidates
///
/// # Example
/// ```rust
/// use coverage::models::columns::{resolve_column, FieldSpec};
///
/// let columns = vec!["DSEI_GESTAO".to_string(), "Nº GESTANTES".to_string()];
/// let field = FieldSpec::required("district", &["dsei", "distrito"]);
/// assert_eq!(resolve_column(&columns, &field).unwrap(), Some("DSEI_GESTAO".to_string()));
/// ```
pub fn resolve_column(columns: &[String], field: &FieldSpec) -> AnalysisResult<Option<String>> {
    if field.candidates.is_empty() {
        return Err(AnalysisError::EmptyCandidates(field.name.clone()));
    }

    let normalized: Vec<String> = columns.iter().map(|c| normalize_column_name(c)).collect();
    for candidate in &field.candidates {
        let needle = normalize_column_name(candidate);
        if needle.is_empty() {
            continue;
        }
        if let Some(idx) = normalized.iter().position(|c| c.contains(&needle)) {
            log::debug!(
                "Field '{}' resolved to column '{}' via candidate '{}'",
                field.name,
                columns[idx],
                candidate
            );
            return Ok(Some(columns[idx].clone()));
        }
    }

    if field.required {
        Err(AnalysisError::MissingColumn {
            field: field.name.clone(),
            candidates: field.candidates.clone(),
        })
    } else {
        Ok(None)
    }
}

/// Resolved column names for a set of fields, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    entries: Vec<(String, Option<String>)>,
}

impl ResolvedColumns {
    /// Column for `field`, if the field was resolved
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, column)| column.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve every field; the first unresolvable required field aborts
pub fn resolve_fields(columns: &[String], fields: &[FieldSpec]) -> AnalysisResult<ResolvedColumns> {
    let mut entries = Vec::with_capacity(fields.len());
    for field in fields {
        let column = resolve_column(columns, field)?;
        entries.push((field.name.clone(), column));
    }
    Ok(ResolvedColumns { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalization_is_case_and_accent_insensitive() {
        let expected = "dsei_gestao";
        assert_eq!(normalize_column_name("DSEI_Gestão"), expected);
        assert_eq!(normalize_column_name("dsei_gestao"), expected);
        assert_eq!(normalize_column_name("Dsei Gestao "), expected);
        assert_eq!(normalize_column_name("  DSEI   GESTÃO"), expected);
    }

    #[test]
    fn test_normalization_of_portuguese_headers() {
        assert_eq!(normalize_column_name("ÓBITOS INFANTIS"), "obitos_infantis");
        assert_eq!(normalize_column_name("COM ACESSO AO EXAME DE ULTRASSOM"), "com_acesso_ao_exame_de_ultrassom");
        assert_eq!(normalize_column_name("6 OU MAIS CONSULTAS"), "6_ou_mais_consultas");
        assert_eq!(normalize_column_name("MÉDIO RIO SOLIMÕES"), "medio_rio_solimoes");
    }

    #[test]
    fn test_same_field_for_all_spellings() {
        let field = FieldSpec::required("district", &["dsei"]);
        for header in ["DSEI_Gestão", "dsei_gestao", "Dsei Gestao "] {
            let columns = cols(&["Nº GESTANTES", header]);
            assert_eq!(resolve_column(&columns, &field).unwrap(), Some(header.to_string()));
        }
    }

    #[test]
    fn test_candidate_priority_then_column_order() {
        let columns = cols(&["ultrassom realizado", "com acesso ao exame", "acesso 2"]);
        let field = FieldSpec::required("ultrasound", &["acesso", "ultrassom"]);
        assert_eq!(
            resolve_column(&columns, &field).unwrap(),
            Some("com acesso ao exame".to_string())
        );
    }

    #[test]
    fn test_first_column_wins_on_multiple_matches() {
        let columns = cols(&["dsei_gestao", "dsei_residencia"]);
        let field = FieldSpec::required("district", &["dsei"]);
        assert_eq!(resolve_column(&columns, &field).unwrap(), Some("dsei_gestao".to_string()));
    }

    #[test]
    fn test_space_and_underscore_candidates_are_equivalent() {
        let columns = cols(&["6 OU MAIS CONSULTAS"]);
        let field = FieldSpec::required("visits", &["6_ou_mais"]);
        assert!(resolve_column(&columns, &field).unwrap().is_some());
    }

    #[test]
    fn test_greater_equal_symbol() {
        let columns = cols(&["Gestantes ≥6 consultas"]);
        let field = FieldSpec::required("visits", &["6 ou mais", "≥6"]);
        assert_eq!(
            resolve_column(&columns, &field).unwrap(),
            Some("Gestantes ≥6 consultas".to_string())
        );
    }

    #[test]
    fn test_missing_required_field() {
        let columns = cols(&["municipio", "total"]);
        let field = FieldSpec::required("district", &["dsei", "distrito"]);
        match resolve_column(&columns, &field) {
            Err(AnalysisError::MissingColumn { field, candidates }) => {
                assert_eq!(field, "district");
                assert_eq!(candidates, vec!["dsei".to_string(), "distrito".to_string()]);
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_optional_field() {
        let columns = cols(&["dsei"]);
        let field = FieldSpec::optional("maternal_deaths", &["materno"]);
        assert_eq!(resolve_column(&columns, &field).unwrap(), None);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let field = FieldSpec::required("district", &[]);
        assert!(matches!(
            resolve_column(&cols(&["dsei"]), &field),
            Err(AnalysisError::EmptyCandidates(_))
        ));
    }

    #[test]
    fn test_resolve_fields() {
        let columns = cols(&["DSEI_GESTAO", "Nº GESTANTES", "6 OU MAIS CONSULTAS"]);
        let fields = vec![
            FieldSpec::required("district", &["dsei"]),
            FieldSpec::required("pregnant", &["gestante"]),
            FieldSpec::required("visits", &["6 ou mais"]),
            FieldSpec::optional("period", &["ano"]),
        ];
        let resolved = resolve_fields(&columns, &fields).unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved.get("pregnant"), Some("Nº GESTANTES"));
        assert_eq!(resolved.get("period"), None);
        assert_eq!(resolved.get("visits"), Some("6 OU MAIS CONSULTAS"));
    }
}
