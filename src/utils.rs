use crate::schema::RawValue;

/// Returns the parent path of a dot-separated account code ("1.2.3" -> "1.2").
/// Root codes have no parent.
pub fn parent_code(code: &str) -> Option<&str> {
    code.rsplit_once('.').map(|(parent, _)| parent)
}

/// 1-based depth of an account code: the number of path segments.
pub fn code_level(code: &str) -> usize {
    code.matches('.').count() + 1
}

/// Coerces a raw cell to a number. Missing, null, non-finite and non-numeric
/// text all become 0.0.
pub fn safe_float(value: Option<&RawValue>) -> f64 {
    let parsed = match value {
        None => return 0.0,
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(RawValue::Text(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
    };

    if !parsed.is_finite() {
        0.0
    } else {
        parsed
    }
}

/// Extracts the trimmed text between the first '(' and the next ')'.
/// Returns `None` when there is no such pair or the content is blank.
pub fn name_in_parentheses(text: &str) -> Option<String> {
    let open = text.find('(')?;
    let rest = &text[open + 1..];
    let close = rest.find(')')?;
    let inner = rest[..close].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Splits a link cell ("R2; R3") into its raw codes, dropping blanks.
pub fn split_links(link: &str, delimiter: char) -> impl Iterator<Item = &str> {
    link.split(delimiter)
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_code() {
        assert_eq!(parent_code("1.2.3"), Some("1.2"));
        assert_eq!(parent_code("1.2"), Some("1"));
        assert_eq!(parent_code("1"), None);
        assert_eq!(parent_code("01.002"), Some("01"));
    }

    #[test]
    fn test_code_level() {
        assert_eq!(code_level("1"), 1);
        assert_eq!(code_level("1.1"), 2);
        assert_eq!(code_level("3.2.10.4"), 4);
    }

    #[test]
    fn test_safe_float_coercions() {
        assert_eq!(safe_float(None), 0.0);
        assert_eq!(safe_float(Some(&RawValue::Number(12.5))), 12.5);
        assert_eq!(safe_float(Some(&RawValue::Number(f64::NAN))), 0.0);
        assert_eq!(safe_float(Some(&RawValue::Text(" 7.25 ".to_string()))), 7.25);
        assert_eq!(safe_float(Some(&RawValue::Text("n/a".to_string()))), 0.0);
        assert_eq!(safe_float(Some(&RawValue::Text("1,5".to_string()))), 0.0);
        assert_eq!(safe_float(Some(&RawValue::Bool(true))), 1.0);
    }

    #[test]
    fn test_name_in_parentheses() {
        assert_eq!(
            name_in_parentheses("dados (Realizado)"),
            Some("Realizado".to_string())
        );
        assert_eq!(
            name_in_parentheses("Vinculo (Orcado 2024) extra (x)"),
            Some("Orcado 2024".to_string())
        );
        assert_eq!(name_in_parentheses("plano"), None);
        assert_eq!(name_in_parentheses("plano ( )"), None);
        assert_eq!(name_in_parentheses("plano (sem fim"), None);
    }

    #[test]
    fn test_split_links() {
        let codes: Vec<&str> = split_links("R2; R3 ;;", ';').collect();
        assert_eq!(codes, vec!["R2", "R3"]);

        let codes: Vec<&str> = split_links("R1", ';').collect();
        assert_eq!(codes, vec!["R1"]);
    }
}
