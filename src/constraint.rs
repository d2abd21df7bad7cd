use std::collections::BTreeSet;

/// Form field carrying the DAP4 constraint expression in a data request.
pub const CONSTRAINT_KEY: &str = "dap4.ce";

/// Builds a DAP4 constraint expression from a set of variable paths.
///
/// Paths are sorted and de-duplicated, joined with `;`, and the whole string is
/// percent-encoded with no safe characters (so `/` and `;` are encoded too).
/// An empty input produces an empty expression.
pub fn constraint_expression<I, S>(variables: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ordered: BTreeSet<String> = variables
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .collect();

    let joined = ordered.into_iter().collect::<Vec<_>>().join(";");
    urlencoding::encode(&joined).into_owned()
}

/// Renders a variable set for log output without brace punctuation.
pub fn format_variable_set<I, S>(variables: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    variables
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(expression: &str) -> BTreeSet<String> {
        let decoded = urlencoding::decode(expression).unwrap();
        decoded.split(';').map(str::to_string).collect()
    }

    #[test]
    fn encodes_separators_and_slashes() {
        let set: BTreeSet<&str> = ["/alpha_var", "/blue_var"].into_iter().collect();
        assert_eq!(constraint_expression(&set), "%2Falpha_var%3B%2Fblue_var");
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let a = constraint_expression(["/z", "/a", "/m"]);
        let b = constraint_expression(["/m", "/z", "/a"]);
        assert_eq!(a, b);
        assert_eq!(urlencoding::decode(&a).unwrap(), "/a;/m;/z");
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(
            constraint_expression(["/a", "/a"]),
            constraint_expression(["/a"])
        );
    }

    #[test]
    fn empty_set_is_empty_expression() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(constraint_expression(empty), "");
    }

    #[test]
    fn index_ranges_are_encoded() {
        let expr = constraint_expression(["/group/var[0:1:10]"]);
        assert_eq!(expr, "%2Fgroup%2Fvar%5B0%3A1%3A10%5D");
    }

    #[test]
    fn variable_set_has_no_braces() {
        let formatted = format_variable_set(["/lat", "/lon"]);
        assert_eq!(formatted, "/lat, /lon");
        assert!(!formatted.contains('{'));
    }

    proptest! {
        #[test]
        fn decoding_recovers_the_set(
            paths in prop::collection::btree_set("/[a-zA-Z0-9_/{}\\[\\]: .-]{1,16}", 1..8)
        ) {
            let expr = constraint_expression(&paths);
            prop_assert!(!expr.contains(';'));
            prop_assert!(!expr.contains('{'), "expr contains '{{': {}", expr);
            prop_assert!(!expr.contains('}'), "expr contains '}}': {}", expr);
            prop_assert_eq!(decode(&expr), paths);
        }
    }
}
