//! Parsing of formula *names* to tell a user-defined function apart from a
//! plain lazy variable, per the grammar's `Identifier '(' argList? ')'`
//! shape for a function header.

/// A parsed function header: its name and the formal parameter names in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHeader {
    /// The function's name, as written (case preserved).
    pub name: String,
    /// Formal parameter names, in declaration order.
    pub params: Vec<String>,
}

/// Parse a formula name as a function header: `name(arg1, arg2, ...)`.
///
/// Returns `None` if `header` does not match `Identifier '(' ... ')'`
/// (trimmed), in which case the formula is an ordinary lazy variable. An
/// empty argument list (`foo()`) yields zero parameters, not one.
#[must_use]
pub fn parse_function_header(header: &str) -> Option<FunctionHeader> {
    let trimmed = header.trim();
    let open = trimmed.find('(')?;
    if !trimmed.ends_with(')') {
        return None;
    }
    let name = trimmed[..open].trim();
    if name.is_empty() || !is_identifier(name) {
        return None;
    }
    let args_str = &trimmed[open + 1..trimmed.len() - 1];
    let params = if args_str.trim().is_empty() {
        Vec::new()
    } else {
        args_str.split(',').map(|s| s.trim().to_string()).collect()
    };
    Some(FunctionHeader { name: name.to_string(), params })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_function_header_with_args() {
        let header = parse_function_header("factorial(n)").unwrap();
        assert_eq!(header.name, "factorial");
        assert_eq!(header.params, vec!["n".to_string()]);
    }

    #[test]
    fn parses_function_header_with_no_args_as_zero_arity() {
        let header = parse_function_header("today()").unwrap();
        assert_eq!(header.name, "today");
        assert!(header.params.is_empty());
    }

    #[test]
    fn plain_variable_name_is_not_a_function_header() {
        assert_eq!(parse_function_header("Wohnungswert"), None);
    }

    #[test]
    fn multi_arg_header_splits_and_trims() {
        let header = parse_function_header("allocate( a ,  b,c )").unwrap();
        assert_eq!(header.params, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
