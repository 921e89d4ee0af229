use rating_dsl::{Block, Expr, parse_function_header, parse_program};

#[test]
fn parses_a_full_if_elseif_else_block_with_nested_calls() {
    let source = "if (value1==1) then return 'A'\nelse if (value1==2) then return max(value2, 10)\nelse return 'C' end";
    let block = parse_program("choice", source).unwrap();
    match block {
        Block::If(stmt) => assert_eq!(stmt.arms.len(), 2),
        other => panic!("expected an If block, got {other:?}"),
    }
}

#[test]
fn parses_function_header_and_recursive_body() {
    let header = parse_function_header("factorial(n)").unwrap();
    assert_eq!(header.name, "factorial");
    assert_eq!(header.params, vec!["n".to_string()]);

    let body = parse_program(&header.name, "if (n==1) then return 1 else return n*factorial(n-1) end").unwrap();
    assert!(matches!(body, Block::If(_)));
}

#[test]
fn line_comment_and_block_comment_are_both_skipped() {
    let source = "// leading comment\nreturn 1 + /* inline */ 2 // trailing";
    let block = parse_program("t", source).unwrap();
    assert!(matches!(block, Block::Return(Expr::Binary { .. })));
}

#[test]
fn single_quoted_strings_use_generic_backslash_escapes() {
    let block = parse_program("t", r"return 'it\'s a test'").unwrap();
    match block {
        Block::Return(Expr::Str(s)) => assert_eq!(s, "it's a test"),
        other => panic!("expected a string literal, got {other:?}"),
    }
}

#[test]
fn syntax_error_reports_the_formula_name_and_source() {
    let err = parse_program("broken_formula", "return (1 + ").unwrap_err();
    assert_eq!(err.formula_name, "broken_formula");
    assert!(err.source_text.contains("return (1 +"));
}
