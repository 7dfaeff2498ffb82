use super::*;

fn lex(source: &str) -> Vec<Lexeme> {
    let (tokens, diags) = Lexer::new(source).tokenize();
    assert!(diags.is_empty(), "unexpected lex errors: {:?}", diags);
    tokens.into_iter().map(|t| t.node).collect()
}

#[test]
fn test_simple_function_layout() {
    let tokens = lex("def f(a):\n    return a\n");
    assert_eq!(
        tokens,
        vec![
            Lexeme::Def,
            Lexeme::Ident("f".into()),
            Lexeme::LParen,
            Lexeme::Ident("a".into()),
            Lexeme::RParen,
            Lexeme::Colon,
            Lexeme::Newline,
            Lexeme::Indent,
            Lexeme::Return,
            Lexeme::Ident("a".into()),
            Lexeme::Newline,
            Lexeme::Dedent,
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_missing_trailing_newline_is_synthesized() {
    let tokens = lex("def f():\n    pass");
    assert_eq!(
        &tokens[tokens.len() - 4..],
        &[Lexeme::Pass, Lexeme::Newline, Lexeme::Dedent, Lexeme::Eof]
    );
}

#[test]
fn test_blank_and_comment_lines_are_ignored() {
    let tokens = lex("def f():\n\n    # a comment\n    pass  # trailing\n\n");
    assert_eq!(
        tokens,
        vec![
            Lexeme::Def,
            Lexeme::Ident("f".into()),
            Lexeme::LParen,
            Lexeme::RParen,
            Lexeme::Colon,
            Lexeme::Newline,
            Lexeme::Indent,
            Lexeme::Pass,
            Lexeme::Newline,
            Lexeme::Dedent,
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_newlines_inside_brackets_are_joined() {
    let tokens = lex("f(a,\n  b)\n");
    assert!(!tokens[..tokens.len() - 2].contains(&Lexeme::Newline));
    assert_eq!(tokens.iter().filter(|t| **t == Lexeme::Newline).count(), 1);
    assert!(!tokens.contains(&Lexeme::Indent));
}

#[test]
fn test_nested_dedents() {
    let tokens = lex("if a:\n    if b:\n        pass\nx = 1\n");
    let dedents = tokens.iter().filter(|t| **t == Lexeme::Dedent).count();
    assert_eq!(dedents, 2);
    let dedent_pos = tokens.iter().position(|t| *t == Lexeme::Dedent).unwrap();
    assert_eq!(tokens[dedent_pos + 2], Lexeme::Ident("x".into()));
}

#[test]
fn test_number_literals() {
    let tokens = lex("1 2.5 .5 1e3 10_000\n");
    assert_eq!(
        &tokens[..5],
        &[
            Lexeme::Integer(1),
            Lexeme::Float(2.5),
            Lexeme::Float(0.5),
            Lexeme::Float(1000.0),
            Lexeme::Integer(10000),
        ]
    );
}

#[test]
fn test_string_literals_and_escapes() {
    let tokens = lex("print('a\\tb', \"Hello, world!\")\n");
    assert!(tokens.contains(&Lexeme::Str("a\tb".into())));
    assert!(tokens.contains(&Lexeme::Str("Hello, world!".into())));
}

#[test]
fn test_triple_quoted_docstring() {
    let tokens = lex("\"\"\"doc\nstring\"\"\"\n");
    assert_eq!(tokens[0], Lexeme::Str("doc\nstring".into()));
}

#[test]
fn test_operators() {
    let tokens = lex("a -> b ** c // d += e != f <= g\n");
    for expected in [
        Lexeme::Arrow,
        Lexeme::StarStar,
        Lexeme::SlashSlash,
        Lexeme::PlusEq,
        Lexeme::NotEq,
        Lexeme::LtEq,
    ] {
        assert!(tokens.contains(&expected), "missing {:?}", expected);
    }
}

#[test]
fn test_decorator_tokens() {
    let tokens = lex("@jit(\"cuda\")\ndef f():\n    pass\n");
    assert_eq!(tokens[0], Lexeme::At);
    assert_eq!(tokens[1], Lexeme::Ident("jit".into()));
    assert_eq!(tokens[3], Lexeme::Str("cuda".into()));
}

#[test]
fn test_unexpected_character_reports_and_continues() {
    let (tokens, diags) = Lexer::new("a $ b\n").tokenize();
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("unexpected character '$'"));
    assert_eq!(tokens[1].node, Lexeme::Ident("b".into()));
}

#[test]
fn test_non_ascii_character_is_reported_whole() {
    let (tokens, diags) = Lexer::new("\u{feff}a → b\n").tokenize();
    assert_eq!(diags.len(), 2);
    assert!(diags[0].message.contains("'\u{feff}' (U+FEFF)"), "{}", diags[0].message);
    assert!(diags[1].message.contains("'→' (U+2192)"), "{}", diags[1].message);
    assert_eq!(diags[1].span.end - diags[1].span.start, 3);
    let idents: Vec<&Lexeme> = tokens.iter().map(|t| &t.node).filter(|l| matches!(l, Lexeme::Ident(_))).collect();
    assert_eq!(idents, vec![&Lexeme::Ident("a".into()), &Lexeme::Ident("b".into())]);
}

#[test]
fn test_inconsistent_dedent_is_an_error() {
    let (_tokens, diags) = Lexer::new("if a:\n        x\n    y\n").tokenize();
    assert!(diags
        .iter()
        .any(|d| d.message.contains("unindent does not match")));
}

#[test]
fn test_unterminated_string() {
    let (_tokens, diags) = Lexer::new("x = 'abc\n").tokenize();
    assert!(diags[0].message.contains("unterminated string"));
}

#[test]
fn test_spans_cover_lexemes() {
    let (tokens, _) = Lexer::new("out = a").tokenize();
    assert_eq!(tokens[0].span, Span::new(0, 3));
    assert_eq!(tokens[1].span, Span::new(4, 5));
    assert_eq!(tokens[2].span, Span::new(6, 7));
}
