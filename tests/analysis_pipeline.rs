//! Integration tests for the analysis pipeline
//!
//! The AST dump is faked with `/bin/sh -c 'cat <fixture>'`, so enhancement can
//! be exercised without a Trivil compiler.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use tribox::analysis::lexer::LexicalAnalyzer;
use tribox::analysis::token::{SemanticKind, Token, TokenKind};
use tribox::config::settings::CompilerSettings;
use tribox::core::playground::Playground;

const SCENARIO_A: &str = "фн сумма(икс:Цел64, игрек:Цел64):Цел64{вернуть икс+игрек;}";

const PROGRAM: &str = "фн сумма(икс: Цел64, игрек: Цел64): Цел64 {
    вернуть икс + игрек
}

вход {
    пусть итог = сумма(1, 2)
    вывод.ф(итог) // печать
}";

const DUMP: &str = r#"(Module "стд::вывод"
  (Function "ф" "functype" External)
)
(Module "sample_7"
  (Import "стд::вывод")
  (Function "сумма" "functype"
    (Params (Param "икс" "Цел64") (Param "игрек" "Цел64"))
    (Return (BinaryExpr "+" (IdentExpr "Цел64" "икс") (IdentExpr "Цел64" "игрек"))))
  (EntryFn
    (VarDecl "итог" "Цел64" (CallExpr "Цел64" (IdentExpr "functype" RO "сумма")))
    (CallExpr "нет результата" (SelectorExpr "functype" "ф") (IdentExpr "Цел64" "итог")))
)
Execute: sample_7
"#;

fn settings(temp: &Path, ast_script: &str) -> CompilerSettings {
    CompilerSettings {
        compiler_path: PathBuf::from("/bin/sh"),
        temp_directory: temp.to_path_buf(),
        ast_flags: vec!["-c".to_string(), ast_script.to_string(), "ast".to_string()],
        compilation_timeout_ms: 10_000,
        kill_grace_ms: 2_000,
        drain_grace_ms: 2_000,
        ..CompilerSettings::default()
    }
}

fn static_tokens(source: &str) -> Vec<Token> {
    LexicalAnalyzer::new().unwrap().tokenize(source)
}

fn find<'a>(tokens: &'a [Token], text: &str) -> &'a Token {
    tokens
        .iter()
        .find(|t| t.text == text)
        .unwrap_or_else(|| panic!("no token {:?} in {:?}", text, tokens))
}

fn assert_well_formed(source: &str, tokens: &[Token]) {
    let lines: Vec<&str> = source.split('\n').collect();
    for token in tokens {
        assert_eq!(token.start_line, token.end_line, "{:?}", token);
        assert!(token.start_column < token.end_column, "{:?}", token);
        let line_len = lines[token.start_line].chars().count();
        assert!(token.end_column <= line_len, "{:?}", token);
    }
}

#[test]
fn test_static_classification_of_function_header() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(CompilerSettings {
        compiler_path: PathBuf::from("/nonexistent/trivil"),
        ..settings(temp.path(), "true")
    })
    .unwrap();

    let response = playground.analyze(SCENARIO_A);
    assert!(response.success);
    let tokens = &response.tokens;
    assert_eq!(find(tokens, "сумма").kind, TokenKind::UserFunction);
    assert_eq!(find(tokens, "икс").kind, TokenKind::Parameter);
    assert_eq!(find(tokens, "игрек").kind, TokenKind::Parameter);
    assert_eq!(find(tokens, "Цел64").kind, TokenKind::BuiltInType);
    assert_eq!(find(tokens, "+").kind, TokenKind::Operator);
    assert_well_formed(SCENARIO_A, tokens);
}

#[test]
fn test_failed_dump_returns_static_tokens() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(settings(temp.path(), "echo 'ошибка разбора'; exit 1")).unwrap();

    let response = playground.analyze(PROGRAM);
    assert!(response.success);
    assert_eq!(response.tokens, static_tokens(PROGRAM));
    assert!(response.tokens.iter().all(|t| t.semantic_tag.is_none()));
    assert!(playground.registry().is_empty());
}

#[test]
fn test_empty_dump_returns_static_tokens() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(settings(temp.path(), "true")).unwrap();

    let response = playground.analyze(PROGRAM);
    assert_eq!(response.tokens, static_tokens(PROGRAM));
}

#[test]
fn test_dump_timeout_returns_static_tokens() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(CompilerSettings {
        compilation_timeout_ms: 300,
        ..settings(temp.path(), "sleep 30")
    })
    .unwrap();

    let response = playground.analyze(SCENARIO_A);
    assert!(response.success);
    assert_eq!(response.tokens, static_tokens(SCENARIO_A));
    assert!(playground.registry().is_empty());
}

#[test]
fn test_dump_enhances_tokens() {
    let temp = tempfile::tempdir().unwrap();
    let fixtures = tempfile::tempdir().unwrap();
    let dump_path = fixtures.path().join("dump.txt");
    std::fs::write(&dump_path, DUMP).unwrap();

    let script = format!("cat '{}'", dump_path.display());
    let playground = Playground::new(settings(temp.path(), &script)).unwrap();

    let response = playground.analyze(PROGRAM);
    assert!(response.success);
    let tokens = &response.tokens;
    let baseline = static_tokens(PROGRAM);
    assert_eq!(tokens.len(), baseline.len());

    let sum = find(tokens, "сумма");
    assert_eq!(sum.kind, TokenKind::UserFunction);
    assert_eq!(sum.semantic_tag, Some(SemanticKind::UserFunction));
    assert_eq!(find(tokens, "икс").semantic_tag, Some(SemanticKind::FunctionParameter));
    assert_eq!(find(tokens, "итог").kind, TokenKind::UserVariable);
    assert_eq!(find(tokens, "вывод").kind, TokenKind::ImportedClass);
    assert_eq!(find(tokens, "ф").kind, TokenKind::ImportedFunction);
    assert_eq!(find(tokens, "Цел64").kind, TokenKind::ResolvedBuiltInType);
    assert_eq!(find(tokens, "фн").kind, TokenKind::ResolvedKeyword);
    assert_eq!(find(tokens, "// печать").kind, TokenKind::Comment);

    // Enhancement never moves a token
    for (enhanced, original) in tokens.iter().zip(&baseline) {
        assert_eq!(
            (enhanced.start_line, enhanced.start_column, enhanced.end_column, &enhanced.text),
            (original.start_line, original.start_column, original.end_column, &original.text)
        );
    }
    assert_well_formed(PROGRAM, tokens);

    // Analysis workspaces are gone once the call returns
    let leftovers: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("session_"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_analysis_is_deterministic() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(settings(temp.path(), "exit 1")).unwrap();

    let first = playground.analyze(PROGRAM);
    let second = playground.analyze(PROGRAM);
    assert_eq!(first.tokens, second.tokens);
}

#[test]
fn test_over_length_analysis_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(CompilerSettings {
        max_source_length: 10,
        ..settings(temp.path(), "exit 1")
    })
    .unwrap();

    let response = playground.analyze(PROGRAM);
    assert!(!response.success);
    assert!(response.tokens.is_empty());
    assert!(response.error.is_some());
}

#[test]
fn test_blank_input_yields_no_tokens() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(settings(temp.path(), "exit 1")).unwrap();

    let response = playground.analyze("  \n\n ");
    assert!(response.success);
    assert!(response.tokens.is_empty());
}

#[test]
fn test_sorted_tokens_follow_document_order() {
    let temp = tempfile::tempdir().unwrap();
    let playground = Playground::new(settings(temp.path(), "exit 1")).unwrap();

    let response = playground.analyze(PROGRAM).sorted();
    let positions: Vec<(usize, usize)> = response
        .tokens
        .iter()
        .map(|t| (t.start_line, t.start_column))
        .collect();
    let mut expected = positions.clone();
    expected.sort();
    assert_eq!(positions, expected);
}
