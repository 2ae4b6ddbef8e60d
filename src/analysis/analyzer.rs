/// Request-level analysis: static pass, then best-effort enhancement
use crate::analysis::enhancer::SemanticEnhancer;
use crate::analysis::lexer::LexicalAnalyzer;
use crate::analysis::token::{sort_by_position, Token};
use crate::config::settings::CompilerSettings;
use crate::config::types::Result;
use crate::core::source::SourceUnit;
use crate::exec::runner::ProcessRunner;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wire shape handed to the HTTP layer for an analyze call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub success: bool,
    pub tokens: Vec<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_time_ms: u64,
}

impl AnalysisResponse {
    pub fn success(tokens: Vec<Token>, analysis_time_ms: u64) -> Self {
        Self {
            success: true,
            tokens,
            error: None,
            analysis_time_ms,
        }
    }

    pub fn error(message: impl Into<String>, analysis_time_ms: u64) -> Self {
        Self {
            success: false,
            tokens: Vec::new(),
            error: Some(message.into()),
            analysis_time_ms,
        }
    }

    /// Tokens in strict document order instead of per-line category order
    pub fn sorted(mut self) -> Self {
        sort_by_position(&mut self.tokens);
        self
    }
}

#[derive(Debug)]
pub struct SourceAnalyzer {
    lexer: LexicalAnalyzer,
    enhancer: SemanticEnhancer,
    max_source_length: usize,
}

impl SourceAnalyzer {
    pub fn new(settings: &CompilerSettings, runner: ProcessRunner) -> Result<Self> {
        Ok(Self {
            lexer: LexicalAnalyzer::new()?,
            enhancer: SemanticEnhancer::new(settings, runner)?,
            max_source_length: settings.max_source_length,
        })
    }

    pub fn lexer(&self) -> &LexicalAnalyzer {
        &self.lexer
    }

    /// Tokenize `source`. The static tokens are always returned; semantic
    /// enrichment is applied on top when the compiler cooperates.
    pub fn analyze(&self, source: &str) -> AnalysisResponse {
        let started = Instant::now();
        let length = source.chars().count();
        info!("Starting syntax analysis for {} characters of code", length);

        if length > self.max_source_length {
            warn!("Rejected analysis of {} characters", length);
            return AnalysisResponse::error(
                format!(
                    "Syntax analysis failed: source code exceeds maximum length of {} characters",
                    self.max_source_length
                ),
                elapsed_ms(started),
            );
        }

        let unit = SourceUnit::for_analysis(source);
        let tokens = self.lexer.tokenize(unit.text());
        info!("Static analysis produced {} tokens", tokens.len());

        // Nothing for the compiler to add to an empty snippet
        let tokens = if unit.is_blank() {
            tokens
        } else {
            self.enhancer.enhance(&unit, tokens)
        };

        let analysis_time_ms = elapsed_ms(started);
        info!(
            "Syntax analysis completed in {}ms with {} tokens",
            analysis_time_ms,
            tokens.len()
        );
        AnalysisResponse::success(tokens, analysis_time_ms)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::TokenKind;
    use crate::exec::registry::ProcessRegistry;
    use crate::exec::runner::RunnerLimits;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn analyzer(temp: &Path, max_source_length: usize) -> SourceAnalyzer {
        let settings = CompilerSettings {
            compiler_path: "/nonexistent/trivil".into(),
            temp_directory: temp.to_path_buf(),
            max_source_length,
            ..CompilerSettings::default()
        };
        let runner = ProcessRunner::new(
            Arc::new(ProcessRegistry::new(Duration::from_secs(2))),
            RunnerLimits::default(),
        );
        SourceAnalyzer::new(&settings, runner).unwrap()
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = AnalysisResponse::success(Vec::new(), 7);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["analysisTimeMs"], 7);
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_over_length_is_error_with_no_tokens() {
        let temp = tempfile::tempdir().unwrap();
        let response = analyzer(temp.path(), 3).analyze("фн ф() {}");
        assert!(!response.success);
        assert!(response.tokens.is_empty());
        assert!(response.error.unwrap().contains("maximum length of 3"));
    }

    #[test]
    fn test_missing_compiler_falls_back_to_static_tokens() {
        let temp = tempfile::tempdir().unwrap();
        let analyzer = analyzer(temp.path(), 10_000);
        let source = "фн сумма(икс:Цел64, игрек:Цел64):Цел64{вернуть икс+игрек;}";

        let response = analyzer.analyze(source);
        assert!(response.success);
        assert_eq!(response.tokens, analyzer.lexer().tokenize(source));
        assert!(response.tokens.iter().all(|t| t.semantic_tag.is_none()));
        assert!(response.tokens.iter().any(|t| t.kind == TokenKind::UserFunction));
    }

    #[test]
    fn test_sorted_response_is_document_order() {
        let temp = tempfile::tempdir().unwrap();
        let response = analyzer(temp.path(), 10_000).analyze("а(1) // к").sorted();
        let positions: Vec<(usize, usize)> = response
            .tokens
            .iter()
            .map(|t| (t.start_line, t.start_column))
            .collect();
        let mut expected = positions.clone();
        expected.sort();
        assert_eq!(positions, expected);
    }
}
