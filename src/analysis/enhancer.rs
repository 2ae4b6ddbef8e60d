/// Semantic enhancement of static tokens from the compiler's AST dump
use crate::analysis::ast_mining::{AstMiner, SymbolMap};
use crate::analysis::lexer::is_keyword;
use crate::analysis::token::{Token, TokenKind};
use crate::config::settings::CompilerSettings;
use crate::config::types::{PlaygroundError, Result};
use crate::core::source::SourceUnit;
use crate::exec::runner::ProcessRunner;
use crate::judge::toolchain::TrivilToolchain;
use crate::safety::workspace::{WorkspaceManager, SESSION_PREFIX};
use log::{debug, info, warn};
use std::time::Duration;

/// Source file name inside an analysis workspace
pub const AST_SOURCE_FILE: &str = "main.tri";

/// Type names an unmatched token is refined to `type.builtin` for
pub const REFINED_TYPE_NAMES: [&str; 4] = ["Цел64", "Строка", "Булев", "Плав64"];

/// Best-effort refinement of a token the miner knows nothing about
pub fn refine_kind(token: &Token) -> TokenKind {
    if is_keyword(&token.text) {
        TokenKind::ResolvedKeyword
    } else if REFINED_TYPE_NAMES.contains(&token.text.as_str()) {
        TokenKind::ResolvedBuiltInType
    } else {
        token.kind
    }
}

/// Rewrite every token whose text names a mined symbol; refine the rest
pub fn merge_symbols(tokens: &[Token], symbols: &SymbolMap) -> Vec<Token> {
    tokens
        .iter()
        .map(|token| {
            let mut merged = token.clone();
            match symbols.get(&token.text) {
                Some(info) => {
                    merged.kind = info.kind.token_kind();
                    merged.semantic_tag = Some(info.kind);
                    debug!("Enhanced '{}': {} -> {}", token.text, token.kind, merged.kind);
                }
                None => merged.kind = refine_kind(token),
            }
            merged
        })
        .collect()
}

#[derive(Debug)]
pub struct SemanticEnhancer {
    miner: AstMiner,
    toolchain: TrivilToolchain,
    runner: ProcessRunner,
    workspaces: WorkspaceManager,
    timeout: Duration,
}

impl SemanticEnhancer {
    pub fn new(settings: &CompilerSettings, runner: ProcessRunner) -> Result<Self> {
        Ok(Self {
            miner: AstMiner::new()?,
            toolchain: TrivilToolchain::from_settings(settings),
            runner,
            workspaces: WorkspaceManager::new(settings.temp_directory.clone()),
            timeout: settings.compilation_timeout(),
        })
    }

    pub fn miner(&self) -> &AstMiner {
        &self.miner
    }

    /// Enhanced tokens, or `tokens` unchanged when anything goes wrong
    pub fn enhance(&self, source: &SourceUnit, tokens: Vec<Token>) -> Vec<Token> {
        match self.try_enhance(source, &tokens) {
            Ok(enhanced) => enhanced,
            Err(e) => {
                warn!("Semantic enhancement failed, using static tokens only: {}", e);
                tokens
            }
        }
    }

    pub fn try_enhance(&self, source: &SourceUnit, tokens: &[Token]) -> Result<Vec<Token>> {
        let dump = self.dump_ast(source)?;
        let symbols = self.miner.mine(&dump);
        info!(
            "Enhancing {} static tokens with {} semantic entries",
            tokens.len(),
            symbols.len()
        );
        Ok(merge_symbols(tokens, &symbols))
    }

    /// Run the compiler in AST mode over the wrapped snippet in a fresh workspace
    pub fn dump_ast(&self, source: &SourceUnit) -> Result<String> {
        let mut workspace = self.workspaces.create_workspace(SESSION_PREFIX)?;
        workspace.write_source(AST_SOURCE_FILE, &source.wrapped_in_module())?;

        let run = self.runner.run(
            self.toolchain.compiler_path(),
            self.toolchain.ast_args(AST_SOURCE_FILE),
            workspace.dir(),
            self.timeout,
        );
        workspace.dispose();
        let run = run?;

        if !run.success() {
            return Err(PlaygroundError::Analysis(format!(
                "AST dump exited with code {:?}",
                run.exit_code
            )));
        }
        if run.output.trim().is_empty() {
            return Err(PlaygroundError::Analysis("AST dump produced no output".to_string()));
        }
        debug!("AST dump: {} chars", run.output.chars().count());
        Ok(run.output)
    }
}
