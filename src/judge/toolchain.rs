use crate::config::settings::CompilerSettings;
use std::path::{Path, PathBuf};

/// Command lines for the two compiler invocation modes.
#[derive(Debug, Clone)]
pub struct TrivilToolchain {
    compiler_path: PathBuf,
    compile_flags: Vec<String>,
    ast_flags: Vec<String>,
}

impl TrivilToolchain {
    pub fn new(compiler_path: PathBuf, compile_flags: Vec<String>, ast_flags: Vec<String>) -> Self {
        Self {
            compiler_path,
            compile_flags,
            ast_flags,
        }
    }

    pub fn from_settings(settings: &CompilerSettings) -> Self {
        Self::new(
            settings.compiler_path.clone(),
            settings.compile_flags.clone(),
            settings.ast_flags.clone(),
        )
    }

    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }

    pub fn ast_flags(&self) -> &[String] {
        &self.ast_flags
    }

    /// `<flags...> <source>`; the source is passed relative to the workspace
    pub fn compile_args(&self, source_name: &str) -> Vec<String> {
        with_source(&self.compile_flags, source_name)
    }

    /// `<ast flags...> <source>`, e.g. `-ast 2 main.tri`
    pub fn ast_args(&self, source_name: &str) -> Vec<String> {
        with_source(&self.ast_flags, source_name)
    }
}

fn with_source(flags: &[String], source_name: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(flags.len() + 1);
    args.extend(flags.iter().cloned());
    args.push(source_name.to_string());
    args
}
