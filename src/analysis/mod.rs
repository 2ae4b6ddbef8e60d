//! Source analysis
//!
//! Static lexing always runs; the compiler's AST dump, when it can be
//! obtained, refines the classification of the static tokens.
//!
//! - [`token`]: token and kind types
//! - [`lexer`]: two-pass static lexer
//! - [`ast_mining`]: rule table over the AST dump text
//! - [`enhancer`]: AST dump invocation and token merge
//! - [`analyzer`]: request-level entry point and response shape

pub mod analyzer;
pub mod ast_mining;
pub mod enhancer;
pub mod lexer;
pub mod token;
