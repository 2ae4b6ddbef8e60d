/// Positioned tokens produced by the analysis pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token classification.
///
/// The first group is produced by the static pass; the second only appears
/// after semantic enhancement. Wire names are what the editor expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "KEYWORD")]
    Keyword,
    #[serde(rename = "IDENTIFIER")]
    Identifier,
    #[serde(rename = "BUILT_IN_TYPE")]
    BuiltInType,
    #[serde(rename = "BUILT_IN_FUNCTION")]
    BuiltInFunction,
    #[serde(rename = "STRING_LITERAL")]
    StringLiteral,
    #[serde(rename = "NUMBER_LITERAL")]
    NumberLiteral,
    #[serde(rename = "COMMENT")]
    Comment,
    #[serde(rename = "OPERATOR")]
    Operator,
    #[serde(rename = "function.user")]
    UserFunction,
    #[serde(rename = "variable.parameter")]
    Parameter,
    #[serde(rename = "variable.user")]
    UserVariable,

    #[serde(rename = "class.imported")]
    ImportedClass,
    #[serde(rename = "function.imported")]
    ImportedFunction,
    /// Keyword confirmed during enhancement
    #[serde(rename = "keyword")]
    ResolvedKeyword,
    /// Core type name confirmed during enhancement
    #[serde(rename = "type.builtin")]
    ResolvedBuiltInType,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "KEYWORD",
            Self::Identifier => "IDENTIFIER",
            Self::BuiltInType => "BUILT_IN_TYPE",
            Self::BuiltInFunction => "BUILT_IN_FUNCTION",
            Self::StringLiteral => "STRING_LITERAL",
            Self::NumberLiteral => "NUMBER_LITERAL",
            Self::Comment => "COMMENT",
            Self::Operator => "OPERATOR",
            Self::UserFunction => "function.user",
            Self::Parameter => "variable.parameter",
            Self::UserVariable => "variable.user",
            Self::ImportedClass => "class.imported",
            Self::ImportedFunction => "function.imported",
            Self::ResolvedKeyword => "keyword",
            Self::ResolvedBuiltInType => "type.builtin",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol classification mined from the AST dump
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SemanticKind {
    UserFunction,
    UserVariable,
    FunctionParameter,
    ImportedClass,
    ImportedFunction,
}

impl SemanticKind {
    /// Token kind a matching token is rewritten to
    pub fn token_kind(self) -> TokenKind {
        match self {
            Self::UserFunction => TokenKind::UserFunction,
            Self::UserVariable => TokenKind::UserVariable,
            Self::FunctionParameter => TokenKind::Parameter,
            Self::ImportedClass => TokenKind::ImportedClass,
            Self::ImportedFunction => TokenKind::ImportedFunction,
        }
    }
}

/// Zero-based, end-exclusive span of one line. Columns count characters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub kind: TokenKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_tag: Option<SemanticKind>,
}

impl Token {
    pub fn on_line(line: usize, start_column: usize, end_column: usize, kind: TokenKind, text: &str) -> Self {
        Self {
            start_line: line,
            start_column,
            end_line: line,
            end_column,
            kind,
            text: text.to_string(),
            semantic_tag: None,
        }
    }

    /// `start < end` in (line, column) order
    pub fn is_well_formed(&self) -> bool {
        self.start_line < self.end_line
            || (self.start_line == self.end_line && self.start_column < self.end_column)
    }
}

/// Re-sort a category-ordered stream into strict document order.
/// Stable, so tokens sharing a start keep their category order.
pub fn sort_by_position(tokens: &mut [Token]) {
    tokens.sort_by(|a, b| {
        (a.start_line, a.start_column, a.end_line, a.end_column)
            .cmp(&(b.start_line, b.start_column, b.end_line, b.end_column))
    });
}
