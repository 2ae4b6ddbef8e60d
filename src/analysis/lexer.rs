/// Two-pass static lexer for Trivil snippets
/// Pass one collects declared names across the whole document, pass two
/// emits positioned tokens line by line. Neither pass can fail on any input.
use crate::analysis::token::{Token, TokenKind};
use crate::config::types::Result;
use log::debug;
use regex::Regex;
use std::collections::HashSet;

pub const KEYWORDS: [&str; 26] = [
    "модуль", "импорт", "вход", "пусть", "если", "иначе", "пока", "для", "фн", "функция", "класс",
    "тип", "константа", "переменная", "возврат", "вернуть", "прервать", "продолжить", "выбор",
    "случай", "умолчание", "и", "или", "не", "истина", "ложь",
];

pub const BUILT_IN_TYPES: [&str; 8] = [
    "Цел64", "Слово64", "Вещ64", "Лог", "Строка", "Символ", "Байт", "Пусто",
];

/// No built-in functions are recognized yet
pub const BUILT_IN_FUNCTIONS: [&str; 0] = [];

const IDENT: &str = "[а-яёА-ЯЁa-zA-Z_][а-яёА-ЯЁa-zA-Z0-9_-]*";

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_built_in_type(word: &str) -> bool {
    BUILT_IN_TYPES.contains(&word)
}

/// Static classification of a name with no declaration context
pub fn classify_word(word: &str) -> TokenKind {
    if is_keyword(word) {
        TokenKind::Keyword
    } else if is_built_in_type(word) {
        TokenKind::BuiltInType
    } else if BUILT_IN_FUNCTIONS.contains(&word) {
        TokenKind::BuiltInFunction
    } else {
        TokenKind::Identifier
    }
}

/// Names declared anywhere in the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredNames {
    pub functions: HashSet<String>,
    pub parameters: HashSet<String>,
    pub variables: HashSet<String>,
}

/// Byte offset to character column for one line
struct ColumnIndex {
    starts: Vec<usize>,
    len: usize,
}

impl ColumnIndex {
    fn new(line: &str) -> Self {
        Self {
            starts: line.char_indices().map(|(i, _)| i).collect(),
            len: line.len(),
        }
    }

    fn column(&self, byte: usize) -> usize {
        if byte >= self.len {
            return self.starts.len();
        }
        match self.starts.binary_search(&byte) {
            Ok(col) | Err(col) => col,
        }
    }
}

fn in_ranges(pos: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(start, end)| pos >= start && pos < end)
}

#[derive(Debug, Clone)]
pub struct LexicalAnalyzer {
    string: Regex,
    number: Regex,
    identifier: Regex,
    operator: Regex,
    function_decl: Regex,
    param_group: Regex,
    param_name: Regex,
    let_decl: Regex,
    assignment: Regex,
}

impl LexicalAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            string: Regex::new(r#""(?:[^"\\]|\\.)*""#)?,
            number: Regex::new(r"\b[0-9]+(?:\.[0-9]+)?\b")?,
            identifier: Regex::new(IDENT)?,
            operator: Regex::new(r"[+\-*/=<>!&|^%:;,.()\[\]{}]")?,
            function_decl: Regex::new(&format!(r"фн\s+({})\s*\(", IDENT))?,
            param_group: Regex::new(r"\(([^)]+)\)")?,
            param_name: Regex::new(&format!(r"({})\s*:", IDENT))?,
            let_decl: Regex::new(&format!(r"пусть\s+({})\s*=", IDENT))?,
            assignment: Regex::new(&format!(r"({})\s*=\s*[^=]", IDENT))?,
        })
    }

    /// Tokenize `source`. Within a line, tokens come grouped by category
    /// (comment, strings, numbers, identifiers, operators); use
    /// [`sort_by_position`](crate::analysis::token::sort_by_position) for
    /// strict document order.
    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        let names = self.collect_declarations(source);
        debug!(
            "Declarations: functions {:?}, parameters {:?}, variables {:?}",
            names.functions, names.parameters, names.variables
        );

        source
            .split('\n')
            .enumerate()
            .flat_map(|(line_no, line)| self.line_tokens(line, line_no, &names))
            .collect()
    }

    /// Pass one over every line of the document
    pub fn collect_declarations(&self, source: &str) -> DeclaredNames {
        let mut names = DeclaredNames::default();

        for line in source.split('\n') {
            self.scan_signatures(line, &mut names.functions, &mut names.parameters);

            for caps in self.let_decl.captures_iter(line) {
                names.variables.insert(caps[1].to_string());
            }
            for caps in self.assignment.captures_iter(line) {
                let name = &caps[1];
                if !is_keyword(name) && !is_built_in_type(name) {
                    names.variables.insert(name.to_string());
                }
            }
        }

        names
    }

    /// Function names and `name:` parameters inside parenthesized groups
    fn scan_signatures(
        &self,
        line: &str,
        functions: &mut HashSet<String>,
        parameters: &mut HashSet<String>,
    ) {
        for caps in self.function_decl.captures_iter(line) {
            functions.insert(caps[1].to_string());
        }
        for group in self.param_group.captures_iter(line) {
            for caps in self.param_name.captures_iter(&group[1]) {
                parameters.insert(caps[1].to_string());
            }
        }
    }

    fn line_tokens(&self, full_line: &str, line_no: usize, names: &DeclaredNames) -> Vec<Token> {
        let columns = ColumnIndex::new(full_line);
        let token = |start: usize, end: usize, kind: TokenKind, text: &str| {
            Token::on_line(line_no, columns.column(start), columns.column(end), kind, text)
        };
        let mut tokens = Vec::new();

        // Everything from the first `//` on is a comment, even inside a string
        let line = match full_line.find("//") {
            Some(start) => {
                tokens.push(token(start, full_line.len(), TokenKind::Comment, &full_line[start..]));
                &full_line[..start]
            }
            None => full_line,
        };

        let mut strings = Vec::new();
        for m in self.string.find_iter(line) {
            strings.push((m.start(), m.end()));
            tokens.push(token(m.start(), m.end(), TokenKind::StringLiteral, m.as_str()));
        }

        for m in self.number.find_iter(line) {
            if !in_ranges(m.start(), &strings) {
                tokens.push(token(m.start(), m.end(), TokenKind::NumberLiteral, m.as_str()));
            }
        }

        let mut local_functions = HashSet::new();
        let mut local_parameters = HashSet::new();
        self.scan_signatures(line, &mut local_functions, &mut local_parameters);

        for m in self.identifier.find_iter(line) {
            if in_ranges(m.start(), &strings) {
                continue;
            }
            let word = m.as_str();
            let kind = if local_functions.contains(word) || names.functions.contains(word) {
                TokenKind::UserFunction
            } else if local_parameters.contains(word) || names.parameters.contains(word) {
                TokenKind::Parameter
            } else if names.variables.contains(word) {
                TokenKind::UserVariable
            } else {
                classify_word(word)
            };
            tokens.push(token(m.start(), m.end(), kind, word));
        }

        for m in self.operator.find_iter(line) {
            if !in_ranges(m.start(), &strings) {
                tokens.push(token(m.start(), m.end(), TokenKind::Operator, m.as_str()));
            }
        }

        tokens
    }
}
