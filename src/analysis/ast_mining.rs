/// Symbol mining over the compiler's textual AST dump
/// The dump is never parsed. A fixed, ordered table of pattern rules is run
/// over the user module's text and each rule adds or refines entries in a
/// name -> kind map. Rule order matters: later rules only fill names the
/// earlier ones left unclassified, except where noted.
use crate::analysis::lexer::{is_built_in_type, is_keyword};
use crate::analysis::token::SemanticKind;
use crate::config::types::Result;
use log::{debug, info, warn};
use regex::{Captures, Regex};
use std::collections::HashMap;

pub const EXECUTE_MARKER: &str = "Execute:";
pub const ENTRY_MARKER: &str = "(EntryFn";
pub const MODULE_MARKER: &str = "(Module \"";

/// Characters kept when no module block can be identified
pub const TAIL_FALLBACK_CHARS: usize = 2000;

const SYSTEM_MODULE_PREFIXES: [&str; 3] = ["стд::", "sys::", "runtime::"];
const SYSTEM_MODULE_NAMES: [&str; 3] = ["builtin", "core", "system"];

/// Compiler-generated function names that never belong to the user
const INTERNAL_FUNCTION_PREFIXES: [&str; 2] = ["tri_", "sysapi_"];
const INTERNAL_FUNCTION_NAMES: [&str; 4] = ["строка", "кс", "цел64", "ф"];

const MAX_PARAMETER_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub kind: SemanticKind,
    /// Declared type for variables, full import path for imported classes
    pub detail: Option<String>,
}

impl SymbolInfo {
    fn new(kind: SemanticKind) -> Self {
        Self { kind, detail: None }
    }

    fn with_detail(kind: SemanticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}

pub type SymbolMap = HashMap<String, SymbolInfo>;

/// How the user module was found in the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// Last module block before the final execute marker
    BeforeExecute,
    /// Module block holding the entry function
    EntryFunction,
    /// Last module whose name is not a standard/system one
    LastUserModule,
    /// Trailing characters of the dump
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSection<'a> {
    pub text: &'a str,
    pub strategy: LocateStrategy,
}

/// Which text a rule scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    UserSection,
    FullDump,
}

/// Text visible to a rule callback for one match
struct RuleMatch<'a> {
    section: &'a str,
    scanned: &'a str,
    start: usize,
    end: usize,
}

type RuleFn = fn(&RuleMatch<'_>, &Captures<'_>, &mut SymbolMap);

pub struct MiningRule {
    pub name: &'static str,
    pub scope: RuleScope,
    pattern: Regex,
    apply: RuleFn,
}

impl std::fmt::Debug for MiningRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningRule")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl MiningRule {
    /// Run this rule alone over `section` (or `full_dump` for full-dump rules)
    pub fn apply(&self, section: &str, full_dump: &str, symbols: &mut SymbolMap) {
        let scanned = match self.scope {
            RuleScope::UserSection => section,
            RuleScope::FullDump => full_dump,
        };
        for caps in self.pattern.captures_iter(scanned) {
            let Some(whole) = caps.get(0) else { continue };
            let ctx = RuleMatch {
                section,
                scanned,
                start: whole.start(),
                end: whole.end(),
            };
            (self.apply)(&ctx, &caps, symbols);
        }
    }
}

/// Ordered rule table: (name, scope, pattern, callback)
const RULE_TABLE: [(&str, RuleScope, &str, RuleFn); 8] = [
    ("user_function", RuleScope::UserSection, r#"\(Function "([^"]+)" "functype""#, user_function),
    ("import", RuleScope::UserSection, r#"\(Import "([^"]+)""#, import),
    ("typed_variable", RuleScope::UserSection, r#"\(VarDecl "([^"]+)" "([^"]*?)""#, typed_variable),
    ("parameter_reference", RuleScope::UserSection, r#"\(IdentExpr "[^"]+" "([^"]+)"\)"#, parameter_reference),
    ("selector_method", RuleScope::UserSection, r#"\(SelectorExpr "functype" "([^"]+)"\)"#, selector_method),
    (
        "local_call",
        RuleScope::UserSection,
        r#"\(CallExpr "нет результата" \(IdentExpr "functype" RO "([^"]+)"\)"#,
        local_call,
    ),
    ("external_function", RuleScope::FullDump, r#"\(Function "([^"]+)" "functype"[^\(]*External"#, external_function),
    ("variable_usage", RuleScope::UserSection, r#"\(IdentExpr\s+"[^"]*"\s+"([^"]+)"\)"#, variable_usage),
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn function_marker(name: &str) -> String {
    format!("(Function \"{}\" \"functype\"", name)
}

fn is_internal_function(name: &str) -> bool {
    INTERNAL_FUNCTION_PREFIXES.iter().any(|p| name.starts_with(p))
        || INTERNAL_FUNCTION_NAMES.contains(&name)
        || char_len(name) <= 1
}

fn user_function(m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    let rest_of_line = m.scanned[m.end..].split('\n').next().unwrap_or("");
    if rest_of_line.contains("External") || is_internal_function(name) {
        return;
    }
    debug!("Found user function: {}", name);
    symbols.insert(name.to_string(), SymbolInfo::new(SemanticKind::UserFunction));
}

fn import(_m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let path = &caps[1];
    let parts: Vec<&str> = path.split("::").collect();
    if parts.len() < 2 {
        return;
    }
    if let Some(last) = parts.last() {
        debug!("Found imported class: {} from {}", last, path);
        symbols.insert(
            last.to_string(),
            SymbolInfo::with_detail(SemanticKind::ImportedClass, path),
        );
    }
}

fn typed_variable(_m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    if is_keyword(name) || char_len(name) <= 1 {
        return;
    }
    symbols.insert(
        name.to_string(),
        SymbolInfo::with_detail(SemanticKind::UserVariable, &caps[2]),
    );
}

fn parameter_reference(m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    let len = char_len(name);
    let starts_with_letter = name.chars().next().is_some_and(char::is_alphabetic);
    if is_keyword(name)
        || is_built_in_type(name)
        || symbols.contains_key(name)
        || name == "RO"
        || len > MAX_PARAMETER_CHARS
        || !starts_with_letter
    {
        return;
    }
    // A reference to a function defined earlier is not a parameter
    if m.section[..m.start].contains(&function_marker(name)) {
        return;
    }
    symbols.insert(name.to_string(), SymbolInfo::new(SemanticKind::FunctionParameter));
}

fn selector_method(_m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    if symbols.contains_key(name) || is_keyword(name) {
        return;
    }
    symbols.insert(
        name.to_string(),
        SymbolInfo::with_detail(SemanticKind::ImportedFunction, "method"),
    );
}

fn local_call(m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    if symbols.contains_key(name)
        || name.starts_with("std")
        || char_len(name) <= 1
        || is_keyword(name)
    {
        return;
    }
    if m.section.contains(&function_marker(name)) {
        symbols.insert(name.to_string(), SymbolInfo::new(SemanticKind::UserFunction));
    }
}

fn external_function(_m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    let name = &caps[1];
    if !symbols.contains_key(name) {
        symbols.insert(name.to_string(), SymbolInfo::new(SemanticKind::ImportedFunction));
    }
}

fn variable_usage(m: &RuleMatch<'_>, caps: &Captures<'_>, symbols: &mut SymbolMap) {
    // Skip an identifier that closes its enclosing node, e.g. `(IdentExpr ...))`
    if m.scanned[m.end..].trim_start().starts_with(')') {
        return;
    }
    let name = &caps[1];
    if symbols.contains_key(name)
        || is_keyword(name)
        || is_built_in_type(name)
        || char_len(name) <= 1
    {
        return;
    }
    let declared = m.section.contains(&format!("(VarDecl \"{}\"", name))
        || m.section.contains(&format!("= {}", name))
        || m.section.contains(&format!("{} =", name));
    if declared {
        symbols.insert(name.to_string(), SymbolInfo::new(SemanticKind::UserVariable));
    }
}

fn is_system_module(name: &str) -> bool {
    SYSTEM_MODULE_PREFIXES.iter().any(|p| name.starts_with(p)) || SYSTEM_MODULE_NAMES.contains(&name)
}

fn tail(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    match text.char_indices().nth(total - max_chars) {
        Some((cut, _)) => &text[cut..],
        None => text,
    }
}

/// Pure, reusable miner: compiled rule table plus the module locator
#[derive(Debug)]
pub struct AstMiner {
    module_name: Regex,
    rules: Vec<MiningRule>,
}

impl AstMiner {
    pub fn new() -> Result<Self> {
        let mut rules = Vec::with_capacity(RULE_TABLE.len());
        for (name, scope, pattern, apply) in RULE_TABLE {
            rules.push(MiningRule {
                name,
                scope,
                pattern: Regex::new(pattern)?,
                apply,
            });
        }
        Ok(Self {
            module_name: Regex::new(r#"\(Module "([^"]+)""#)?,
            rules,
        })
    }

    pub fn rules(&self) -> &[MiningRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&MiningRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Find the user-authored module inside a full dump
    pub fn locate_user_section<'a>(&self, ast: &'a str) -> UserSection<'a> {
        if let Some(execute) = ast.rfind(EXECUTE_MARKER).filter(|&i| i > 0) {
            if let Some(start) = ast[..execute].rfind(MODULE_MARKER) {
                return UserSection {
                    text: ast[start..execute].trim(),
                    strategy: LocateStrategy::BeforeExecute,
                };
            }
        }

        if let Some(entry) = ast.find(ENTRY_MARKER) {
            if let Some(start) = ast[..entry].rfind(MODULE_MARKER) {
                let end = ast[entry..]
                    .find(EXECUTE_MARKER)
                    .map_or(ast.len(), |offset| entry + offset);
                return UserSection {
                    text: ast[start..end].trim(),
                    strategy: LocateStrategy::EntryFunction,
                };
            }
        }

        let last_user_module = self
            .module_name
            .captures_iter(ast)
            .filter(|caps| !is_system_module(&caps[1]))
            .filter_map(|caps| caps.get(0).map(|m| m.start()))
            .last();
        if let Some(start) = last_user_module {
            let end = ast[start..]
                .find(EXECUTE_MARKER)
                .map_or(ast.len(), |offset| start + offset);
            return UserSection {
                text: ast[start..end].trim(),
                strategy: LocateStrategy::LastUserModule,
            };
        }

        warn!("Could not identify user module, using last {} characters", TAIL_FALLBACK_CHARS);
        UserSection {
            text: tail(ast, TAIL_FALLBACK_CHARS),
            strategy: LocateStrategy::Tail,
        }
    }

    /// Build the symbol map for one dump
    pub fn mine(&self, ast: &str) -> SymbolMap {
        let section = self.locate_user_section(ast);
        if section.text.is_empty() {
            warn!("User module section is empty; no symbols mined");
            return SymbolMap::new();
        }
        info!(
            "User section located via {:?} ({} chars of {})",
            section.strategy,
            section.text.chars().count(),
            ast.chars().count()
        );
        self.mine_section(section.text, ast)
    }

    /// Run every rule in order over an already located section
    pub fn mine_section(&self, section: &str, full_dump: &str) -> SymbolMap {
        let mut symbols = SymbolMap::new();
        for rule in &self.rules {
            let before = symbols.len();
            rule.apply(section, full_dump, &mut symbols);
            debug!("Rule {} added {} symbols", rule.name, symbols.len() - before);
        }
        info!("AST mining found {} semantic entries", symbols.len());
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"(Module "стд::вывод"
  (Function "ф" "functype" External)
  (Function "цел" "functype" External)
)
(Module "sample_42"
  (Import "стд::вывод")
  (Function "сумма" "functype"
    (Params (Param "икс" "Цел64") (Param "игрек" "Цел64"))
    (Return (BinaryExpr "+" (IdentExpr "Цел64" "икс") (IdentExpr "Цел64" "игрек"))))
  (EntryFn
    (VarDecl "итог" "Цел64" (CallExpr "Цел64" (IdentExpr "functype" RO "сумма")))
    (CallExpr "нет результата" (SelectorExpr "functype" "ф") (IdentExpr "Цел64" "итог")))
)
Execute: sample_42
"#;

    fn miner() -> AstMiner {
        AstMiner::new().unwrap()
    }

    fn run_rule(name: &str, section: &str) -> SymbolMap {
        let mut symbols = SymbolMap::new();
        miner().rule(name).unwrap().apply(section, section, &mut symbols);
        symbols
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let names: Vec<&str> = miner().rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "user_function",
                "import",
                "typed_variable",
                "parameter_reference",
                "selector_method",
                "local_call",
                "external_function",
                "variable_usage"
            ]
        );
    }

    #[test]
    fn test_locate_before_execute() {
        let section = miner().locate_user_section(DUMP);
        assert_eq!(section.strategy, LocateStrategy::BeforeExecute);
        assert!(section.text.starts_with("(Module \"sample_42\""));
        assert!(!section.text.contains("Execute:"));
    }

    #[test]
    fn test_locate_entry_function() {
        let dump = "(Module \"стд::вывод\")\n(Module \"m\"\n (EntryFn))\n";
        let section = miner().locate_user_section(dump);
        assert_eq!(section.strategy, LocateStrategy::EntryFunction);
        assert_eq!(section.text, "(Module \"m\"\n (EntryFn))");
    }

    #[test]
    fn test_locate_last_user_module() {
        let dump = "(Module \"мой\" (x))\n(Module \"стд::вывод\" (y))\n(Module \"core\")";
        let section = miner().locate_user_section(dump);
        assert_eq!(section.strategy, LocateStrategy::LastUserModule);
        assert!(section.text.starts_with("(Module \"мой\""));
    }

    #[test]
    fn test_locate_tail_fallback() {
        let dump = "я".repeat(2500);
        let section = miner().locate_user_section(&dump);
        assert_eq!(section.strategy, LocateStrategy::Tail);
        assert_eq!(section.text.chars().count(), TAIL_FALLBACK_CHARS);
    }

    #[test]
    fn test_execute_at_start_is_ignored() {
        let dump = "Execute: x\n(Module \"m\"\n (EntryFn))";
        let section = miner().locate_user_section(dump);
        assert_eq!(section.strategy, LocateStrategy::EntryFunction);
    }

    #[test]
    fn test_user_function_excludes_internal_and_external() {
        let section = "(Function \"сумма\" \"functype\"\n(Function \"tri_init\" \"functype\"\n(Function \"ф\" \"functype\"\n(Function \"печать\" \"functype\" External)";
        let symbols = run_rule("user_function", section);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols["сумма"].kind, SemanticKind::UserFunction);
    }

    #[test]
    fn test_import_maps_last_segment() {
        let symbols = run_rule("import", "(Import \"стд::вывод\") (Import \"одиночный\")");
        assert_eq!(symbols.len(), 1);
        assert_eq!(
            symbols["вывод"],
            SymbolInfo::with_detail(SemanticKind::ImportedClass, "стд::вывод")
        );
    }

    #[test]
    fn test_typed_variable_keeps_type() {
        let symbols = run_rule("typed_variable", "(VarDecl \"итог\" \"Цел64\") (VarDecl \"х\" \"Цел64\")");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols["итог"].detail.as_deref(), Some("Цел64"));
    }

    #[test]
    fn test_parameter_reference_bounds() {
        let section = "(IdentExpr \"Цел64\" \"икс\") (IdentExpr \"functype\" \"очень_длинное_имя\") (IdentExpr \"Цел64\" \"Строка\") (IdentExpr \"Цел64\" \"_x\")";
        let symbols = run_rule("parameter_reference", section);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols["икс"].kind, SemanticKind::FunctionParameter);
    }

    #[test]
    fn test_parameter_reference_skips_defined_function() {
        let section = "(Function \"шаг\" \"functype\") (IdentExpr \"functype\" \"шаг\")";
        assert!(run_rule("parameter_reference", section).is_empty());
    }

    #[test]
    fn test_local_call_requires_definition() {
        let call = "(CallExpr \"нет результата\" (IdentExpr \"functype\" RO \"шаг\"))";
        assert!(run_rule("local_call", call).is_empty());

        let with_def = format!("(Function \"шаг\" \"functype\")\n{}", call);
        let symbols = run_rule("local_call", &with_def);
        assert_eq!(symbols["шаг"].kind, SemanticKind::UserFunction);
    }

    #[test]
    fn test_external_function_scans_full_dump() {
        let mut symbols = SymbolMap::new();
        let m = miner();
        let rule = m.rule("external_function").unwrap();
        rule.apply("", DUMP, &mut symbols);
        assert_eq!(symbols["ф"].kind, SemanticKind::ImportedFunction);
        assert_eq!(symbols["цел"].kind, SemanticKind::ImportedFunction);
    }

    #[test]
    fn test_variable_usage_needs_declaration_and_no_close() {
        let section = "пусть итог = 1 (IdentExpr \"Цел64\" \"итог\") (X (IdentExpr \"Цел64\" \"счёт\"))";
        let symbols = run_rule("variable_usage", section);
        assert_eq!(symbols.len(), 1);
        assert!(symbols.contains_key("итог"));

        let closing = "(VarDecl \"итог\" \"Цел64\") (X (IdentExpr \"Цел64\" \"итог\"))";
        assert!(run_rule("variable_usage", closing).is_empty());
    }

    #[test]
    fn test_mine_full_dump() {
        let symbols = miner().mine(DUMP);
        assert_eq!(symbols["сумма"].kind, SemanticKind::UserFunction);
        assert_eq!(symbols["вывод"].kind, SemanticKind::ImportedClass);
        assert_eq!(symbols["итог"].kind, SemanticKind::UserVariable);
        assert_eq!(symbols["икс"].kind, SemanticKind::FunctionParameter);
        assert_eq!(symbols["игрек"].kind, SemanticKind::FunctionParameter);
        assert_eq!(symbols["ф"].kind, SemanticKind::ImportedFunction);
        assert_eq!(symbols["цел"].kind, SemanticKind::ImportedFunction);
    }

    #[test]
    fn test_mine_is_pure() {
        let miner = miner();
        assert_eq!(miner.mine(DUMP), miner.mine(DUMP));
        assert!(miner.mine("").is_empty());
    }
}
