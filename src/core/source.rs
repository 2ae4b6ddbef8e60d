/// Sanitized snippet text
use chrono::Utc;

/// Header every Trivil file has to start with
pub const MODULE_KEYWORD: &str = "модуль ";

/// Standard-library facilities imported automatically when the body mentions them
pub const AUTO_IMPORTS: [(&str, &str); 3] = [
    ("вывод", "стд::вывод"),
    ("ввод", "стд::ввод"),
    ("файл", "стд::файл"),
];

/// Strip NUL bytes and normalize CRLF and lone CR line endings to LF
pub fn sanitize(raw: &str) -> String {
    raw.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n")
}

/// Immutable snippet text for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    text: String,
}

impl SourceUnit {
    /// Source for the compiler: surrounding whitespace trimmed, then sanitized
    pub fn for_compile(raw: &str) -> Self {
        Self {
            text: sanitize(raw.trim()),
        }
    }

    /// Source for analysis keeps leading lines so token positions match the editor
    pub fn for_analysis(raw: &str) -> Self {
        Self {
            text: sanitize(raw),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn declares_module(&self) -> bool {
        self.text.trim_start().starts_with(MODULE_KEYWORD)
    }

    /// The text as a complete module, adding a generated header and the
    /// standard imports the body refers to when it does not declare one.
    pub fn wrapped_in_module(&self) -> String {
        self.wrapped_in_module_named(&sample_module_name())
    }

    pub fn wrapped_in_module_named(&self, module_name: &str) -> String {
        if self.declares_module() {
            return self.text.clone();
        }

        let mut wrapped = String::with_capacity(self.text.len() + 128);
        wrapped.push_str(MODULE_KEYWORD);
        wrapped.push_str(module_name);
        wrapped.push_str("\n\n");

        for (facility, path) in AUTO_IMPORTS {
            if self.text.contains(facility) {
                wrapped.push_str(&format!("импорт \"{}\"\n\n", path));
            }
        }

        wrapped.push_str(&self.text);
        wrapped
    }
}

/// `sample_<n>` with n drawn from the wall clock
pub fn sample_module_name() -> String {
    format!("sample_{}", Utc::now().timestamp_millis().rem_euclid(10_000))
}
