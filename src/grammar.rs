/// Tree-sitter grammar resolution by file extension.
use std::path::Path;

use tree_sitter::Language;

use crate::error::Error;

/// Map a file extension to its tree-sitter language.
///
/// Occurrence classification is defined over the Python grammar, so `.py` and
/// `.pyi` are the only indexable units.
///
/// # Errors
///
/// Returns `Error::UnsupportedLanguage` for unknown extensions.
pub fn language_for_path(path: &Path) -> Result<Language, Error> {
    let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

    return match ext {
        "py" | "pyi" => Ok(python()),
        _ => Err(Error::UnsupportedLanguage {
            ext: ext.to_string(),
        }),
    };
}

/// The Python grammar used for every indexed unit.
pub fn python() -> Language {
    return tree_sitter_python::LANGUAGE.into();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_extensions_resolve() {
        assert!(language_for_path(Path::new("pkg/mod.py")).is_ok());
        assert!(language_for_path(Path::new("pkg/stubs.pyi")).is_ok());
    }

    #[test]
    fn other_extensions_are_unsupported() {
        let err = language_for_path(Path::new("src/lib.rs")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage { ref ext } if ext == "rs"));
    }
}
