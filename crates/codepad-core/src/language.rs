//! Supported languages and their file-naming conventions.

use crate::errors::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static PUBLIC_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"public\s+class\s+(\w+)").expect("public class pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    C,
    Cpp,
    Java,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Python, Language::C, Language::Cpp, Language::Java];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Runner image used by the containerized backend.
    pub fn container_image(&self) -> &'static str {
        match self {
            Language::Python => "python-runner",
            Language::C => "c-runner",
            Language::Cpp => "cpp-runner",
            Language::Java => "java-runner",
        }
    }

    /// Host executables the native backend needs for this language.
    pub fn toolchain(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["python3"],
            Language::C => &["gcc"],
            Language::Cpp => &["g++"],
            Language::Java => &["javac", "java"],
        }
    }

    /// Source file name for the submission.
    ///
    /// Java requires the file to be named after its public class, so the class name is
    /// extracted from the source and a missing declaration is a `MalformedSource` error.
    pub fn source_file_name(&self, source: &str) -> Result<String, EngineError> {
        match self {
            Language::Python => Ok("main.py".to_string()),
            Language::C => Ok("main.c".to_string()),
            Language::Cpp => Ok("main.cpp".to_string()),
            Language::Java => {
                let class_name = extract_public_class(source)?;
                Ok(format!("{}.java", class_name))
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(Language::Python),
            "c" => Ok(Language::C),
            "cpp" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            other => Err(EngineError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Returns the identifier of the first `public class <Identifier>` declaration.
pub fn extract_public_class(source: &str) -> Result<String, EngineError> {
    PUBLIC_CLASS
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            EngineError::MalformedSource(
                "Java code must contain a `public class` declaration".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_languages() {
        for lang in Language::ALL {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "rust".parse::<Language>().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedLanguage(ref l) if l == "rust"));
        // identifiers are case sensitive on the wire
        assert!("Python".parse::<Language>().is_err());
    }

    #[test]
    fn extracts_public_class_name() {
        let src = "import java.util.*;\n\npublic   class\tSolution {\n  public static void main(String[] a) {}\n}";
        assert_eq!(extract_public_class(src).unwrap(), "Solution");
    }

    #[test]
    fn first_public_class_wins() {
        let src = "public class First {}\npublic class Second {}";
        assert_eq!(extract_public_class(src).unwrap(), "First");
    }

    #[test]
    fn missing_public_class_is_malformed() {
        let src = "class Main { public static void main(String[] a) {} }";
        let err = extract_public_class(src).unwrap_err();
        assert!(matches!(err, EngineError::MalformedSource(_)));
    }

    #[test]
    fn source_file_names_follow_conventions() {
        assert_eq!(Language::Python.source_file_name("").unwrap(), "main.py");
        assert_eq!(Language::C.source_file_name("").unwrap(), "main.c");
        assert_eq!(Language::Cpp.source_file_name("").unwrap(), "main.cpp");
        assert_eq!(
            Language::Java.source_file_name("public class Hello {}").unwrap(),
            "Hello.java"
        );
    }

    #[test]
    fn image_table_is_static() {
        assert_eq!(Language::Python.container_image(), "python-runner");
        assert_eq!(Language::C.container_image(), "c-runner");
        assert_eq!(Language::Cpp.container_image(), "cpp-runner");
        assert_eq!(Language::Java.container_image(), "java-runner");
    }
}
