// Generator variants - one configuration bundle per target language

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::error::Result;
use crate::domain::job::PackageName;
use crate::domain::layout::OUTPUT_DIR;
use crate::domain::options::JobOptions;

/// Supported target languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    TypeScript,
    Python,
    Java,
    Go,
    Ruby,
    CSharp,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 6] = [
        TargetLanguage::TypeScript,
        TargetLanguage::Python,
        TargetLanguage::Java,
        TargetLanguage::Go,
        TargetLanguage::Ruby,
        TargetLanguage::CSharp,
    ];

    /// Fallback for unknown identifiers.
    ///
    /// Unknown languages are not an error: they generate a TypeScript SDK.
    pub const FALLBACK: TargetLanguage = TargetLanguage::TypeScript;

    /// Look up a known identifier or alias (case-insensitive)
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" | "node" => Some(TargetLanguage::TypeScript),
            "python" | "py" => Some(TargetLanguage::Python),
            "java" => Some(TargetLanguage::Java),
            "go" | "golang" => Some(TargetLanguage::Go),
            "ruby" | "rb" => Some(TargetLanguage::Ruby),
            "csharp" | "cs" | "c#" | "dotnet" => Some(TargetLanguage::CSharp),
            _ => None,
        }
    }

    /// Resolve an identifier, applying the TypeScript fallback.
    ///
    /// Returns the language and whether the fallback was taken.
    pub fn resolve(id: &str) -> (Self, bool) {
        match Self::from_identifier(id) {
            Some(language) => (language, false),
            None => (Self::FALLBACK, true),
        }
    }

    /// Canonical identifier, also used as the generator group name
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLanguage::TypeScript => "typescript",
            TargetLanguage::Python => "python",
            TargetLanguage::Java => "java",
            TargetLanguage::Go => "go",
            TargetLanguage::Ruby => "ruby",
            TargetLanguage::CSharp => "csharp",
        }
    }

    /// Pinned generator for this language
    pub fn variant(&self) -> GeneratorVariant {
        match self {
            TargetLanguage::TypeScript => {
                GeneratorVariant::new(*self, "fernapi/fern-typescript-node-sdk", "0.39.3")
            }
            TargetLanguage::Python => {
                GeneratorVariant::new(*self, "fernapi/fern-python-sdk", "4.3.8")
            }
            TargetLanguage::Java => GeneratorVariant::new(*self, "fernapi/fern-java-sdk", "2.2.0"),
            TargetLanguage::Go => GeneratorVariant::new(*self, "fernapi/fern-go-sdk", "0.28.3"),
            TargetLanguage::Ruby => GeneratorVariant::new(*self, "fernapi/fern-ruby-sdk", "0.8.2"),
            TargetLanguage::CSharp => {
                GeneratorVariant::new(*self, "fernapi/fern-csharp-sdk", "1.9.11")
            }
        }
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorVariant {
    pub language: TargetLanguage,
    /// External generator package reference
    pub generator: &'static str,
    /// Pinned generator version
    pub version: &'static str,
}

impl GeneratorVariant {
    const fn new(language: TargetLanguage, generator: &'static str, version: &'static str) -> Self {
        Self {
            language,
            generator,
            version,
        }
    }

    /// Output location relative to the workspace root (`sdks/<language>`)
    pub fn output_subpath(&self) -> PathBuf {
        PathBuf::from(OUTPUT_DIR).join(self.language.as_str())
    }
}

/// Fully resolved generator configuration for one generate job
///
/// Exactly one variant is active per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorConfig {
    /// Identifier as the caller sent it
    pub requested_language: String,
    /// True when `requested_language` was unknown and TypeScript was chosen
    pub fell_back: bool,
    pub variant: GeneratorVariant,
    pub package_name: PackageName,
    pub include_examples: bool,
    pub include_tests: bool,
    /// Caller options forwarded verbatim to the generator
    pub extra: BTreeMap<String, String>,
}

impl GeneratorConfig {
    /// Select the variant and resolve toggles
    ///
    /// # Errors
    /// - `DomainError::ValidationError` if a toggle is not a boolean
    pub fn resolve(
        requested_language: &str,
        package_name: PackageName,
        options: &JobOptions,
    ) -> Result<Self> {
        let (language, fell_back) = TargetLanguage::resolve(requested_language);
        if fell_back {
            tracing::warn!(
                requested = %requested_language,
                fallback = %language,
                "Unknown target language, using fallback generator"
            );
        }

        Ok(Self {
            requested_language: requested_language.to_string(),
            fell_back,
            variant: language.variant(),
            package_name,
            include_examples: options.include_examples()?,
            include_tests: options.include_tests()?,
            extra: options.passthrough(),
        })
    }

    pub fn language(&self) -> TargetLanguage {
        self.variant.language
    }

    /// Generator group the tool is scoped to
    pub fn group(&self) -> &'static str {
        self.variant.language.as_str()
    }

    pub fn output_subpath(&self) -> PathBuf {
        self.variant.output_subpath()
    }

    /// `<package>-<language>-sdk.<ext>`
    pub fn archive_file_name(&self, extension: &str) -> String {
        format!(
            "{}-{}-sdk.{}",
            self.package_name,
            self.variant.language.as_str(),
            extension
        )
    }
}
