//! Catalog of the models onboarding knows how to describe.
//!
//! The backend owns the actual files; the screens only need names and sizes
//! to label the download cards before the first progress event arrives.

/// Speech-to-text model downloaded during onboarding.
pub const TRANSCRIPTION_MODEL: &str = "parakeet-tdt-0.6b-v3-int8";

/// Summary model used until the backend recommends another one.
pub const DEFAULT_SUMMARY_MODEL: &str = "gemma3:1b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Transcription,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    /// Backend identifier, e.g. "gemma3:1b".
    pub name: &'static str,
    pub display_name: &'static str,
    pub role: ModelRole,
    pub size_mb: u64,
}

impl ModelDef {
    /// Approximate on-disk size, e.g. "~806 MB" or "~2.5 GB".
    pub fn size_label(&self) -> String {
        size_label(self.size_mb)
    }
}

pub fn available_models() -> Vec<ModelDef> {
    vec![
        ModelDef {
            name: TRANSCRIPTION_MODEL,
            display_name: "Parakeet TDT 0.6B v3",
            role: ModelRole::Transcription,
            size_mb: 670,
        },
        ModelDef {
            name: "gemma3:1b",
            display_name: "Gemma 3 1B (Fast)",
            role: ModelRole::Summary,
            size_mb: 806,
        },
        ModelDef {
            name: "gemma3:4b",
            display_name: "Gemma 3 4B (Balanced)",
            role: ModelRole::Summary,
            size_mb: 2550,
        },
        ModelDef {
            name: "mistral:7b",
            display_name: "Mistral 7B v0.3 (High-Quality)",
            role: ModelRole::Summary,
            size_mb: 4368,
        },
    ]
}

pub fn model_by_name(name: &str) -> Option<ModelDef> {
    available_models().into_iter().find(|m| m.name == name)
}

/// Catalog size for `name`, falling back to the default summary model's size
/// for identifiers the catalog does not know.
pub fn size_mb_or_default(name: &str) -> u64 {
    model_by_name(name)
        .or_else(|| model_by_name(DEFAULT_SUMMARY_MODEL))
        .map(|m| m.size_mb)
        .unwrap_or(0)
}

/// Human name for `name`, or the identifier itself when uncataloged.
pub fn display_name(name: &str) -> String {
    model_by_name(name)
        .map(|m| m.display_name.to_string())
        .unwrap_or_else(|| name.to_string())
}

pub fn size_label(size_mb: u64) -> String {
    if size_mb >= 1000 {
        format!("~{:.1} GB", size_mb as f64 / 1024.0)
    } else {
        format!("~{size_mb} MB")
    }
}
