//! Prompt templates — named text blocks prepended to model calls.
//!
//! Templates are loaded from a directory of `.txt` files. A handful of
//! templates the pipeline cannot work without ship built in and are used
//! whenever the directory does not provide them.
//!
//! Names may be given with or without the `.txt` extension.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MASTER_PROMPT: &str = "master_prompt";
pub const CLASSIFIER_PROMPT: &str = "message_classifier_prompt";
pub const MEDICATION_PROMPT: &str = "medication_data_entry_prompt";
pub const MEDICAL_QUERY_PROMPT: &str = "medical_query_elaboration_prompt";

const PROMPT_EXTENSION: &str = "txt";

/// A source of prompt templates.
pub trait PromptSource: Send + Sync {
    /// Template text for `name`, if known.
    fn get(&self, name: &str) -> Option<String>;

    /// File names of every available template (`<name>.txt`), sorted.
    fn list(&self) -> Vec<String>;

    /// Template text, or an empty string when absent.
    fn get_or_empty(&self, name: &str) -> String {
        self.get(name).unwrap_or_default()
    }
}

/// Directory-backed prompt source with built-in fallbacks.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
    builtins: bool,
}

impl PromptLibrary {
    /// A library reading `dir`, falling back to built-in templates.
    pub fn new(dir: Option<PathBuf>) -> Self {
        if let Some(ref d) = dir
            && !d.is_dir()
        {
            warn!(dir = %d.display(), "Prompt directory does not exist, using built-in prompts");
        }
        Self {
            dir,
            builtins: true,
        }
    }

    /// Built-in templates only.
    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// Only what is on disk; no built-in fallbacks.
    pub fn from_dir_only(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            builtins: false,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn read_file(&self, stem: &str) -> Option<String> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(format!("{stem}.{PROMPT_EXTENSION}"));
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "Loaded prompt");
                Some(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read prompt");
                None
            }
        }
    }
}

/// Strip an optional `.txt` suffix and surrounding whitespace.
pub fn prompt_stem(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(".txt").unwrap_or(name)
}

impl PromptSource for PromptLibrary {
    fn get(&self, name: &str) -> Option<String> {
        let stem = prompt_stem(name);
        if stem.is_empty() || stem.contains(['/', '\\']) || stem.contains("..") {
            return None;
        }
        self.read_file(stem).or_else(|| {
            if self.builtins {
                builtin_prompt(stem).map(str::to_string)
            } else {
                None
            }
        })
    }

    fn list(&self) -> Vec<String> {
        let mut names = BTreeSet::new();

        if let Some(ref dir) = self.dir
            && let Ok(entries) = std::fs::read_dir(dir)
        {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(PROMPT_EXTENSION)
                    && let Some(file) = path.file_name().and_then(|f| f.to_str())
                {
                    names.insert(file.to_string());
                }
            }
        }

        if self.builtins {
            for (stem, _) in BUILTIN_PROMPTS {
                names.insert(format!("{stem}.{PROMPT_EXTENSION}"));
            }
        }

        names.into_iter().collect()
    }
}

fn builtin_prompt(stem: &str) -> Option<&'static str> {
    BUILTIN_PROMPTS
        .iter()
        .find(|(name, _)| *name == stem)
        .map(|(_, text)| *text)
}

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (MASTER_PROMPT, BUILTIN_MASTER),
    (CLASSIFIER_PROMPT, BUILTIN_CLASSIFIER),
    (MEDICATION_PROMPT, BUILTIN_MEDICATION),
    (MEDICAL_QUERY_PROMPT, BUILTIN_MEDICAL_QUERY),
];

const BUILTIN_MASTER: &str = "\
You are a careful health assistant. You give general health information, \
never a diagnosis, and you always recommend professional care for emergencies \
or worsening symptoms. Keep answers clear and concise.";

const BUILTIN_CLASSIFIER: &str = r#"Classify the user's message and answer with a single JSON object and nothing else.

Fields:
- "classification": one of MEDICAL_QUERY, MEDICATION, HEALTH_DATA, ACTIVITY, REPORT, NON_HEALTH
- "parsed": true when the message carries a clear health intent, false otherwise
- "routeTo": the service that should handle it (MedicalQueryService, MedicationService, HealthDataService, ActivityService, ReportService)
- "responseText": a short reply to show the user when "parsed" is false, else ""
- "shouldDeductFromQuota": true when answering will require a model call
- "isFollowUp": true when the message continues an earlier topic
- "followUpDataRequired": what is still missing from the user, or null

[User Context]
{userContext}

[Conversation History]
{messageHistory}"#;

const BUILTIN_MEDICATION: &str = "\
The user is asking about a medication. Explain what it is commonly used for, \
usual dosing ranges, notable side effects and interactions. Remind the user \
to follow their prescriber's instructions.";

const BUILTIN_MEDICAL_QUERY: &str = "\
The user is describing a health concern. Explain possible general causes, \
what information would help narrow it down, and which warning signs mean \
they should seek care promptly. Do not give a diagnosis.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_pipeline_templates() {
        let lib = PromptLibrary::builtin();
        assert!(lib.get(CLASSIFIER_PROMPT).unwrap().contains("JSON"));
        assert!(lib.get("master_prompt.txt").is_some());
        assert!(lib.get("lifestyle_coach").is_none());
        assert_eq!(lib.get_or_empty("lifestyle_coach"), "");
    }

    #[test]
    fn directory_overrides_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("master_prompt.txt"), "custom master").unwrap();
        std::fs::write(dir.path().join("lifestyle_coach.txt"), "coach").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let lib = PromptLibrary::new(Some(dir.path().to_path_buf()));
        assert_eq!(lib.get("master_prompt").unwrap(), "custom master");
        assert_eq!(lib.get("lifestyle_coach.txt").unwrap(), "coach");

        let names = lib.list();
        assert!(names.contains(&"lifestyle_coach.txt".to_string()));
        assert!(names.contains(&"message_classifier_prompt.txt".to_string()));
        assert!(!names.iter().any(|n| n.ends_with(".md")));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn dir_only_has_no_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let lib = PromptLibrary::from_dir_only(dir.path());
        assert!(lib.get(MASTER_PROMPT).is_none());
        assert!(lib.list().is_empty());
    }

    #[test]
    fn rejects_path_traversal() {
        let lib = PromptLibrary::builtin();
        assert!(lib.get("../etc/passwd").is_none());
        assert!(lib.get("").is_none());
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(prompt_stem(" drug_info.txt "), "drug_info");
        assert_eq!(prompt_stem("drug_info"), "drug_info");
    }
}
