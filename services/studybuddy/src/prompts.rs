use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads every `*.md` file in `prompts_path`, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// The templates the tutor needs.
#[derive(Clone, Debug)]
pub struct Prompts {
    pub system_prompt: String,
    pub session_summary: String,
    pub evaluate_answer: String,
}

impl Prompts {
    pub fn load(prompts_path: &Path) -> Result<Self> {
        let mut prompts = load_prompts(prompts_path)?;
        let mut take = |key: &str| {
            prompts
                .remove(key)
                .with_context(|| format!("{}.md not found in prompts directory", key))
        };
        Ok(Self {
            system_prompt: take("system_prompt")?,
            session_summary: take("session_summary")?,
            evaluate_answer: take("evaluate_answer")?,
        })
    }
}
