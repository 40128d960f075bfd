//! System prompt templates
//!
//! Built-in prompt fragments are markdown files loaded once at startup.
//! The system prompt sent with every turn is assembled from them in a fixed
//! order: common, code, memory, research.

use std::path::Path;

/// Built-in fragment file names, in assembly order
pub const COMMON_PROMPT_FILE: &str = "common.markdown.md";
pub const CODE_PROMPT_FILE: &str = "agent.code.md";
pub const MEMORY_PROMPT_FILE: &str = "agent.memory.md";
pub const RESEARCH_PROMPT_FILE: &str = "agent.research.md";

/// A user-supplied prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTemplate {
    /// File name of the template
    pub name: String,
    /// Template text
    pub content: String,
}

/// Prompt fragments available to the turn orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplates {
    pub common: String,
    pub agent_code: String,
    pub agent_memory: String,
    pub agent_research: String,
    /// Extra templates found in the user prompt directory, sorted by name
    pub user_templates: Vec<UserTemplate>,
}

impl PromptTemplates {
    /// Load fragments from the built-in and user prompt directories
    ///
    /// Missing files read as empty fragments and a missing user directory
    /// yields no user templates; loading never fails.
    pub async fn load(builtin_dir: &Path, user_dir: &Path) -> Self {
        let templates = Self {
            common: read_fragment(builtin_dir, COMMON_PROMPT_FILE).await,
            agent_code: read_fragment(builtin_dir, CODE_PROMPT_FILE).await,
            agent_memory: read_fragment(builtin_dir, MEMORY_PROMPT_FILE).await,
            agent_research: read_fragment(builtin_dir, RESEARCH_PROMPT_FILE).await,
            user_templates: read_user_templates(user_dir).await,
        };

        tracing::info!(
            "Loaded prompt templates from {} ({} user template(s))",
            builtin_dir.display(),
            templates.user_templates.len()
        );
        templates
    }

    /// Builds the system prompt for a turn
    ///
    /// Non-empty fragments are joined with a blank line.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::prompts::PromptTemplates;
    ///
    /// let templates = PromptTemplates {
    ///     common: "Be concise.".to_string(),
    ///     agent_research: "Cite sources.".to_string(),
    ///     ..PromptTemplates::default()
    /// };
    /// assert_eq!(templates.build_system_prompt(), "Be concise.\n\nCite sources.");
    /// ```
    pub fn build_system_prompt(&self) -> String {
        [
            &self.common,
            &self.agent_code,
            &self.agent_memory,
            &self.agent_research,
        ]
        .into_iter()
        .filter(|fragment| !fragment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

async fn read_fragment(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Prompt fragment {} unavailable: {}", path.display(), e);
            String::new()
        }
    }
}

async fn read_user_templates(dir: &Path) -> Vec<UserTemplate> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut templates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => templates.push(UserTemplate {
                name: entry.file_name().to_string_lossy().into_owned(),
                content,
            }),
            Err(e) => tracing::warn!("Skipping prompt template {}: {}", path.display(), e),
        }
    }

    templates.sort_by(|a, b| a.name.cmp(&b.name));
    templates
}
