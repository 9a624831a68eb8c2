//! Prompt loader for YAML prompt definitions.
//!
//! Built-in prompts ship inside the binary. A file named `<id>.yml` in the
//! prompts directory replaces the built-in with the same id.

use crate::types::PromptDefinition;
use roleflow_core::{AppError, AppResult};
use std::path::Path;

/// Id of the prompt used to synthesize answers from retrieved passages.
pub const CONSOLIDATED_PROMPT_ID: &str = "rag.consolidated";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[(
    CONSOLIDATED_PROMPT_ID,
    include_str!("../prompts/rag.consolidated.yml"),
)];

/// Load a prompt definition by ID from a prompts directory.
///
/// This function looks for a file named `<id>.yml` in `prompts_dir`.
///
/// # Example
/// ```no_run
/// use roleflow_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".roleflow/prompts"), "rag.consolidated")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents, &format!("{:?}", prompt_file))?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Look up a prompt compiled into the binary.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(id, yaml)| parse_prompt(yaml, &format!("built-in prompt {}", id)))
        .transpose()
}

/// Resolve a prompt: workspace override first, then the built-in.
pub fn resolve_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if prompts_dir.join(format!("{}.yml", prompt_id)).exists() {
        return load_prompt(prompts_dir, prompt_id);
    }

    builtin_prompt(prompt_id)?
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt id: {}", prompt_id)))
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for variable in &def.variables {
        if !def.template.contains(&format!("{{{{{}}}}}", variable)) {
            return Err(AppError::Prompt(format!(
                "Prompt {} declares variable '{}' that its template never uses",
                def.id, variable
            )));
        }
    }

    Ok(())
}
