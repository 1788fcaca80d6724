//! Prompt templates for commit message generation.

use crate::message::TypeVocabulary;

/// System prompt for single-line commit titles.
pub const MESSAGE_SYSTEM_PROMPT: &str = r"You are an expert software engineer writing git commit messages in the Conventional Commits format.

You will receive a unified diff, the allowed commit types and optional extra context.

Rules:
1. Respond with exactly one line of the form `type(optional scope): description`
2. Choose the type from the allowed list that best describes the ACTUAL code changes
3. Keep the whole line shorter than 72 characters
4. Use imperative mood and lowercase (“add”, not “Added”)
5. No trailing period, no markdown, no code fences, no explanations";

/// System prompt for title plus bulleted body.
pub const DETAILED_SYSTEM_PROMPT: &str = r"You are an expert software engineer writing git commit messages in the Conventional Commits format.

You will receive a unified diff, the allowed commit types and optional extra context.

Respond in exactly this layout and nothing else:

Title: type(optional scope): description
Body:
• first notable change
• second notable change

Rules:
1. The title must be shorter than 72 characters and use a type from the allowed list
2. Use imperative mood and lowercase in the title
3. The body is a short list of bullets starting with “•”, one per notable change
4. No markdown headings and no code fences";

/// System prompt for merging per-chunk titles into one.
pub const MERGE_SYSTEM_PROMPT: &str = r"You are an expert software engineer writing git commit messages in the Conventional Commits format.

A large change was split into parts and each part was summarized separately. You will receive those partial summaries and the full list of affected files.

Synthesize ONE commit title that covers the whole change.

Rules:
1. Respond with exactly one line of the form `type(optional scope): description`
2. Choose the type from the allowed list that describes the change as a whole
3. Keep the whole line shorter than 72 characters
4. No markdown, no code fences, no explanations";

/// System prompt for merging per-chunk title and body results.
pub const DETAILED_MERGE_SYSTEM_PROMPT: &str = r"You are an expert software engineer writing git commit messages in the Conventional Commits format.

A large change was split into parts and each part was summarized separately. You will receive those partial summaries and the full list of affected files.

Synthesize ONE commit message covering the whole change, in exactly this layout:

Title: type(optional scope): description
Body:
• first notable change
• second notable change

Rules:
1. The title must be shorter than 72 characters and use a type from the allowed list
2. Merge overlapping bullets; keep the body short
3. No markdown headings and no code fences";

/// One successful per-chunk summary fed to the merge prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSummary<'a> {
    /// Zero-based chunk index.
    pub index: usize,
    /// Summary title line.
    pub title: &'a str,
    /// Detailed-mode body, if any.
    pub body: Option<&'a str>,
}

fn push_context(prompt: &mut String, context: Option<&str>) {
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\n\nAdditional context:\n");
        prompt.push_str(context);
    }
}

/// Builds the user prompt for a diff or diff chunk.
pub fn diff_user_prompt(diff: &str, vocabulary: &TypeVocabulary, context: Option<&str>) -> String {
    let mut prompt = format!("Allowed commit types:\n{}", vocabulary.render());
    push_context(&mut prompt, context);
    prompt.push_str("\n\nDiff:\n```diff\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```");
    prompt
}

/// Builds the merge prompt from per-chunk summaries and affected files.
///
/// Summaries are numbered from one in chunk-index order.
pub fn merge_user_prompt(
    summaries: &[PartialSummary<'_>],
    files: &[String],
    vocabulary: &TypeVocabulary,
    context: Option<&str>,
) -> String {
    let mut prompt = format!("Allowed commit types:\n{}", vocabulary.render());
    push_context(&mut prompt, context);

    prompt.push_str("\n\nPartial summaries:\n");
    for summary in summaries {
        prompt.push_str(&format!("Summary {}: {}\n", summary.index + 1, summary.title));
        if let Some(body) = summary.body {
            for line in body.lines().filter(|l| !l.trim().is_empty()) {
                prompt.push_str(&format!("  {}\n", line.trim()));
            }
        }
    }

    prompt.push_str("\nAffected files:\n");
    if files.is_empty() {
        prompt.push_str("(none detected)\n");
    }
    for file in files {
        prompt.push_str(&format!("- {file}\n"));
    }
    prompt
}
