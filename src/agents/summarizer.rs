use async_trait::async_trait;
use tracing::info;

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::models::CrawledPage;
use crate::pipeline::{StageExecutor, StageName, WorkflowState};
use super::agent_loop::agent_pass;
use super::prompts;
use super::structured::{ask_json, ask_text, merge_unique, SiteFacts};

pub const INTERESTING_KEYWORDS: [&str; 17] = [
    "admin", "login", "password", "token", "api", "debug",
    "flag", "secret", "key", "config", "database", "sql",
    "upload", "file", "command", "exec", "eval",
];

const MAX_SNIPPETS: usize = 5;
const SNIPPET_CHARS: usize = 100;

/// Up to five distinct lower-cased lines mentioning a keyword, each cut to
/// 100 characters.
pub fn interesting_lines(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in content.to_lowercase().lines() {
        if !INTERESTING_KEYWORDS.iter().any(|k| line.contains(k)) {
            continue;
        }
        let clean: String = line.trim().chars().take(SNIPPET_CHARS).collect();
        if !clean.is_empty() && !found.contains(&clean) {
            found.push(clean);
        }
        if found.len() >= MAX_SNIPPETS {
            break;
        }
    }
    found
}

/// Per-page digest handed to the web analysis.
pub fn content_digest(pages: &[CrawledPage]) -> String {
    pages
        .iter()
        .map(|page| {
            let mut info = format!("URL: {}\nTitle: {}\nStatus: {}\n", page.url, page.title, page.status_code);
            if !page.forms.is_empty() {
                info.push_str(&format!("Forms ({}):\n", page.forms.len()));
                for form in &page.forms {
                    info.push_str(&format!("  - {} {}: {} fields\n", form.method, form.action, form.fields.len()));
                    let names: Vec<&str> = form.named_fields().map(|f| f.name.as_str()).collect();
                    if !names.is_empty() {
                        info.push_str(&format!("    Fields: {}\n", names.join(", ")));
                    }
                }
            }
            let inputs: Vec<&str> = page.inputs.iter().filter(|i| !i.name.is_empty()).map(|i| i.name.as_str()).collect();
            if !inputs.is_empty() {
                info.push_str(&format!("Inputs: {}\n", inputs.join(", ")));
            }
            let snippets = interesting_lines(&page.content);
            if !snippets.is_empty() {
                info.push_str(&format!("Interesting content: {}\n", snippets.join("; ")));
            }
            info
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Source-code and web-content analysis, stored as `source_analysis`.
pub struct SummarizeExecutor;

#[async_trait]
impl StageExecutor for SummarizeExecutor {
    fn stage(&self) -> StageName {
        StageName::Summarize
    }

    async fn execute(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        let challenge = state.challenge.clone();
        let system = prompts::stage_system(
            "summarizer",
            "analyze source code and web content, identify the technology stack and data flows, and summarize security-relevant information for exploitation",
        );

        let mut sections = Vec::new();
        if let Some(source) = &challenge.source_code {
            let prompt = prompts::render(
                prompts::SOURCE_ANALYSIS,
                &[
                    ("DESCRIPTION", &challenge.description),
                    ("FLAG_FORMAT", &challenge.flag_format),
                    ("SOURCE_CODE", source),
                ],
            );
            match ask_text(ctx, &system, &prompt).await? {
                Ok(text) => sections.push(text),
                Err(message) => {
                    state.stage_mut(StageName::Summarize).errors.push(message.clone());
                    sections.push(format!("Source code analysis failed: {}", message));
                }
            }
            state.stage_mut(StageName::Summarize).set_progress(0.4);
        }

        let pages = &state.crawled_pages;
        let prompt = prompts::render(
            prompts::WEB_ANALYSIS,
            &[
                ("DESCRIPTION", &challenge.description),
                ("PAGE_COUNT", &pages.len().to_string()),
                ("FORM_COUNT", &pages.iter().map(|p| p.forms.len()).sum::<usize>().to_string()),
                ("CONTENT", &content_digest(pages)),
            ],
        );
        match agent_pass(ctx, &system, &prompt).await? {
            Ok(text) => sections.push(text),
            Err(message) => {
                state.stage_mut(StageName::Summarize).errors.push(message.clone());
                sections.push(format!("Web content analysis failed: {}", message));
            }
        }
        let analysis = sections.join("\n\n--- Web Content Analysis ---\n");
        state.stage_mut(StageName::Summarize).set_progress(0.7);

        let prompt = prompts::render(prompts::EXTRACT_FACTS, &[("ANALYSIS", &analysis)]);
        let facts = ask_json::<SiteFacts>(ctx, "Extract structured information from this security analysis.", &prompt)
            .await?
            .parsed()
            .unwrap_or_default();
        merge_unique(&mut state.technologies, facts.technologies);
        merge_unique(&mut state.endpoints, facts.endpoints);
        state.source_analysis = Some(analysis);

        let stage = state.stage_mut(StageName::Summarize);
        stage.set_progress(1.0);
        stage.log("Summarization completed");
        info!(technologies = state.technologies.len(), endpoints = state.endpoints.len(), "Summarization completed");
        Ok(())
    }
}
