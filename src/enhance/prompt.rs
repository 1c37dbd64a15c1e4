// src/enhance/prompt.rs
use super::client::GenerationRequest;
use super::seeds::{SeedExample, SeedSet};
use super::Languages;
use crate::ingest::types::RawArticle;

/// Content beyond this many characters is not sent.
const MAX_CONTENT_CHARS: usize = 1_500;

pub fn system_instruction(langs: &Languages) -> String {
    format!(
        "You help non-native {src} readers understand {src} news. \
         Simplify headlines and summaries without changing their meaning, \
         and explain difficult words, idioms and cultural references in {tgt}. \
         Be accurate, concise and neutral.",
        src = langs.source,
        tgt = langs.target,
    )
}

/// Task prompt for one article. The answer format is a single JSON object;
/// labelled lines are accepted from providers that cannot emit JSON.
pub fn task_prompt(article: &RawArticle, langs: &Languages) -> String {
    let mut out = String::with_capacity(1_024);
    out.push_str("Article title: ");
    out.push_str(&article.title);
    out.push('\n');
    if !article.summary.is_empty() {
        out.push_str("Article summary: ");
        out.push_str(&article.summary);
        out.push('\n');
    }
    if !article.content.is_empty() {
        let content: String = article.content.chars().take(MAX_CONTENT_CHARS).collect();
        out.push_str("Article content: ");
        out.push_str(&content);
        out.push('\n');
    }
    out.push_str(&format!(
        "\nReturn one JSON object with:\n\
         - \"simplified_title\": {{\"source\": simplified {src} title, \"target\": {tgt} title}}\n\
         - \"summary\": {{\"source\": 2-3 sentence {src} summary, \"target\": 2-3 sentence {tgt} summary}}\n\
         - \"annotations\": list of {{\"term\", \"gloss\", \"explanation\", \"cultural_note\"}} \
         for the title's difficult words and expressions, cultural_note null when not needed.\n\
         If you cannot produce JSON, answer with the lines \
         \"Simplified {tgt} Title:\", \"Simplified {src} Title:\", \"{tgt} Summary:\", \
         \"{src} Summary:\" followed by the annotation list as a JSON array.",
        src = langs.source,
        tgt = langs.target,
    ));
    out
}

/// The verified answer for a seed, in the JSON shape the task asks for.
pub fn example_answer(ex: &SeedExample) -> String {
    serde_json::json!({
        "simplified_title": ex.simplified_title,
        "summary": ex.summary,
        "annotations": ex.annotations,
    })
    .to_string()
}

pub fn build_request(
    article: &RawArticle,
    seeds: &SeedSet,
    few_shot: usize,
    structured: bool,
) -> GenerationRequest {
    let langs = seeds.languages();
    GenerationRequest {
        system: system_instruction(langs),
        examples: seeds.few_shot(few_shot, langs),
        prompt: task_prompt(article, langs),
        structured,
    }
}
