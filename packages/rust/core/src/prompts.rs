//! Prompt assembly and model-output parsing.
//!
//! Prompts instruct the model to return JSON matching the shared report
//! types. Parsing is strict first, with a fenced-code fallback for models
//! that wrap JSON in markdown fences despite the JSON response MIME type.

use serde::de::DeserializeOwned;

use siteagent_shared::{ChatMessage, Result, SiteAgentError};
use siteagent_vector::ContextHit;

/// Build the analysis prompt for a site's page text.
pub fn analysis_prompt(content: &str, questions: &[String]) -> String {
    let questions_block = if questions.is_empty() {
        "None".to_string()
    } else {
        questions
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Analyze the following website content and extract key business insights.

Website Content:
{content}

Return a JSON object with this exact structure:
{{
    "company_info": {{
        "industry": "Primary industry",
        "company_size": "Estimated size (small/medium/large or count)",
        "location": "Headquarters location",
        "core_products_services": ["list", "of", "products"],
        "unique_selling_proposition": "What makes them stand out",
        "target_audience": "Primary customer demographic",
        "overall_sentiment": "Positive/Neutral/Professional etc.",
        "contact_info": {{
            "email": "email if found",
            "phone": "phone if found",
            "social_media": {{"linkedin": "url", "twitter": "url"}}
        }}
    }},
    "extracted_answers": [
        {{"question": "question string", "answer": "answer string"}}
    ]
}}

Use "Information not found" for fields the content does not cover.

Additional questions to answer if they aren't covered:
{questions_block}
"#
    )
}

/// Build the grounded chat prompt from retrieved context and history.
pub fn chat_prompt(context: &str, history: &[ChatMessage], query: &str) -> String {
    let mut history_block = String::new();
    for msg in history {
        history_block.push_str(&format!(
            "{}: {}\n",
            msg.role.as_str().to_uppercase(),
            msg.content
        ));
    }
    if history_block.is_empty() {
        history_block.push_str("(no prior conversation)\n");
    }

    format!(
        r#"You are an assistant helping a user understand a website's content.

Answer ONLY from the website context below. If the context does not contain
the answer, say so plainly. Never invent details that are not in the context.

Website Context:
{context}

Conversation History:
{history_block}
User Question: {query}

Return a JSON object with:
{{
    "agent_response": "Your helpful answer here.",
    "context_sources": ["Direct quotes or short summaries of the specific sections used to answer"]
}}
"#
    )
}

/// Format retrieved passages into the context block fed to the chat prompt.
pub fn format_context(hits: &[ContextHit]) -> String {
    hits.iter()
        .map(|hit| format!("Source [{}]:\n{}", hit.url, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse model output as `T`, stripping markdown code fences if needed.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let stripped = strip_code_fences(text);
    serde_json::from_str(&stripped).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        SiteAgentError::parse(format!(
            "failed to parse model response: {e} (got: {preview})"
        ))
    })
}

/// Remove ```json fences a model may wrap its output in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}
