//! Prompts for the generative rewrite stage.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the default rewrite behaviour
//!    requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can inspect prompts directly without
//!    spinning up a real engine.
//!
//! Callers can override the template via
//! [`crate::config::ConversionConfigBuilder::prompt_builder`] or
//! [`crate::config::CallOptions::prompt_builder`]; the constants here are used
//! only when no builder is provided.

/// System message sent ahead of every rewrite prompt.
pub const REWRITE_SYSTEM_PROMPT: &str = "You are a careful technical editor. \
You fix formatting in Markdown documents produced by automatic text extraction. \
You never invent content and you reply with Markdown only.";

/// Instruction template for the rewrite. `{text}` is replaced with the
/// Markdown to rewrite.
pub const DEFAULT_REWRITE_PROMPT: &str = r#"The Markdown below was reconstructed from a PDF by heuristics. Improve it:

1. STRUCTURE
   - Promote real section titles to headings; demote false headings to text
   - Re-join paragraphs that were split across lines or pages
   - Turn column-aligned code fences into GFM pipe tables when they are tables

2. TEXT
   - Preserve ALL text content and its reading order
   - Fix words broken by hyphenation or missing spaces only when certain
   - Drop page numbers and repeated headers/footers

3. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations

Document:

{text}"#;

/// Fill the built-in template with `text`.
pub fn build_rewrite_prompt(text: &str) -> String {
    DEFAULT_REWRITE_PROMPT.replace("{text}", text)
}
