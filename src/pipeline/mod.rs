//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step or one engine
//! adapter. Keeping stages separate makes each independently testable and
//! lets us swap an engine without touching the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render/ocr ──▶ extract ──▶ normalize ──▶ reconstruct ──▶ (llm)
//! (bytes)   (engines)      (raw text)  (rules)       (blocks)        (rewrite)
//! ```
//!
//! 1. [`input`]   load a path or URL into a `%PDF` payload
//! 2. [`render`]  pdfium adapter; runs in `spawn_blocking` because pdfium is
//!    not async-safe
//! 3. [`ocr`]     tesseract adapter
//! 4. [`extract`] page-by-page raw text, direct or via OCR
//! 5. [`normalize`] ordered find/replace rule engine
//! 6. [`reconstruct`] line classification into Markdown blocks
//! 7. [`llm`]     edgequake-llm adapter for the rewrite stage

pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod ocr;
pub mod reconstruct;
pub mod render;
