//! Configuration types for document-to-Markdown conversion.
//!
//! Two layers exist:
//!
//! * [`ConversionConfig`] — instance defaults, handed to
//!   [`crate::convert::Converter::new`] and built via
//!   [`ConversionConfigBuilder`].
//! * [`CallOptions`] — per-call overrides. Every `Some` field wins over the
//!   instance default; rule lists are appended after the instance rules.

use crate::error::ConvertError;
use crate::pipeline::normalize::NormalizationRule;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OCR language (Tesseract traineddata name).
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Default page rasterisation scale for OCR.
pub const DEFAULT_RENDER_SCALE: f32 = 2.5;

/// Model used for rewrites when the caller does not name one.
///
/// This is the only model whose artifact location is built in; any other
/// model needs [`EngineOptions::model_location`].
pub const DEFAULT_MODEL_ID: &str = "gpt-4.1-nano";

/// Built-in artifact location of [`DEFAULT_MODEL_ID`] (an edgequake-llm
/// provider name for the bundled backend).
pub const DEFAULT_MODEL_LOCATION: &str = "openai";

/// Builds the rewrite prompt from the Markdown to rewrite.
pub type PromptBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Options forwarded to the OCR engine when a handle is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Tesseract page segmentation mode. Default: 3 (fully automatic).
    pub page_segmentation_mode: u8,
    /// Tesseract OCR engine mode. Default: 1 (LSTM only).
    pub engine_mode: u8,
    /// Explicit path to the OCR binary. Default: looked up on `PATH`.
    pub binary_path: Option<std::path::PathBuf>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            page_segmentation_mode: 3,
            engine_mode: 1,
            binary_path: None,
        }
    }
}

/// Options forwarded to the generative engine when it is initialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Where the model artifacts live. For the bundled LLM backend this is
    /// the provider name (`openai`, `anthropic`, `ollama`, …).
    ///
    /// Required for every model except [`DEFAULT_MODEL_ID`].
    pub model_location: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the engine may generate. Default: 4096.
    pub max_tokens: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            model_location: None,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

/// Instance-level configuration for a [`crate::convert::Converter`].
///
/// # Example
/// ```rust
/// use edgequake_pdftext2md::{ConversionConfig, NormalizationRule};
///
/// let config = ConversionConfig::builder()
///     .ocr_language("deu")
///     .render_scale(3.0)
///     .rule(NormalizationRule::new(r"\bInc\b", "Incorporated"))
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_language, "deu");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Caller rules applied after the built-ins on every conversion.
    pub post_process_rules: Vec<NormalizationRule>,

    /// Split camelCase / PascalCase runs glued together by extraction. Default: false.
    pub split_camel_case: bool,

    /// OCR language. Default: `eng`.
    pub ocr_language: String,

    /// OCR engine options.
    pub ocr_options: OcrOptions,

    /// Page rasterisation scale for OCR. Range: 0.5–8.0. Default: 2.5.
    ///
    /// Larger scales trade time for recognition accuracy.
    pub render_scale: f32,

    /// Rewrite model. Default: [`DEFAULT_MODEL_ID`].
    pub model_id: String,

    /// Rewrite prompt template. If None, uses the built-in template.
    pub prompt_builder: Option<PromptBuilder>,

    /// Generative engine options.
    pub engine_options: EngineOptions,

    /// Progress observer used when a call does not supply its own.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            post_process_rules: Vec::new(),
            split_camel_case: false,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            ocr_options: OcrOptions::default(),
            render_scale: DEFAULT_RENDER_SCALE,
            model_id: DEFAULT_MODEL_ID.to_string(),
            prompt_builder: None,
            engine_options: EngineOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("post_process_rules", &self.post_process_rules)
            .field("split_camel_case", &self.split_camel_case)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_options", &self.ocr_options)
            .field("render_scale", &self.render_scale)
            .field("model_id", &self.model_id)
            .field("prompt_builder", &self.prompt_builder.as_ref().map(|_| "<fn>"))
            .field("engine_options", &self.engine_options)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    /// Append one caller rule. Rules run in the order they are added.
    pub fn rule(mut self, rule: NormalizationRule) -> Self {
        self.config.post_process_rules.push(rule);
        self
    }

    pub fn post_process_rules(mut self, rules: Vec<NormalizationRule>) -> Self {
        self.config.post_process_rules.extend(rules);
        self
    }

    pub fn split_camel_case(mut self, v: bool) -> Self {
        self.config.split_camel_case = v;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_options(mut self, options: OcrOptions) -> Self {
        self.config.ocr_options = options;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn prompt_builder(mut self, builder: PromptBuilder) -> Self {
        self.config.prompt_builder = Some(builder);
        self
    }

    pub fn engine_options(mut self, options: EngineOptions) -> Self {
        self.config.engine_options = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        validate_render_scale(c.render_scale)?;
        if c.ocr_language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.model_id.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Model id must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

pub(crate) fn validate_render_scale(scale: f32) -> Result<(), ConvertError> {
    if !(0.5..=8.0).contains(&scale) {
        return Err(ConvertError::InvalidConfig(format!(
            "Render scale must be 0.5–8.0, got {}",
            scale
        )));
    }
    Ok(())
}

/// Per-call overrides for one conversion or rewrite.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Rules appended after the instance rules for this call only.
    pub post_process_rules: Vec<NormalizationRule>,
    pub ocr_language: Option<String>,
    pub ocr_options: Option<OcrOptions>,
    pub render_scale: Option<f32>,
    pub model_id: Option<String>,
    pub prompt_builder: Option<PromptBuilder>,
    pub engine_options: Option<EngineOptions>,
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("post_process_rules", &self.post_process_rules)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_options", &self.ocr_options)
            .field("render_scale", &self.render_scale)
            .field("model_id", &self.model_id)
            .field("prompt_builder", &self.prompt_builder.as_ref().map(|_| "<fn>"))
            .field("engine_options", &self.engine_options)
            .finish()
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: NormalizationRule) -> Self {
        self.post_process_rules.push(rule);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.ocr_language = Some(lang.into());
        self
    }

    pub fn ocr_options(mut self, options: OcrOptions) -> Self {
        self.ocr_options = Some(options);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.render_scale = Some(scale);
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.model_id = Some(model.into());
        self
    }

    pub fn prompt_builder(mut self, builder: PromptBuilder) -> Self {
        self.prompt_builder = Some(builder);
        self
    }

    pub fn engine_options(mut self, options: EngineOptions) -> Self {
        self.engine_options = Some(options);
        self
    }

    pub fn progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }
}
