//! Generative rewrite orchestration and engine lifecycle.
//!
//! The generative engine is the most expensive resource in the pipeline, so
//! the orchestrator keeps at most one loaded and reuses it across calls:
//!
//! ```text
//!                ┌──────────── same model ────────────┐
//!                ▼                                    │
//! Uninitialized ──▶ Initializing ──▶ Ready ──▶ Busy ──┘
//!      ▲                 ▲             │
//!      └── init failed   └─ other ─────┴──▶ Unloaded
//!                           model / unload()
//! ```
//!
//! The slot (state, model id, engine) lives behind a `tokio::sync::Mutex`, so
//! two rewrites on one orchestrator run one after the other and never observe
//! a half-initialised engine.

use crate::config::{EngineOptions, PromptBuilder, DEFAULT_MODEL_ID, DEFAULT_MODEL_LOCATION};
use crate::engine::{EngineInit, GenerativeBackend, GenerativeEngine};
use crate::error::ConvertError;
use crate::progress::{ProgressReport, Reporter, Stage};
use crate::prompts::build_rewrite_prompt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Readiness of the generative engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    /// A rewrite request is in flight.
    Busy,
    Unloaded,
}

impl fmt::Display for EngineLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineLifecycleState::Uninitialized => "uninitialized",
            EngineLifecycleState::Initializing => "initializing",
            EngineLifecycleState::Ready => "ready",
            EngineLifecycleState::Busy => "busy",
            EngineLifecycleState::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

struct EngineSlot {
    state: EngineLifecycleState,
    model_id: Option<String>,
    engine: Option<Box<dyn GenerativeEngine>>,
}

impl EngineSlot {
    fn is_ready_for(&self, model_id: &str) -> bool {
        self.state == EngineLifecycleState::Ready
            && self.engine.is_some()
            && self.model_id.as_deref() == Some(model_id)
    }
}

/// Owns the generative engine and drives it through its lifecycle.
pub struct RewriteOrchestrator {
    backend: Arc<dyn GenerativeBackend>,
    slot: Mutex<EngineSlot>,
}

impl RewriteOrchestrator {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            slot: Mutex::new(EngineSlot {
                state: EngineLifecycleState::Uninitialized,
                model_id: None,
                engine: None,
            }),
        }
    }

    /// Current lifecycle state. Waits for an in-flight rewrite to finish.
    pub async fn state(&self) -> EngineLifecycleState {
        self.slot.lock().await.state
    }

    /// Model id of the loaded engine, if any.
    pub async fn loaded_model(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.engine.as_ref().and(slot.model_id.clone())
    }

    /// Rewrite `text` with `model_id`, bringing the engine to `Ready` first.
    pub(crate) async fn rewrite(
        &self,
        text: &str,
        model_id: &str,
        prompt_builder: Option<&PromptBuilder>,
        options: &EngineOptions,
        reporter: &Reporter,
    ) -> Result<String, ConvertError> {
        let mut slot = self.slot.lock().await;

        if slot.is_ready_for(model_id) {
            debug!("Reusing ready engine for {}", model_id);
        } else {
            let model_location =
                resolve_model_location(model_id, options).map_err(|e| reporter.fail(Stage::EngineInit, e))?;

            if let Some(engine) = slot.engine.take() {
                let previous = slot.model_id.take().unwrap_or_default();
                reporter.emit(ProgressReport::new(
                    Stage::EngineUnload,
                    format!("Unloading {previous}"),
                ));
                engine.unload().await;
                slot.state = EngineLifecycleState::Unloaded;
                info!("Unloaded generative engine for {}", previous);
            }

            slot.state = EngineLifecycleState::Initializing;
            reporter.emit(
                ProgressReport::new(Stage::EngineInit, format!("Initialising {model_id}"))
                    .with_progress(0.0),
            );

            let init = EngineInit {
                model_id: model_id.to_string(),
                model_location,
                options: options.clone(),
            };
            let forward = |fraction: f32, message: &str| {
                reporter.emit(ProgressReport::new(Stage::EngineInit, message).with_progress(fraction));
            };

            match self.backend.create_engine(&init, &forward).await {
                Ok(engine) => {
                    slot.engine = Some(engine);
                    slot.model_id = Some(model_id.to_string());
                    slot.state = EngineLifecycleState::Ready;
                    info!("Generative engine ready for {}", model_id);
                }
                Err(e) => {
                    slot.state = EngineLifecycleState::Uninitialized;
                    return Err(reporter.fail(Stage::EngineInit, e));
                }
            }
        }

        let prompt = match prompt_builder {
            Some(build) => build(text),
            None => build_rewrite_prompt(text),
        };

        slot.state = EngineLifecycleState::Busy;
        reporter.emit(ProgressReport::new(Stage::Rewrite, format!("Rewriting with {model_id}")));

        let result = match slot.engine.as_ref() {
            Some(engine) => engine.generate(&prompt).await,
            None => Err(ConvertError::Internal("generative engine slot is empty".into())),
        };
        slot.state = EngineLifecycleState::Ready;

        let reply = result
            .map_err(|e| into_generation_failure(e, model_id))
            .map_err(|e| reporter.fail(Stage::Rewrite, e))?;

        debug!("Rewrite: {} → {} bytes", text.len(), reply.len());
        reporter.emit(ProgressReport::new(Stage::Complete, "Rewrite complete").with_progress(1.0));
        Ok(reply)
    }

    /// Release the engine and reset to `Unloaded`. No-op when nothing is loaded.
    pub async fn unload(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(engine) = slot.engine.take() {
            engine.unload().await;
            slot.state = EngineLifecycleState::Unloaded;
            if let Some(model_id) = slot.model_id.take() {
                info!("Unloaded generative engine for {}", model_id);
            }
        }
    }
}

/// An explicit location always wins; only the default model has a built-in one.
fn resolve_model_location(model_id: &str, options: &EngineOptions) -> Result<String, ConvertError> {
    if let Some(location) = options
        .model_location
        .as_deref()
        .filter(|l| !l.trim().is_empty())
    {
        return Ok(location.to_string());
    }
    if model_id == DEFAULT_MODEL_ID {
        return Ok(DEFAULT_MODEL_LOCATION.to_string());
    }
    Err(ConvertError::ConfigurationError(format!(
        "no artifact location known for model '{model_id}'; set engine_options.model_location"
    )))
}

fn into_generation_failure(err: ConvertError, model_id: &str) -> ConvertError {
    match err {
        e @ ConvertError::GenerationFailure { .. } => e,
        other => ConvertError::GenerationFailure {
            model_id: model_id.to_string(),
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InitProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        inits: AtomicUsize,
        unloads: AtomicUsize,
    }

    struct EchoBackend {
        counters: Arc<Counters>,
        fail_init: bool,
    }

    struct EchoEngine {
        model_id: String,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl GenerativeBackend for EchoBackend {
        async fn create_engine(
            &self,
            init: &EngineInit,
            progress: InitProgress<'_>,
        ) -> Result<Box<dyn GenerativeEngine>, ConvertError> {
            self.counters.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(ConvertError::engine_init("generative", "no GPU"));
            }
            progress(0.5, "half");
            Ok(Box::new(EchoEngine {
                model_id: init.model_id.clone(),
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    #[async_trait]
    impl GenerativeEngine for EchoEngine {
        async fn generate(&self, prompt: &str) -> Result<String, ConvertError> {
            Ok(format!("{}:{}", self.model_id, prompt))
        }

        async fn unload(self: Box<Self>) {
            self.counters.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn orchestrator(fail_init: bool) -> (RewriteOrchestrator, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let backend = EchoBackend {
            counters: Arc::clone(&counters),
            fail_init,
        };
        (RewriteOrchestrator::new(Arc::new(backend)), counters)
    }

    fn identity() -> PromptBuilder {
        Arc::new(|t: &str| t.to_string())
    }

    fn located(location: &str) -> EngineOptions {
        EngineOptions {
            model_location: Some(location.into()),
            ..EngineOptions::default()
        }
    }

    #[tokio::test]
    async fn starts_uninitialized_and_becomes_ready() {
        let (orch, _) = orchestrator(false);
        assert_eq!(orch.state().await, EngineLifecycleState::Uninitialized);
        let out = orch
            .rewrite("hi", DEFAULT_MODEL_ID, Some(&identity()), &EngineOptions::default(), &Reporter::default())
            .await
            .unwrap();
        assert_eq!(out, format!("{DEFAULT_MODEL_ID}:hi"));
        assert_eq!(orch.state().await, EngineLifecycleState::Ready);
        assert_eq!(orch.loaded_model().await.as_deref(), Some(DEFAULT_MODEL_ID));
    }

    #[tokio::test]
    async fn same_model_initialises_once_other_model_swaps() {
        let (orch, counters) = orchestrator(false);
        let r = Reporter::default();
        let opts = EngineOptions::default();
        orch.rewrite("a", DEFAULT_MODEL_ID, None, &opts, &r).await.unwrap();
        orch.rewrite("b", DEFAULT_MODEL_ID, None, &opts, &r).await.unwrap();
        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
        assert_eq!(counters.unloads.load(Ordering::SeqCst), 0);

        orch.rewrite("c", "llama3.2", None, &located("ollama"), &r).await.unwrap();
        assert_eq!(counters.inits.load(Ordering::SeqCst), 2);
        assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(orch.loaded_model().await.as_deref(), Some("llama3.2"));
    }

    #[tokio::test]
    async fn unknown_model_without_location_fails_fast() {
        let (orch, counters) = orchestrator(false);
        let err = orch
            .rewrite("x", "mystery-7b", None, &EngineOptions::default(), &Reporter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ConfigurationError(_)), "got {err:?}");
        assert_eq!(counters.inits.load(Ordering::SeqCst), 0);
        assert_eq!(orch.state().await, EngineLifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn failed_init_resets_to_uninitialized() {
        let (orch, _) = orchestrator(true);
        let err = orch
            .rewrite("x", DEFAULT_MODEL_ID, None, &EngineOptions::default(), &Reporter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EngineInitFailure { .. }));
        assert_eq!(orch.state().await, EngineLifecycleState::Uninitialized);
        assert!(orch.loaded_model().await.is_none());
    }

    #[tokio::test]
    async fn unload_is_idempotent_and_forces_reinit() {
        let (orch, counters) = orchestrator(false);
        orch.unload().await;
        assert_eq!(orch.state().await, EngineLifecycleState::Uninitialized);

        let r = Reporter::default();
        let opts = EngineOptions::default();
        orch.rewrite("a", DEFAULT_MODEL_ID, None, &opts, &r).await.unwrap();
        orch.unload().await;
        orch.unload().await;
        assert_eq!(orch.state().await, EngineLifecycleState::Unloaded);
        assert_eq!(counters.unloads.load(Ordering::SeqCst), 1);

        orch.rewrite("b", DEFAULT_MODEL_ID, None, &opts, &r).await.unwrap();
        assert_eq!(counters.inits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn explicit_location_wins_for_default_model() {
        let loc = resolve_model_location(DEFAULT_MODEL_ID, &located("azure")).unwrap();
        assert_eq!(loc, "azure");
        let loc = resolve_model_location(DEFAULT_MODEL_ID, &located("  ")).unwrap();
        assert_eq!(loc, DEFAULT_MODEL_LOCATION);
    }

    #[test]
    fn other_errors_become_generation_failures() {
        let e = into_generation_failure(ConvertError::Internal("socket closed".into()), "m");
        match e {
            ConvertError::GenerationFailure { model_id, detail } => {
                assert_eq!(model_id, "m");
                assert!(detail.contains("socket closed"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
