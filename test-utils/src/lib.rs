//! Fixture builders and a scriptable fake [`LlmClient`] shared across
//! `memory-core`'s integration tests, mirroring the builder-per-entity
//! pattern each tier's own `#[cfg(test)]` module already uses inline,
//! lifted out here so cross-tier seed-scenario tests don't re-derive it.

use async_trait::async_trait;
use memory_core::llm::{LlmClient, LlmRequest, LlmResponse};
use memory_core::types::{Category, Episode, Fact, FactType, KnowledgeDocument, SynthesisMethod};
use memory_core::types::enums::{ConsolidationStrategy, LlmTask};
use memory_core::{Error, Result, Turn};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Builds a [`Turn`] with sensible defaults, overridable per field.
#[derive(Debug, Clone)]
pub struct TestTurnBuilder {
    session_id: String,
    speaker: String,
    content: String,
    speaker_confidence: Option<f32>,
}

impl TestTurnBuilder {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            session_id: "test-session".to_string(),
            speaker: "user".to_string(),
            content: content.into(),
            speaker_confidence: None,
        }
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }

    #[must_use]
    pub fn speaker_confidence(mut self, confidence: f32) -> Self {
        self.speaker_confidence = Some(confidence);
        self
    }

    /// # Panics
    /// Panics if the built turn fails validation (empty session/speaker/content),
    /// which would indicate a test fixture bug.
    #[must_use]
    pub fn build(self) -> Turn {
        let mut turn = Turn::new(self.session_id, self.speaker, self.content).expect("valid test turn");
        turn.speaker_confidence = self.speaker_confidence;
        turn
    }
}

/// Builds a [`Fact`] with sensible defaults, overridable per field.
#[derive(Debug, Clone)]
pub struct TestFactBuilder {
    session_id: String,
    statement: String,
    fact_type: FactType,
    category: Category,
    certainty: f32,
    impact: f32,
}

impl TestFactBuilder {
    #[must_use]
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            session_id: "test-session".to_string(),
            statement: statement.into(),
            fact_type: FactType::Mention,
            category: Category::Personal,
            certainty: 0.8,
            impact: 0.8,
        }
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn fact_type(mut self, fact_type: FactType) -> Self {
        self.fact_type = fact_type;
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn certainty(mut self, certainty: f32) -> Self {
        self.certainty = certainty;
        self
    }

    #[must_use]
    pub fn impact(mut self, impact: f32) -> Self {
        self.impact = impact;
        self
    }

    /// High-CIAR fact: certainty/impact both 0.95, comfortably above the
    /// default 0.6 promotion threshold.
    #[must_use]
    pub fn high_significance(mut self) -> Self {
        self.certainty = 0.95;
        self.impact = 0.95;
        self
    }

    /// Low-CIAR fact: certainty/impact both 0.1, comfortably below the
    /// default 0.6 promotion threshold.
    #[must_use]
    pub fn low_significance(mut self) -> Self {
        self.certainty = 0.1;
        self.impact = 0.1;
        self
    }

    /// # Panics
    /// Panics if the built fact fails validation, which would indicate a
    /// test fixture bug (e.g. certainty/impact out of `[0, 1]`).
    #[must_use]
    pub fn build(self) -> Fact {
        Fact::new(self.session_id, self.statement, self.fact_type, self.category, self.certainty, self.impact)
            .expect("valid test fact")
    }
}

/// Builds an [`Episode`] with sensible defaults, overridable per field.
#[derive(Debug, Clone)]
pub struct TestEpisodeBuilder {
    session_id: String,
    summary: String,
    strategy: ConsolidationStrategy,
    embedding: Option<Vec<f32>>,
    importance: f32,
}

impl TestEpisodeBuilder {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            session_id: "test-session".to_string(),
            summary: summary.into(),
            strategy: ConsolidationStrategy::TimeWindow,
            embedding: None,
            importance: 0.5,
        }
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: ConsolidationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    /// # Panics
    /// Panics if the built episode fails validation (empty summary),
    /// which would indicate a test fixture bug.
    #[must_use]
    pub fn build(self) -> Episode {
        let mut episode = Episode::new(self.session_id, self.summary, self.strategy).expect("valid test episode");
        episode.embedding = self.embedding;
        episode.importance = self.importance;
        episode
    }
}

/// Builds a [`KnowledgeDocument`] with sensible defaults, overridable per field.
#[derive(Debug, Clone)]
pub struct TestKnowledgeDocBuilder {
    title: String,
    body: String,
    synthesis_method: SynthesisMethod,
}

impl TestKnowledgeDocBuilder {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            synthesis_method: SynthesisMethod::LlmSynthesized,
        }
    }

    #[must_use]
    pub fn synthesis_method(mut self, method: SynthesisMethod) -> Self {
        self.synthesis_method = method;
        self
    }

    /// # Panics
    /// Panics if the built document fails validation (empty title/body),
    /// which would indicate a test fixture bug.
    #[must_use]
    pub fn build(self) -> KnowledgeDocument {
        KnowledgeDocument::new(
            self.title,
            self.body,
            memory_core::types::KnowledgeType::Summary,
            Category::Technical,
            self.synthesis_method,
        )
        .expect("valid test knowledge document")
    }
}

/// A scripted fake [`LlmClient`]: callers queue fixed responses per
/// [`LlmTask`], or let `embed` fall back to a cheap deterministic hash
/// so vector-search tests don't need a real embedding model.
///
/// Unscripted calls return [`Error::CircuitOpen`], driving engines down
/// their rule-based fallback path the same way a real provider outage
/// would — this is deliberate, not an oversight: tests that want the
/// LLM path exercised must queue a response.
pub struct MockLlmClient {
    queued: Mutex<VecDeque<(LlmTask, LlmResponse)>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    #[must_use]
    pub fn new() -> Self {
        Self { queued: Mutex::new(VecDeque::new()) }
    }

    /// Queue a raw-text response (no schema) for the next matching call.
    #[must_use]
    pub fn with_text_response(self, task: LlmTask, text: impl Into<String>) -> Self {
        self.queued.lock().expect("lock not poisoned").push_back((
            task,
            LlmResponse { text: text.into(), parsed: None, provider: "mock".to_string() },
        ));
        self
    }

    /// Queue a schema-parsed JSON response for the next matching call.
    #[must_use]
    pub fn with_parsed_response(self, task: LlmTask, parsed: serde_json::Value) -> Self {
        self.queued.lock().expect("lock not poisoned").push_back((
            task,
            LlmResponse { text: parsed.to_string(), parsed: Some(parsed), provider: "mock".to_string() },
        ));
        self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn call(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut queued = self.queued.lock().expect("lock not poisoned");
        if let Some(pos) = queued.iter().position(|(task, _)| *task == request.task) {
            let (_, response) = queued.remove(pos).expect("position just found");
            return Ok(response);
        }
        Err(Error::CircuitOpen(format!("no scripted response queued for {}", request.task)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Deterministic, cheap pseudo-embedding: hash-derived so that
        // near-identical inputs land near each other in cosine space
        // without pulling in a real model.
        let mut vector = vec![0.0_f32; 768];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 768] += f32::from(byte) / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
