pub mod context;
pub mod prompts;
pub mod reply;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::llm::Generate;
use crate::query::{self, describe_filters, QueryDecision};
use crate::state::AssistantConfig;
use crate::tables::types::Selection;
use crate::tables::TableStore;

use context::{ContextEntry, Conversation, Role};
use reply::PlannerReply;

const NOT_UNDERSTOOD: &str = "Lo siento, no pude interpretar tu pregunta. ¿Podrías reformularla?";
const NO_SOURCES: &str =
    "No hay fuentes de datos disponibles en este momento. Intenta más tarde o usa `/usittel sources`.";

/// How far a question got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Answered,
    NoSources,
    NotUnderstood,
    CannotDetermine,
    UnknownTable,
    ModelError,
}

pub struct Answer {
    pub text: String,
    pub outcome: Outcome,
    pub decision: Option<QueryDecision>,
    pub selection: Option<Selection>,
}

impl Answer {
    fn halted(outcome: Outcome, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome,
            decision: None,
            selection: None,
        }
    }
}

/// Routes a question to a table, filters it, and phrases the answer.
pub struct Assistant<G> {
    llm: Arc<G>,
    tables: Arc<TableStore>,
}

impl<G: Generate> Assistant<G> {
    pub fn new(llm: Arc<G>, tables: Arc<TableStore>) -> Self {
        Self { llm, tables }
    }

    /// Answer one question, updating `conversation` with the exchange.
    pub async fn ask(
        &self,
        question: &str,
        conversation: &mut Conversation,
        config: &AssistantConfig,
    ) -> Answer {
        conversation.push_turn(Role::User, question);
        let answer = self.run(question, conversation, config).await;
        conversation.push_turn(Role::Assistant, answer.text.clone());
        answer
    }

    async fn run(
        &self,
        question: &str,
        conversation: &mut Conversation,
        config: &AssistantConfig,
    ) -> Answer {
        let catalog = self.tables.catalog().await;
        if catalog.is_empty() {
            warn!("No tables loaded, cannot answer");
            return Answer::halted(Outcome::NoSources, NO_SOURCES);
        }

        // Step 1: route
        let context = conversation.render_recent(config.context_window as usize);
        let prompt = prompts::router_prompt(question, &catalog, context.as_deref());
        let response = match self.llm.generate(&prompt, config.router_temperature).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Router call failed: {:#}", e);
                return Answer::halted(Outcome::ModelError, model_error(&e));
            }
        };
        debug!(response_len = response.len(), "─── Router Response ───");
        for line in response.lines().take(20) {
            debug!("  │ {}", line);
        }

        let decision = match PlannerReply::parse(&response) {
            PlannerReply::Decision(d) => d,
            PlannerReply::CannotDetermine(message) => {
                info!(reason = %message, "Router could not place the question");
                return Answer::halted(Outcome::CannotDetermine, message);
            }
            PlannerReply::Unparseable => {
                warn!("Router reply was not understood");
                return Answer::halted(Outcome::NotUnderstood, NOT_UNDERSTOOD);
            }
        };

        info!(
            table = %decision.table_name,
            filters = %describe_filters(&decision.filters),
            explanation = %decision.explanation,
            "Question routed"
        );

        // Step 2: filter
        let Some(table) = catalog.get(&decision.table_name) else {
            warn!(table = %decision.table_name, available = ?catalog.names(), "Unknown table");
            return Answer {
                text: format!(
                    "La fuente de datos '{}' no está disponible.",
                    decision.table_name
                ),
                outcome: Outcome::UnknownTable,
                decision: Some(decision),
                selection: None,
            };
        };

        conversation.record(ContextEntry {
            question: question.to_string(),
            table_name: decision.table_name.clone(),
            filters: decision.filters.clone(),
        });

        let selection = query::apply(table, &decision.filters);
        info!(matched = selection.len(), "Rows matched");

        // Step 3: synthesize
        let prompt = prompts::synthesis_prompt(
            question,
            &selection,
            &decision.table_name,
            config.sample_rows as usize,
        );
        let (text, outcome) = match self.llm.generate(&prompt, config.synth_temperature).await {
            Ok(text) => (text, Outcome::Answered),
            Err(e) => {
                warn!("Synthesis call failed: {:#}", e);
                (model_error(&e), Outcome::ModelError)
            }
        };

        Answer {
            text,
            outcome,
            decision: Some(decision),
            selection: Some(selection),
        }
    }

    /// One short round trip to confirm the model answers.
    pub async fn ping(&self, temperature: f32) -> Result<String> {
        self.llm.generate(prompts::HEALTH_PROMPT, temperature).await
    }
}

fn model_error(e: &anyhow::Error) -> String {
    format!("Error al llamar al modelo: {:#}", e)
}
