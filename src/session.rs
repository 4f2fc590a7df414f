//! Session state.
//!
//! A `SessionContext` owns everything that lives for one session: the
//! table cache, the optional refiner, the analysis engine and the chat
//! history. It is created once in `main` and consumed by [`SessionContext::end`],
//! which discards the history.

use crate::data::TableCache;
use crate::error::LoadError;
use crate::llm::{AnalysisEngine, PredefinedQuestion, QueryRefiner};
use crate::models::{ChatTurn, RowSample, Table, TurnOutcome};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct SessionContext {
    data_path: PathBuf,
    cache: TableCache,
    engine: Option<Box<dyn AnalysisEngine>>,
    refiner: Option<QueryRefiner>,
    history: Vec<ChatTurn>,
    show_progress: bool,
}

impl SessionContext {
    pub fn new(data_path: impl Into<PathBuf>, show_progress: bool) -> Self {
        Self {
            data_path: data_path.into(),
            cache: TableCache::new(),
            engine: None,
            refiner: None,
            history: Vec::new(),
            show_progress,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// The session's table, loaded on first access.
    pub fn table(&mut self) -> Result<Arc<Table>, LoadError> {
        self.cache.get_or_load(&self.data_path)
    }

    /// Attach the analysis stages. Refinement is skipped when `refiner` is `None`.
    pub fn attach_analysis(
        &mut self,
        engine: Box<dyn AnalysisEngine>,
        refiner: Option<QueryRefiner>,
    ) {
        info!(
            "Analysis attached (refinement {})",
            if refiner.is_some() { "on" } else { "off" }
        );
        self.engine = Some(engine);
        self.refiner = refiner;
    }

    /// Part of the table the engine answers from, when it is not all of it.
    pub fn row_sample(&self) -> Option<RowSample> {
        self.engine.as_ref().and_then(|engine| engine.row_sample())
    }

    /// Chat history, oldest first.
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Answer a user question and append it to the history.
    ///
    /// A failed refinement falls back to the raw question; a failed analysis
    /// is recorded as an error outcome. Neither aborts the session.
    pub async fn ask(&mut self, question: &str) -> &ChatTurn {
        let question = question.trim();

        let refined_question = match self.refiner {
            Some(ref refiner) => {
                let spinner = self.spinner("Refining question...");
                let refined = refiner.refine(question).await;
                finish(spinner);

                match refined {
                    Ok(refined) => Some(refined),
                    Err(e) => {
                        warn!("{}; using the original question", e);
                        None
                    }
                }
            }
            None => None,
        };

        let effective = refined_question.as_deref().unwrap_or(question);
        let outcome = self.delegate(effective).await;
        let row_sample = self.row_sample();

        self.history.push(ChatTurn {
            question: question.to_string(),
            refined_question,
            outcome,
            row_sample,
            asked_at: Utc::now(),
        });

        &self.history[self.history.len() - 1]
    }

    /// Run one of the predefined insight questions. Not refined, not recorded.
    pub async fn ask_predefined(&self, question: PredefinedQuestion) -> TurnOutcome {
        self.delegate(question.question()).await
    }

    async fn delegate(&self, question: &str) -> TurnOutcome {
        let engine = match self.engine {
            Some(ref engine) => engine,
            None => return TurnOutcome::Error("analysis engine is not configured".to_string()),
        };

        let spinner = self.spinner("Analysing...");
        let result = engine.chat(question).await;
        finish(spinner);

        match result {
            Ok(response) => TurnOutcome::Answer(response),
            Err(e) => {
                warn!("Analysis of '{}' failed: {}", question, e);
                TurnOutcome::Error(e.to_string())
            }
        }
    }

    fn spinner(&self, message: &'static str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    /// End the session, discarding the chat history.
    pub fn end(self) {
        info!(
            "Session ended; discarding {} chat turns and {} cached tables",
            self.history.len(),
            self.cache.len()
        );
    }
}

fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}
