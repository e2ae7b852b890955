use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::answer::AnswerGenerator;
use super::prompt::{ComposedPrompt, PromptComposer};
use super::rag::RagService;
use crate::domain::{Answer, ConversationTurn, Document, DomainError, Result};
use crate::infrastructure::vector_store::VectorIndex;

/// Stateless collaborators shared by every session.
#[derive(Clone)]
pub struct Pipeline {
    pub rag: Arc<RagService>,
    pub composer: Arc<PromptComposer>,
    pub generator: Arc<AnswerGenerator>,
    pub index_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        rag: Arc<RagService>,
        composer: Arc<PromptComposer>,
        generator: Arc<AnswerGenerator>,
    ) -> Self {
        Self {
            rag,
            composer,
            generator,
            index_dir: None,
        }
    }

    /// Persist every built index under `dir/<document id>` and reuse
    /// compatible ones instead of re-embedding.
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Empty,
    Indexing,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub document_id: Option<Uuid>,
    pub document_name: Option<String>,
    pub chunk_count: usize,
}

enum SessionState {
    Empty,
    Indexing,
    Ready(Arc<VectorIndex>),
}

impl SessionState {
    fn settled(index: Option<Arc<VectorIndex>>) -> Self {
        match index {
            Some(index) => Self::Ready(index),
            None => Self::Empty,
        }
    }

    fn status(&self) -> SessionStatus {
        let (phase, index) = match self {
            Self::Empty => (Phase::Empty, None),
            Self::Indexing => (Phase::Indexing, None),
            Self::Ready(index) => (Phase::Ready, Some(index)),
        };
        SessionStatus {
            phase,
            document_id: index.map(|i| i.document_id()),
            document_name: index.map(|i| i.document_name().to_string()),
            chunk_count: index.map_or(0, |i| i.len()),
        }
    }
}

/// Puts the session back in its pre-indexing state unless the build finished.
/// Covers both errors and a caller dropping the future mid-build. The guard
/// holds the only copy of the index that was active before indexing began.
struct IndexingGuard<'a> {
    state: &'a RwLock<SessionState>,
    previous: Option<Option<Arc<VectorIndex>>>,
}

impl IndexingGuard<'_> {
    fn complete(mut self, index: Arc<VectorIndex>) -> Result<()> {
        self.previous = None;
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        *state = SessionState::Ready(index);
        Ok(())
    }
}

impl Drop for IndexingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Ok(mut state) = self.state.write() {
                *state = SessionState::settled(previous);
            }
        }
    }
}

/// One user's question-answering session over a single active document.
///
/// Questions are answered independently: the history is a log for display and
/// never reaches the prompt.
pub struct Session {
    id: Uuid,
    pipeline: Pipeline,
    state: RwLock<SessionState>,
    history: RwLock<Vec<ConversationTurn>>,
}

impl Session {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            state: RwLock::new(SessionState::Empty),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> Result<SessionStatus> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(state.status())
    }

    pub fn history(&self) -> Result<Vec<ConversationTurn>> {
        let history = self
            .history
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(history.clone())
    }

    fn begin_indexing(&self) -> Result<IndexingGuard<'_>> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let previous = match &*state {
            SessionState::Indexing => {
                return Err(DomainError::not_ready("a document is already being indexed"))
            }
            SessionState::Empty => None,
            SessionState::Ready(index) => Some(index.clone()),
        };
        *state = SessionState::Indexing;

        Ok(IndexingGuard {
            state: &self.state,
            previous: Some(previous),
        })
    }

    /// Chunks and indexes `document`, replacing the active one on success.
    ///
    /// On failure the previously active index (if any) stays active.
    #[instrument(skip(self, document), fields(session = %self.id, document_id = %document.id))]
    pub async fn process_document(&self, document: Document) -> Result<SessionStatus> {
        let guard = self.begin_indexing()?;
        info!(name = %document.name, chars = document.text.chars().count(), "indexing started");

        let index = match self.build(&document).await {
            Ok(index) => index,
            Err(e) => {
                error!(error = %e, "indexing failed");
                return Err(e);
            }
        };

        guard.complete(Arc::new(index))?;
        let status = self.status()?;
        info!(chunks = status.chunk_count, "session ready");
        Ok(status)
    }

    async fn build(&self, document: &Document) -> Result<VectorIndex> {
        let Some(dir) = &self.pipeline.index_dir else {
            return self.pipeline.rag.index_document(document).await;
        };

        let location = dir.join(document.id.to_string());
        if VectorIndex::exists(&location).await {
            match self.load_compatible(&location).await {
                Ok(index) if index.document_id() == document.id => {
                    info!(location = %location.display(), "reusing persisted index");
                    return Ok(index);
                }
                Ok(_) => warn!(location = %location.display(), "persisted index belongs to another document"),
                Err(e) => warn!(error = %e, "persisted index unusable, rebuilding"),
            }
        }

        let index = self.pipeline.rag.index_document(document).await?;
        if let Err(e) = index.persist(&location).await {
            warn!(error = %e, location = %location.display(), "could not cache built index");
        }
        Ok(index)
    }

    async fn load_compatible(&self, location: &Path) -> Result<VectorIndex> {
        let index = VectorIndex::load(location).await?;
        index.ensure_compatible(&self.pipeline.rag.tag())?;
        Ok(index)
    }

    /// Activates an index persisted at `location` without re-embedding.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn restore(&self, location: &Path) -> Result<SessionStatus> {
        let guard = self.begin_indexing()?;
        let index = self.load_compatible(location).await?;
        guard.complete(Arc::new(index))?;
        info!("session restored from persisted index");
        self.status()
    }

    /// Writes the active index to `location`.
    pub async fn persist(&self, location: &Path) -> Result<()> {
        let index = self.active_index()?;
        index.persist(location).await
    }

    fn active_index(&self) -> Result<Arc<VectorIndex>> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        match &*state {
            SessionState::Empty => Err(DomainError::IndexNotBuilt),
            SessionState::Indexing => {
                Err(DomainError::not_ready("document indexing is in progress"))
            }
            SessionState::Ready(index) => Ok(index.clone()),
        }
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let top_k = self.pipeline.rag.default_top_k();
        self.ask_top_k(question, top_k).await
    }

    /// Retrieves, composes, and generates an answer grounded in the active
    /// document.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn ask_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::invalid_input("question must not be empty"));
        }

        let index = self.active_index()?;
        let retrieved = self.pipeline.rag.retrieve_top_k(&index, question, top_k).await?;

        let answer = match self.pipeline.composer.compose(question, &retrieved) {
            ComposedPrompt::Refusal => Answer::refusal(self.pipeline.composer.refusal()),
            ComposedPrompt::Grounded { prompt, .. } => {
                let raw = self.pipeline.generator.generate(&prompt).await?;
                self.pipeline.composer.interpret(&raw, retrieved)
            }
        };

        info!(
            refused = answer.refused,
            citations = ?answer.citations,
            "question answered"
        );
        self.record(ConversationTurn::new(question, index.document_id(), &answer))?;
        Ok(answer)
    }

    fn record(&self, turn: ConversationTurn) -> Result<()> {
        self.history
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .push(turn);
        Ok(())
    }

    /// Discards the active index and history.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn reset(&self) -> Result<()> {
        {
            let mut state = self
                .state
                .write()
                .map_err(|e| DomainError::internal(e.to_string()))?;
            if let SessionState::Indexing = &*state {
                return Err(DomainError::not_ready("document indexing is in progress"));
            }
            *state = SessionState::Empty;
        }
        self.clear_turns()?;
        info!("session reset");
        Ok(())
    }

    /// Empties the question log; the active document stays loaded.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn clear_history(&self) -> Result<()> {
        self.clear_turns()?;
        info!("history cleared");
        Ok(())
    }

    fn clear_turns(&self) -> Result<()> {
        self.history
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .clear();
        Ok(())
    }
}

/// Independent sessions keyed by id; sessions share no mutable state.
pub struct SessionRegistry {
    pipeline: Pipeline,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self) -> Result<Arc<Session>> {
        let session = Arc::new(Session::new(self.pipeline.clone()));
        self.sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .insert(session.id(), session.clone());
        info!(session = %session.id(), "session created");
        Ok(session)
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    /// Ends a session, releasing its index.
    pub fn remove(&self, id: Uuid) -> Result<()> {
        self.sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .remove(&id)
            .map(|_| info!(session = %id, "session closed"))
            .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
