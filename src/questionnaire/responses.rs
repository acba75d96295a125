//! Prioritized responses — in-memory rank lists mirrored to the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{QuestionCatalog, settings_keys};
use crate::error::StorageError;
use crate::store::Store;

/// Question id → option ids, first element = highest priority.
///
/// No option id appears twice within one question's sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrioritizedResponses {
    by_question: HashMap<String, Vec<String>>,
}

impl PrioritizedResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows, dropping repeated option ids (first occurrence wins).
    pub fn from_stored(rows: HashMap<String, Vec<String>>) -> Self {
        let by_question = rows
            .into_iter()
            .map(|(question_id, option_ids)| {
                let mut unique: Vec<String> = Vec::with_capacity(option_ids.len());
                for id in option_ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                (question_id, unique)
            })
            .collect();
        Self { by_question }
    }

    /// Remove `option_id` if selected (closing the gap), else append it as the
    /// lowest priority. Returns the resulting sequence.
    pub fn toggle(&mut self, question_id: &str, option_id: &str) -> &[String] {
        let ranked = self.by_question.entry(question_id.to_string()).or_default();
        match ranked.iter().position(|id| id == option_id) {
            Some(index) => {
                ranked.remove(index);
            }
            None => ranked.push(option_id.to_string()),
        }
        ranked
    }

    /// 1-based rank of an option, `None` if not selected.
    pub fn priority_of(&self, question_id: &str, option_id: &str) -> Option<usize> {
        self.selections(question_id)
            .iter()
            .position(|id| id == option_id)
            .map(|index| index + 1)
    }

    pub fn is_selected(&self, question_id: &str, option_id: &str) -> bool {
        self.priority_of(question_id, option_id).is_some()
    }

    /// Selected option ids in rank order (empty if none).
    pub fn selections(&self, question_id: &str) -> &[String] {
        self.by_question
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        !self.selections(question_id).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.by_question.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.by_question.clear();
    }

    /// Render every answered question in catalog order.
    ///
    /// Questions without selections are omitted; ids missing from the catalog
    /// are skipped. Returns an empty string when nothing is selected.
    pub fn summary(&self, catalog: &QuestionCatalog) -> String {
        let mut sections = Vec::new();

        for question in catalog.questions() {
            let lines: Vec<String> = self
                .selections(&question.id)
                .iter()
                .filter_map(|id| question.option(id))
                .enumerate()
                .map(|(index, option)| format!("Priority {}: {}", index + 1, option.text))
                .collect();
            if lines.is_empty() {
                continue;
            }
            sections.push(format!("{}\n{}", question.text, lines.join("\n")));
        }

        if sections.is_empty() {
            return String::new();
        }
        format!("User's prioritized goals:\n{}\n", sections.join("\n\n"))
    }
}

/// Response service: the in-memory [`PrioritizedResponses`] plus write-through
/// persistence of every mutation.
///
/// Store failures never reach the caller. Reads degrade to "no data", writes
/// are logged and counted in [`ResponseModel::storage_faults`].
pub struct ResponseModel {
    store: Arc<dyn Store>,
    catalog: Arc<QuestionCatalog>,
    responses: RwLock<PrioritizedResponses>,
    storage_faults: AtomicU64,
}

impl ResponseModel {
    /// Create the model, hydrating it from the store.
    pub async fn load(store: Arc<dyn Store>, catalog: Arc<QuestionCatalog>) -> Self {
        let model = Self {
            store,
            catalog,
            responses: RwLock::new(PrioritizedResponses::new()),
            storage_faults: AtomicU64::new(0),
        };

        match model.store.get_all_responses().await {
            Ok(rows) => {
                info!(questions = rows.len(), "Loaded stored responses");
                *model.responses.write().await = PrioritizedResponses::from_stored(rows);
            }
            Err(e) => model.record_storage_fault("get_all_responses", &e),
        }

        model
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Toggle an option and persist the question's full resulting sequence.
    pub async fn toggle(&self, question_id: &str, option_id: &str) -> Vec<String> {
        // The write lock is held across the store write so persisted order
        // always matches in-memory order.
        let mut responses = self.responses.write().await;
        let ranked = responses.toggle(question_id, option_id).to_vec();
        debug!(question_id, option_id, ranked = ?ranked, "Response toggled");

        if let Err(e) = self.store.put_responses(question_id, &ranked).await {
            self.record_storage_fault("put_responses", &e);
        }
        ranked
    }

    pub async fn priority_of(&self, question_id: &str, option_id: &str) -> Option<usize> {
        self.responses.read().await.priority_of(question_id, option_id)
    }

    pub async fn is_selected(&self, question_id: &str, option_id: &str) -> bool {
        self.responses.read().await.is_selected(question_id, option_id)
    }

    pub async fn selections(&self, question_id: &str) -> Vec<String> {
        self.responses.read().await.selections(question_id).to_vec()
    }

    pub async fn is_answered(&self, question_id: &str) -> bool {
        self.responses.read().await.is_answered(question_id)
    }

    /// Copy of the current response map.
    pub async fn snapshot(&self) -> PrioritizedResponses {
        self.responses.read().await.clone()
    }

    /// Serialized profile for prompting, in catalog order.
    pub async fn formatted_summary(&self) -> String {
        self.responses.read().await.summary(&self.catalog)
    }

    /// Empty all responses, purge stored rows and the completion flag.
    pub async fn clear(&self) {
        let mut responses = self.responses.write().await;
        responses.clear();

        if let Err(e) = self.store.clear_responses().await {
            self.record_storage_fault("clear_responses", &e);
        }
        if let Err(e) = self
            .store
            .delete_setting(settings_keys::QUESTIONNAIRE_COMPLETED)
            .await
        {
            self.record_storage_fault("delete_setting", &e);
        }
        info!("Responses cleared");
    }

    /// Completion flag; absent or unreadable means `false`.
    pub async fn is_questionnaire_completed(&self) -> bool {
        match self
            .store
            .get_setting(settings_keys::QUESTIONNAIRE_COMPLETED)
            .await
        {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                self.record_storage_fault("get_setting", &e);
                false
            }
        }
    }

    pub async fn set_questionnaire_completed(&self, completed: bool) {
        let value = if completed { "true" } else { "false" };
        if let Err(e) = self
            .store
            .set_setting(settings_keys::QUESTIONNAIRE_COMPLETED, value)
            .await
        {
            self.record_storage_fault("set_setting", &e);
        }
    }

    /// Number of store failures swallowed so far.
    pub fn storage_faults(&self) -> u64 {
        self.storage_faults.load(Ordering::Relaxed)
    }

    pub(crate) fn record_storage_fault(&self, operation: &str, error: &StorageError) {
        self.storage_faults.fetch_add(1, Ordering::Relaxed);
        warn!(operation, error = %error, "Store operation failed, continuing without it");
    }
}
