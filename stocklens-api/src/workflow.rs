/// Counting workflow orchestrator
///
/// Drives the token-metered analysis flow for every user:
///
/// ```text
/// Idle --analyze--> Analyzing --ok--> ReviewingResults --confirm--> Saving --> Idle
///        |               |                  |                          |
///        |            failure            cancel                    failure
///        |               v                  v                          v
///        +------------ Idle               Idle            ReviewingResults (retry)
/// ```
///
/// Tokens are debited BEFORE the vision call and are not refunded when the
/// call fails. The debit itself is the authority on affordability: the
/// conditional ledger update either covers the cost or leaves the balance
/// untouched, so concurrent analyses can never overdraw an account.
///
/// Per-user state (the draft under review and the export selection) lives
/// in an in-process session map keyed by email. The map's lock is never
/// held across an await.

use crate::export::{self, ExportError, Selection};
use crate::recognition::{CountedItem, RecognitionError, RecognitionGateway};
use crate::storage::PhotoStore;
use crate::store::{InventoryStore, StoreError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stocklens_shared::ledger::{Ledger, LedgerError};
use stocklens_shared::models::record::{InventoryRecord, NewInventoryRecord};

/// Tokens debited per analysis
pub const COST_PER_ANALYSIS: i64 = 30;

/// Maximum records returned by a history query
pub const HISTORY_LIMIT: i64 = 50;

/// Workflow error types
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Balance does not cover the analysis cost
    #[error("Insufficient balance: {balance} available, {cost} required")]
    InsufficientBalance { balance: i64, cost: i64 },

    /// The vision call failed after the debit; tokens are not refunded
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    /// No analysis results are under review
    #[error("No results to review")]
    NoActiveReview,

    /// Result item index out of range
    #[error("No result item at index {0}")]
    ItemIndex(usize),

    /// Export requested with nothing selected
    #[error("Nothing selected for export")]
    EmptySelection,

    /// Ledger failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Record persistence failure; the draft is retained for retry
    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// Workbook rendering failure
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Items awaiting confirmation, plus the photo they came from
#[derive(Debug, Clone)]
struct ReviewDraft {
    items: Vec<CountedItem>,
    photo: Vec<u8>,
}

/// Per-user workflow state
#[derive(Debug, Default)]
struct Session {
    draft: Option<ReviewDraft>,
    selection: Selection,
}

/// Result of a successful analysis
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    /// Recognized items, now under review
    pub items: Vec<CountedItem>,

    /// Balance after the debit
    pub balance: i64,
}

/// Orchestrates ledger, recognition, storage, and persistence
///
/// All collaborators sit behind traits so the workflow's behavior can be
/// tested against in-memory doubles.
pub struct Workflow {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn RecognitionGateway>,
    photos: Arc<dyn PhotoStore>,
    store: Arc<dyn InventoryStore>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl Workflow {
    /// Creates a workflow over the given collaborators
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn RecognitionGateway>,
        photos: Arc<dyn PhotoStore>,
        store: Arc<dyn InventoryStore>,
    ) -> Self {
        Workflow {
            ledger,
            gateway,
            photos,
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn with_session<T>(&self, user_email: &str, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        let session = sessions.entry(user_email.to_string()).or_default();
        f(session)
    }

    /// Current token balance
    pub async fn balance(&self, user_email: &str) -> Result<i64, WorkflowError> {
        Ok(self.ledger.balance(user_email).await?)
    }

    /// Runs one analysis: debit, vision call, draft
    ///
    /// The debit happens first and is not refunded on failure. A failed
    /// vision call leaves the user with no draft, free to retry (and pay
    /// again).
    ///
    /// # Errors
    ///
    /// - `InsufficientBalance` when the conditional debit does not go
    ///   through; the balance is untouched and the gateway is never called
    /// - `Recognition` when the vision call or response validation fails
    pub async fn analyze(
        &self,
        user_email: &str,
        image: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<AnalyzeOutcome, WorkflowError> {
        let balance = self.ledger.balance(user_email).await?;
        if balance < COST_PER_ANALYSIS {
            tracing::info!(user = %user_email, balance, "Analysis blocked: balance below cost");
            return Err(WorkflowError::InsufficientBalance {
                balance,
                cost: COST_PER_ANALYSIS,
            });
        }

        // The guard read is advisory; the conditional debit decides. A debit
        // lost to a concurrent spend aborts the same way.
        let debited = self.ledger.try_debit(user_email, COST_PER_ANALYSIS).await?;
        if !debited {
            let balance = self.ledger.balance(user_email).await?;
            return Err(WorkflowError::InsufficientBalance {
                balance,
                cost: COST_PER_ANALYSIS,
            });
        }

        match self.gateway.recognize(&image, hint).await {
            Ok(items) => {
                tracing::info!(user = %user_email, items = items.len(), "Analysis complete");
                self.with_session(user_email, |session| {
                    session.draft = Some(ReviewDraft {
                        items: items.clone(),
                        photo: image,
                    });
                });
                let balance = self.ledger.balance(user_email).await?;
                Ok(AnalyzeOutcome { items, balance })
            }
            Err(e) => {
                // Tokens already spent; back to idle with nothing to review.
                tracing::warn!(user = %user_email, error = %e, "Analysis failed after debit");
                self.with_session(user_email, |session| session.draft = None);
                Err(e.into())
            }
        }
    }

    /// Items currently under review
    pub fn current_review(&self, user_email: &str) -> Result<Vec<CountedItem>, WorkflowError> {
        self.with_session(user_email, |session| {
            session
                .draft
                .as_ref()
                .map(|d| d.items.clone())
                .ok_or(WorkflowError::NoActiveReview)
        })
    }

    /// Renames one item in the draft
    pub fn edit_label(
        &self,
        user_email: &str,
        index: usize,
        label: &str,
    ) -> Result<Vec<CountedItem>, WorkflowError> {
        self.with_session(user_email, |session| {
            let draft = session.draft.as_mut().ok_or(WorkflowError::NoActiveReview)?;
            let item = draft
                .items
                .get_mut(index)
                .ok_or(WorkflowError::ItemIndex(index))?;
            item.label = label.trim().to_string();
            Ok(draft.items.clone())
        })
    }

    /// Drops one item from the draft
    pub fn remove_item(
        &self,
        user_email: &str,
        index: usize,
    ) -> Result<Vec<CountedItem>, WorkflowError> {
        self.with_session(user_email, |session| {
            let draft = session.draft.as_mut().ok_or(WorkflowError::NoActiveReview)?;
            if index >= draft.items.len() {
                return Err(WorkflowError::ItemIndex(index));
            }
            draft.items.remove(index);
            Ok(draft.items.clone())
        })
    }

    /// Discards the draft without saving
    ///
    /// Idempotent: cancelling with nothing under review is a no-op. The
    /// tokens spent on the analysis stay spent.
    pub fn cancel(&self, user_email: &str) {
        self.with_session(user_email, |session| session.draft = None);
    }

    /// Persists the draft as inventory records
    ///
    /// The photo upload is best effort; records are saved without a URL
    /// when it fails. On persistence failure the draft is retained so the
    /// user can retry without paying for another analysis.
    ///
    /// Returns the refreshed history, newest first.
    pub async fn confirm(&self, user_email: &str) -> Result<Vec<InventoryRecord>, WorkflowError> {
        let draft = self.with_session(user_email, |session| {
            session.draft.clone().ok_or(WorkflowError::NoActiveReview)
        })?;

        if draft.items.is_empty() {
            // All items were removed during review; nothing to save.
            self.with_session(user_email, |session| session.draft = None);
            return self.history(user_email, HISTORY_LIMIT).await;
        }

        let photo_url = self.photos.upload(&draft.photo).await;

        let records: Vec<NewInventoryRecord> = draft
            .items
            .iter()
            .map(|item| NewInventoryRecord {
                user_email: user_email.to_string(),
                label: item.label.clone(),
                count: item.count,
                photo_url: photo_url.clone(),
            })
            .collect();

        let saved = self.store.insert_many(&records).await?;
        tracing::info!(user = %user_email, records = saved.len(), "Inventory records saved");

        self.with_session(user_email, |session| session.draft = None);
        self.history(user_email, HISTORY_LIMIT).await
    }

    /// Recent history, newest first, capped at [`HISTORY_LIMIT`]
    pub async fn history(
        &self,
        user_email: &str,
        limit: i64,
    ) -> Result<Vec<InventoryRecord>, WorkflowError> {
        let limit = limit.clamp(1, HISTORY_LIMIT);
        Ok(self.store.list_recent(user_email, limit).await?)
    }

    /// Flips one record in or out of the export selection
    pub fn selection_toggle(&self, user_email: &str, id: uuid::Uuid) -> usize {
        self.with_session(user_email, |session| {
            session.selection.toggle(id);
            session.selection.len()
        })
    }

    /// Selects every record currently in history
    pub async fn selection_select_all(&self, user_email: &str) -> Result<usize, WorkflowError> {
        let records = self.history(user_email, HISTORY_LIMIT).await?;
        Ok(self.with_session(user_email, |session| {
            session.selection.select_all(records.iter().map(|r| r.id));
            session.selection.len()
        }))
    }

    /// Empties the export selection
    pub fn selection_clear(&self, user_email: &str) {
        self.with_session(user_email, |session| session.selection.clear());
    }

    /// Renders the selected records as an XLSX download
    ///
    /// Returns the filename and workbook bytes.
    ///
    /// # Errors
    ///
    /// Returns `EmptySelection` when nothing is selected or the selected
    /// IDs no longer appear in history
    pub async fn export(&self, user_email: &str) -> Result<(String, Vec<u8>), WorkflowError> {
        let selection = self.with_session(user_email, |session| session.selection.clone());
        if selection.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let records = self.history(user_email, HISTORY_LIMIT).await?;
        let rows = export::export_rows(&records, &selection);
        if rows.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let bytes = export::render_workbook(&rows)?;
        Ok((export::export_filename(Utc::now()), bytes))
    }
}
