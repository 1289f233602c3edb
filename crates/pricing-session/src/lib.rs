#![deny(warnings)]

//! Pricing session: the live price table of one execution context (a tab,
//! a window, an embedded UI) and the calculation derived from it.
//!
//! A session is an owned value handed to whatever UI code needs it. It keeps
//! its table in step with other sessions through the store's change
//! broadcast: every save publishes the full table, and [`PricingSession::sync`]
//! replaces the local copy with the newest one received (last write wins).

pub mod proposal;

pub use proposal::{
    build_request, ClientRecord, ProposalRenderer, ProposalRequest, PROPOSAL_TEMPLATE,
};

use chrono::{DateTime, NaiveDate, Utc};
use pricing_core::{
    parse_amount, Calculation, Category, PriceEntry, PriceError, PriceTable, ProjectSpec,
};
use pricing_engine::{calculate, payment_schedule, EngineError};
use pricing_store::{
    export_file_name, Confirm, ImportError, PriceStore, StoreError, SubscriptionId, TableChanged,
};
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("no project has been described yet")]
    NoProject,
    #[error("proposal rendering failed: {0:#}")]
    Render(anyhow::Error),
}

/// Result of a table change that was applied in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Persisted and broadcast at the given time.
    Saved(DateTime<Utc>),
    /// Applied in memory only; the medium could not be written. The next
    /// successful save persists it.
    Unsaved { reason: String },
}

pub struct PricingSession {
    store: PriceStore,
    table: PriceTable,
    last_updated: Option<DateTime<Utc>>,
    updated_by: Option<String>,
    unsaved: bool,
    project: Option<ProjectSpec>,
    calculation: Option<Result<Calculation, EngineError>>,
    inbox: Receiver<TableChanged>,
    subscription: SubscriptionId,
}

impl PricingSession {
    /// Load the stored table (or defaults) and start listening for changes.
    pub fn open(store: PriceStore) -> Self {
        let (tx, inbox) = mpsc::channel();
        let subscription = store.notifier().subscribe(Box::new(move |ev: &TableChanged| {
            // receiver gone means the session is being dropped
            let _ = tx.send(ev.clone());
        }));
        let record = store.load_record();
        let (table, last_updated, updated_by) = match record {
            Some(r) => (r.data, Some(r.last_updated), r.updated_by),
            None => (PriceTable::default(), None, None),
        };
        info!(stored = last_updated.is_some(), "pricing session opened");
        Self {
            store,
            table,
            last_updated,
            updated_by,
            unsaved: false,
            project: None,
            calculation: None,
            inbox,
            subscription,
        }
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    /// When the live table was last saved, by this or another session.
    pub fn last_updated_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn last_updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    /// True while an in-memory edit has not reached the medium.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn project(&self) -> Option<&ProjectSpec> {
        self.project.as_ref()
    }

    /// Replace the project description and recalculate.
    pub fn set_project(&mut self, spec: ProjectSpec) -> Result<&Calculation, SessionError> {
        self.project = Some(spec);
        self.recalculate();
        match self.current_calculation() {
            Some(Ok(c)) => Ok(c),
            Some(Err(e)) => Err(e.clone().into()),
            None => Err(SessionError::NoProject),
        }
    }

    /// Calculation for the latest table and project; `None` before any project is set.
    pub fn current_calculation(&self) -> Option<Result<&Calculation, &EngineError>> {
        self.calculation.as_ref().map(|r| r.as_ref())
    }

    fn recalculate(&mut self) {
        self.calculation = self
            .project
            .as_ref()
            .map(|spec| calculate(&self.table, spec));
        if let Some(Err(e)) = &self.calculation {
            debug!(error = %e, "project cannot be priced");
        }
    }

    /// Edit one price from UI strings: category and key names as stored,
    /// `raw_value` as typed by the user.
    pub fn update_price(
        &mut self,
        category: &str,
        key: &str,
        raw_value: &str,
        actor: Option<&str>,
    ) -> Result<EditOutcome, SessionError> {
        let category: Category = category.parse()?;
        let entry = PriceEntry::parse(category, key)?;
        let value = parse_amount(raw_value)?;
        let next = self.store.prepare_edit(&self.table, entry.clone(), value)?;
        info!(entry = %entry, %value, "price edited");
        self.commit(next, actor)
    }

    /// Replace every customization with the defaults.
    pub fn reset(
        &mut self,
        confirm: Confirm,
        actor: Option<&str>,
    ) -> Result<EditOutcome, SessionError> {
        if confirm != Confirm::Yes {
            return Err(StoreError::NotConfirmed.into());
        }
        info!("resetting price table to defaults");
        self.commit(PriceTable::default(), actor)
    }

    pub fn export(&self) -> Result<Vec<u8>, SessionError> {
        Ok(self.store.export(&self.table)?)
    }

    pub fn export_file_name(&self, today: NaiveDate) -> String {
        export_file_name(today)
    }

    /// Import a backup. Missing entries take their defaults; the result must
    /// satisfy the price bounds as a whole or nothing changes.
    pub fn import(
        &mut self,
        bytes: &[u8],
        actor: Option<&str>,
    ) -> Result<EditOutcome, SessionError> {
        let table = self.store.import(bytes)?;
        self.commit(table, actor)
    }

    fn commit(
        &mut self,
        next: PriceTable,
        actor: Option<&str>,
    ) -> Result<EditOutcome, SessionError> {
        match self.store.save(&next, actor) {
            Ok(record) => {
                self.table = record.data;
                self.last_updated = Some(record.last_updated);
                self.updated_by = record.updated_by;
                self.unsaved = false;
                self.recalculate();
                Ok(EditOutcome::Saved(record.last_updated))
            }
            Err(StoreError::PersistenceUnavailable(reason)) => {
                warn!(%reason, "price table not persisted, keeping edit in memory");
                self.table = next;
                self.unsaved = true;
                self.recalculate();
                Ok(EditOutcome::Unsaved { reason })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply the newest table broadcast since the last call, including saves
    /// the notifier picks up from other processes. Returns whether the live
    /// table changed.
    pub fn sync(&mut self) -> bool {
        self.store.notifier().poll();
        let Some(latest) = self.inbox.try_iter().last() else {
            return false;
        };
        let changed = latest.table != self.table;
        self.table = latest.table;
        self.last_updated = Some(latest.last_updated);
        self.updated_by = latest.updated_by;
        self.unsaved = false;
        if changed {
            debug!(updated_by = ?self.updated_by, "price table reloaded from broadcast");
            self.recalculate();
        }
        changed
    }

    /// Discard the live table and read the medium again.
    pub fn reload(&mut self) {
        let _ = self.inbox.try_iter().count();
        match self.store.load_record() {
            Some(r) => {
                self.table = r.data;
                self.last_updated = Some(r.last_updated);
                self.updated_by = r.updated_by;
            }
            None => {
                self.table = PriceTable::default();
                self.last_updated = None;
                self.updated_by = None;
            }
        }
        self.unsaved = false;
        self.recalculate();
    }

    /// Renderer request for the current project and calculation.
    pub fn proposal_request(
        &self,
        client: &ClientRecord,
    ) -> Result<ProposalRequest, SessionError> {
        let spec = self.project.as_ref().ok_or(SessionError::NoProject)?;
        let calculation = match self.current_calculation() {
            Some(Ok(c)) => c,
            Some(Err(e)) => return Err(e.clone().into()),
            None => return Err(SessionError::NoProject),
        };
        let schedule = payment_schedule(&self.table, calculation);
        Ok(build_request(client, spec, calculation, &schedule))
    }

    /// Render a proposal document through the external renderer.
    pub fn request_proposal(
        &self,
        renderer: &dyn ProposalRenderer,
        client: &ClientRecord,
    ) -> Result<Vec<u8>, SessionError> {
        let request = self.proposal_request(client)?;
        renderer.render(&request).map_err(|e| {
            warn!(error = %e, "proposal rendering failed");
            SessionError::Render(e)
        })
    }
}

impl Drop for PricingSession {
    fn drop(&mut self) {
        self.store.notifier().unsubscribe(self.subscription);
    }
}
