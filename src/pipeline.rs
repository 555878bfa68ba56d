//! Reactive Pipeline - Debounce, Validate, Generate, Publish
//!
//! One session owns the config. Edits restart the debounce window and
//! only the newest ticket may run a cycle; every cycle validates, and
//! generation is gated by `PipelineSettings::always_generate`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{PreinstallId, PreinstallSelections};
use crate::config::{ConfigEdit, FieldKey, L1Config};
use crate::genesis::{GenesisGenerator, GenesisOutput, GenesisRequest};
use crate::hashing::document_digest;
use crate::limits::EngineLimits;
use crate::size::{SizeBudget, SizeReport};
use crate::validation::{ValidationResult, Validator};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline task has stopped")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Debouncing,
    Validating,
    Generating,
    Skipped,
    Published,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SetField(FieldKey, Value),
    Edit(ConfigEdit),
    SetCatalogSelection(PreinstallId, bool),
    AdoptWalletAddress(String),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub debounce: Duration,
    /// Publish a document even when validation has errors.
    pub always_generate: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            always_generate: false,
        }
    }
}

/// Proof of the edit that armed the debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket {
    pub id: u64,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub validations: u64,
    pub generations: u64,
    pub superseded: u64,
}

/// The tuple external consumers subscribe to.
#[derive(Debug, Clone)]
pub struct PublishedGenesis {
    pub session_id: Uuid,
    pub revision: u64,
    pub document: GenesisOutput,
    pub validation: ValidationResult,
    pub size: SizeReport,
    pub digest: String,
    pub stats: CycleStats,
}

/// Single-writer editing session
pub struct EditSession {
    session_id: Uuid,
    config: L1Config,
    selections: PreinstallSelections,
    validator: Validator,
    generator: GenesisGenerator,
    budget: SizeBudget,
    settings: PipelineSettings,
    state: PipelineState,
    latest_ticket: u64,
    revision: u64,
    stats: CycleStats,
    /// Form inputs that could not be parsed, held until the field is edited again.
    rejected: BTreeMap<FieldKey, String>,
    publisher: watch::Sender<Arc<PublishedGenesis>>,
}

impl EditSession {
    /// Opens a session and publishes the starting config immediately.
    pub fn new(
        request: GenesisRequest,
        limits: EngineLimits,
        generator: GenesisGenerator,
        settings: PipelineSettings,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let budget = SizeBudget::from_limits(&limits);
        let (publisher, _) = watch::channel(Arc::new(PublishedGenesis {
            session_id,
            revision: 0,
            document: GenesisOutput::Cleared,
            validation: ValidationResult::default(),
            size: budget.measure(""),
            digest: document_digest(""),
            stats: CycleStats::default(),
        }));

        let mut session = Self {
            session_id,
            config: request.config,
            selections: request.preinstalls,
            validator: Validator::new(limits),
            generator,
            budget,
            settings,
            state: PipelineState::Idle,
            latest_ticket: 0,
            revision: 0,
            stats: CycleStats::default(),
            rejected: BTreeMap::new(),
            publisher,
        };
        session.run_cycle();
        session
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &L1Config {
        &self.config
    }

    pub fn selections(&self) -> &PreinstallSelections {
        &self.selections
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PublishedGenesis>> {
        self.publisher.subscribe()
    }

    pub fn latest(&self) -> Arc<PublishedGenesis> {
        self.publisher.borrow().clone()
    }

    /// Applies the mutation and re-arms the debounce timer. Any earlier ticket is now stale.
    /// A value that does not fit its field leaves the model alone and is published as
    /// an error on that field.
    pub fn submit(&mut self, event: PipelineEvent, now: Instant) -> DebounceTicket {
        match event {
            PipelineEvent::SetField(key, value) => match self.config.set_field(key, value) {
                Ok(()) => {
                    self.rejected.remove(&key);
                }
                Err(e) => {
                    warn!(session = %self.session_id, field = %key, error = %e, "edit rejected");
                    self.rejected.insert(key, e.to_string());
                }
            },
            PipelineEvent::Edit(edit) => {
                self.rejected.remove(&edit.field());
                self.config.apply(edit);
            }
            PipelineEvent::SetCatalogSelection(id, on) => self.selections.set(id, on),
            PipelineEvent::AdoptWalletAddress(address) => {
                if self.config.adopt_wallet_address(&address) {
                    info!(session = %self.session_id, "placeholder owner replaced by wallet");
                }
            }
            PipelineEvent::Reset => {
                let mut config = L1Config::for_limits(self.validator.limits());
                if let Some(wallet) = self.config.adopted_wallet() {
                    config.adopt_wallet_address(wallet);
                }
                self.config = config;
                self.selections = PreinstallSelections::none();
                self.rejected.clear();
            }
        }

        if self.state == PipelineState::Debouncing {
            self.stats.superseded += 1;
        }
        self.latest_ticket += 1;
        self.state = PipelineState::Debouncing;

        DebounceTicket {
            id: self.latest_ticket,
            deadline: now + self.settings.debounce,
        }
    }

    /// Runs a cycle if `ticket` is still the newest and its window has passed.
    pub fn fire(&mut self, ticket: DebounceTicket, now: Instant) -> Option<Arc<PublishedGenesis>> {
        if ticket.id != self.latest_ticket {
            debug!(session = %self.session_id, ticket = ticket.id, "stale debounce ticket ignored");
            return None;
        }
        if now < ticket.deadline || self.state != PipelineState::Debouncing {
            return None;
        }
        Some(self.run_cycle())
    }

    /// Runs a cycle now; a pending ticket becomes stale.
    pub fn flush(&mut self) -> Arc<PublishedGenesis> {
        self.latest_ticket += 1;
        self.run_cycle()
    }

    fn run_cycle(&mut self) -> Arc<PublishedGenesis> {
        self.state = PipelineState::Validating;
        let mut validation = self.validator.validate(&self.config);
        for (field, message) in &self.rejected {
            validation.reject(*field, message.clone());
        }
        self.stats.validations += 1;

        let document = if self.settings.always_generate || validation.is_valid() {
            self.state = PipelineState::Generating;
            self.stats.generations += 1;
            self.generator.generate(&self.config, &self.selections)
        } else {
            self.state = PipelineState::Skipped;
            GenesisOutput::Cleared
        };

        let text = document.text();
        let size = self.budget.measure(text);
        let digest = document_digest(text);
        self.revision += 1;

        let published = Arc::new(PublishedGenesis {
            session_id: self.session_id,
            revision: self.revision,
            document,
            validation,
            size,
            digest,
            stats: self.stats,
        });
        self.publisher.send_replace(published.clone());
        self.state = PipelineState::Published;

        info!(
            session = %self.session_id,
            revision = self.revision,
            errors = published.validation.errors.len(),
            warnings = published.validation.warnings.len(),
            bytes = published.size.bytes,
            tier = ?published.size.tier,
            "published genesis"
        );
        published
    }
}

/// Handle to a session running on its own task
pub struct PipelineHandle {
    events: mpsc::UnboundedSender<PipelineEvent>,
    published: watch::Receiver<Arc<PublishedGenesis>>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn send(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        self.events.send(event).map_err(|_| PipelineError::Closed)
    }

    pub fn set_field(&self, key: FieldKey, value: Value) -> Result<(), PipelineError> {
        self.send(PipelineEvent::SetField(key, value))
    }

    pub fn edit(&self, edit: ConfigEdit) -> Result<(), PipelineError> {
        self.send(PipelineEvent::Edit(edit))
    }

    pub fn set_catalog_selection(&self, id: PreinstallId, on: bool) -> Result<(), PipelineError> {
        self.send(PipelineEvent::SetCatalogSelection(id, on))
    }

    pub fn adopt_wallet_address(&self, address: impl Into<String>) -> Result<(), PipelineError> {
        self.send(PipelineEvent::AdoptWalletAddress(address.into()))
    }

    pub fn reset(&self) -> Result<(), PipelineError> {
        self.send(PipelineEvent::Reset)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PublishedGenesis>> {
        self.published.clone()
    }

    pub fn latest(&self) -> Arc<PublishedGenesis> {
        self.published.borrow().clone()
    }

    /// Stops accepting edits; a pending debounce is dropped unpublished.
    pub async fn shutdown(self) {
        drop(self.events);
        if let Err(e) = self.task.await {
            warn!(error = %e, "pipeline task ended abnormally");
        }
    }
}

pub fn spawn_pipeline(session: EditSession) -> PipelineHandle {
    let published = session.subscribe();
    let (events, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(session, rx));
    PipelineHandle { events, published, task }
}

async fn drive(mut session: EditSession, mut events: mpsc::UnboundedReceiver<PipelineEvent>) {
    let mut pending: Option<DebounceTicket> = None;

    loop {
        let event = match pending {
            None => events.recv().await,
            Some(ticket) => tokio::select! {
                event = events.recv() => event,
                _ = tokio::time::sleep_until(ticket.deadline) => {
                    session.fire(ticket, Instant::now());
                    pending = None;
                    continue;
                }
            },
        };

        let Some(event) = event else {
            debug!(session = %session.session_id(), "event stream closed");
            break;
        };
        pending = Some(session.submit(event, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::DEFAULT_CHAIN_ID_RANGE;
    use serde_json::json;

    const OWNER: &str = "0x1111111111111111111111111111111111111111";

    fn session(settings: PipelineSettings) -> EditSession {
        let mut config = L1Config::with_chain_id(424_242);
        config.gas_limit = 15_000_000;
        config.token_allocations[0].address = OWNER.to_string();
        EditSession::new(config.into(), EngineLimits::default(), GenesisGenerator::default(), settings)
    }

    #[test]
    fn opening_publishes_once() {
        let session = session(PipelineSettings::default());
        let latest = session.latest();
        assert_eq!(latest.revision, 1);
        assert!(latest.document.compiled().is_some());
        assert_eq!(session.state(), PipelineState::Published);
    }

    #[test]
    fn stale_ticket_does_no_work() {
        let mut session = session(PipelineSettings::default());
        let t0 = Instant::now();
        let first = session.submit(PipelineEvent::Edit(ConfigEdit::GasLimit(16_000_000)), t0);
        let second = session.submit(PipelineEvent::Edit(ConfigEdit::GasLimit(17_000_000)), t0);

        assert!(session.fire(first, first.deadline).is_none());
        assert_eq!(session.stats().validations, 1);
        assert_eq!(session.stats().superseded, 1);

        let published = session.fire(second, second.deadline).unwrap();
        assert_eq!(published.revision, 2);
        assert_eq!(
            published.document.compiled().unwrap().value["config"]["feeConfig"]["gasLimit"],
            17_000_000
        );
    }

    #[test]
    fn ticket_waits_for_deadline() {
        let mut session = session(PipelineSettings::default());
        let t0 = Instant::now();
        let ticket = session.submit(PipelineEvent::Edit(ConfigEdit::TokenSymbol("ABC".into())), t0);
        assert_eq!(session.state(), PipelineState::Debouncing);
        assert!(session.fire(ticket, t0 + Duration::from_millis(299)).is_none());
        assert!(session.fire(ticket, t0 + Duration::from_millis(300)).is_some());
        // already fired
        assert!(session.fire(ticket, t0 + Duration::from_millis(400)).is_none());
    }

    #[test]
    fn strict_gating_clears_document() {
        let mut session = session(PipelineSettings::default());
        session.submit(PipelineEvent::Edit(ConfigEdit::TokenSymbol("bad".into())), Instant::now());
        let published = session.flush();
        assert!(published.validation.error(FieldKey::TokenSymbol).is_some());
        assert_eq!(published.document, GenesisOutput::Cleared);
        assert_eq!(published.size.bytes, 0);
        assert_eq!(published.stats.generations, 1);
    }

    #[test]
    fn always_generate_keeps_document() {
        let mut session = session(PipelineSettings { always_generate: true, ..Default::default() });
        session.submit(PipelineEvent::Edit(ConfigEdit::TokenSymbol("bad".into())), Instant::now());
        let published = session.flush();
        assert!(published.validation.has_errors());
        assert!(published.document.compiled().is_some());
        assert!(published.size.bytes > 0);
    }

    #[test]
    fn rejected_field_is_published_as_error() {
        let mut session = session(PipelineSettings::default());
        let before = session.config().clone();
        session.submit(PipelineEvent::SetField(FieldKey::GasLimit, json!("x")), Instant::now());
        assert_eq!(session.config(), &before);
        assert_eq!(session.state(), PipelineState::Debouncing);

        let published = session.flush();
        assert!(published.validation.error(FieldKey::GasLimit).unwrap().contains("gasLimit"));
        assert_eq!(published.document, GenesisOutput::Cleared);

        session.submit(PipelineEvent::Edit(ConfigEdit::GasLimit(16_000_000)), Instant::now());
        let published = session.flush();
        assert!(published.validation.is_valid());
        assert!(published.document.compiled().is_some());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut session = session(PipelineSettings::default());
        session.submit(PipelineEvent::SetCatalogSelection(PreinstallId::Proxy, true), Instant::now());
        session.submit(PipelineEvent::Reset, Instant::now());
        assert!(session.selections().selected().next().is_none());
        assert_eq!(session.config().token_symbol, "TEST");
        assert_eq!(session.config().gas_limit, 12_000_000);
    }

    #[test]
    fn reset_keeps_adopted_wallet() {
        let config = L1Config::with_chain_id(424_242);
        let mut session = EditSession::new(
            config.into(),
            EngineLimits::default(),
            GenesisGenerator::default(),
            PipelineSettings::default(),
        );
        session.submit(PipelineEvent::AdoptWalletAddress(OWNER.into()), Instant::now());
        session.submit(PipelineEvent::Reset, Instant::now());
        assert_eq!(session.config().owner_address(), Some(OWNER));
        assert!(DEFAULT_CHAIN_ID_RANGE.contains(&session.config().evm_chain_id));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_publishes_only_final_state() {
        let handle = spawn_pipeline(session(PipelineSettings::default()));
        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        for gas in [16_000_000, 18_000_000, 20_000_000] {
            handle.set_field(FieldKey::GasLimit, json!(gas)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!rx.has_changed().unwrap());

        rx.changed().await.unwrap();
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.revision, 2);
        assert_eq!(published.stats.validations, 2);
        assert_eq!(published.stats.superseded, 2);
        assert_eq!(
            published.document.compiled().unwrap().value["gasLimit"],
            "0x1312d00"
        );

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn each_edit_restarts_the_window() {
        let handle = spawn_pipeline(session(PipelineSettings::default()));
        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        handle.edit(ConfigEdit::TokenName("First".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.edit(ConfigEdit::TokenName("Second".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!rx.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.revision, 2);
        assert!(published.validation.is_valid());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_edits_surface_as_errors() {
        let handle = spawn_pipeline(session(PipelineSettings::default()));
        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        handle
            .set_field(FieldKey::TokenAllocations, json!([{ "address": OWNER, "amount": -5 }]))
            .unwrap();
        handle.set_field(FieldKey::EvmChainId, json!(-1)).unwrap();
        rx.changed().await.unwrap();

        let published = rx.borrow_and_update().clone();
        assert_eq!(published.revision, 2);
        assert!(published.validation.error(FieldKey::TokenAllocations).is_some());
        assert!(published.validation.error(FieldKey::EvmChainId).is_some());
        assert_eq!(published.document, GenesisOutput::Cleared);

        handle.set_field(FieldKey::EvmChainId, json!(424_243)).unwrap();
        rx.changed().await.unwrap();
        let published = rx.borrow_and_update().clone();
        assert!(published.validation.error(FieldKey::EvmChainId).is_none());
        assert!(published.validation.error(FieldKey::TokenAllocations).is_some());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_fault_is_published_as_text() {
        let handle = spawn_pipeline(session(PipelineSettings::default()));
        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        handle.set_catalog_selection(PreinstallId::Proxy, true).unwrap();
        rx.changed().await.unwrap();
        let published = handle.latest();
        assert!(published.document.is_fault());
        assert!(published.document.text().contains("proxy"));
        assert_eq!(published.size.bytes, published.document.text().len());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn wallet_adoption_flows_through() {
        let config = L1Config::with_chain_id(424_242);
        let session = EditSession::new(
            config.into(),
            EngineLimits::embedded(),
            GenesisGenerator::default(),
            PipelineSettings::default(),
        );
        let handle = spawn_pipeline(session);
        let mut rx = handle.subscribe();
        assert!(rx
            .borrow_and_update()
            .validation
            .warning(FieldKey::TokenAllocations)
            .is_some());

        handle.adopt_wallet_address(OWNER).unwrap();
        rx.changed().await.unwrap();
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.document.compiled().unwrap().owner, OWNER);
        assert!(published.validation.warning(FieldKey::TokenAllocations).is_none());

        handle.shutdown().await;
    }
}
