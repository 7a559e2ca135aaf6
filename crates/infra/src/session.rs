//! Command session: the surface a UI layer drives.
//!
//! One `StorageSession` owns everything a single storage actor operates on:
//! the discovered backends, the item index, the routing rules and the current
//! view settings. Commands run one at a time to completion.
//!
//! ```text
//! refresh()      host ──discover──▶ BackendSet ──scan──▶ ItemIndex
//! withdraw()     ItemIndex ⇄ withdrawal allocator ⇄ backends ─▶ local actor
//! deposit_all()  local actor ─▶ deposit allocator ⇄ backends ⇄ ItemIndex
//! view()         ItemIndex ──search/sort──▶ rows (read-only)
//! ```
//!
//! Routing and backend failures abort the command and are returned as
//! [`DomainError`]; every transfer that already happened stays recorded in
//! the index. Short transfers and lack of stock or room only show up as
//! smaller counts in the outcomes.
//!
//! The index is not told about changes made by anyone else. Records can go
//! stale between refreshes; calling [`StorageSession::refresh`] is the only
//! way to resync.

use std::sync::Arc;

use serde::Serialize;

use depot_core::{DomainError, DomainResult, ItemIdentity, OperationId};
use depot_inventory::{
    BackendSet, DepositReport, ItemIndex, LocalInventory, RoutingPolicy, SortMode, StackRecord,
    TransferContext, UsageSummary, ViewQuery, WithdrawOutcome, deposit_all, project, withdraw,
};

use crate::config::DepotConfig;
use crate::discovery::{PeripheralHost, discover_backends};

/// Totals reported by a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub backends: usize,
    pub kinds: usize,
    pub units: u64,
}

pub struct StorageSession {
    host: Arc<dyn PeripheralHost>,
    local: Arc<dyn LocalInventory>,
    config: DepotConfig,
    routing: RoutingPolicy,
    backends: BackendSet,
    index: ItemIndex,
    query: ViewQuery,
}

impl core::fmt::Debug for StorageSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StorageSession")
            .field("backends", &self.backends.len())
            .field("kinds", &self.index.len())
            .field("query", &self.query)
            .finish()
    }
}

impl StorageSession {
    /// New session with an empty index; call [`refresh`](Self::refresh) before use.
    pub fn new(host: Arc<dyn PeripheralHost>, local: Arc<dyn LocalInventory>, config: DepotConfig) -> Self {
        let routing = config.routing_policy();
        let query = ViewQuery {
            search: String::new(),
            sort: config.default_sort,
        };
        Self {
            host,
            local,
            config,
            routing,
            backends: BackendSet::new(),
            index: ItemIndex::new(),
            query,
        }
    }

    /// Rediscover backends and rebuild the index from a full scan.
    ///
    /// On failure the previous backends and index are kept.
    pub fn refresh(&mut self) -> DomainResult<RefreshSummary> {
        let op = OperationId::new();
        let span = tracing::info_span!("refresh", %op);
        let _guard = span.enter();

        let backends = discover_backends(self.host.as_ref(), &self.config)?;
        let index = ItemIndex::build(&backends)?;

        self.backends = backends;
        self.index = index;

        Ok(RefreshSummary {
            backends: self.backends.len(),
            kinds: self.index.len(),
            units: self.index.total_units(),
        })
    }

    /// Withdraw `quantity` units (default: one full stack) to the local actor.
    ///
    /// An identity the index does not know withdraws nothing. Its stack size is
    /// unknown too, so a defaulted quantity is reported as a request for 0.
    pub fn withdraw(&mut self, identity: &ItemIdentity, quantity: Option<u32>) -> DomainResult<WithdrawOutcome> {
        let op = OperationId::new();
        let span = tracing::info_span!("withdraw", %op, item = %identity);
        let _guard = span.enter();

        let ctx = TransferContext::new(&self.backends, &self.routing);
        let Some(record) = self.index.lookup_mut(identity) else {
            tracing::info!("item not in storage");
            return Ok(WithdrawOutcome {
                identity: identity.clone(),
                requested: quantity.unwrap_or(0),
                withdrawn: 0,
            });
        };

        let outcome = withdraw(&ctx, record, quantity).inspect_err(|e| {
            tracing::error!(error = %e, "withdrawal aborted");
        })?;
        tracing::info!(
            requested = outcome.requested,
            withdrawn = outcome.withdrawn,
            "withdrawal finished"
        );
        Ok(outcome)
    }

    /// Deposit every occupied local slot into storage.
    pub fn deposit_all(&mut self) -> DomainResult<DepositReport> {
        let op = OperationId::new();
        let span = tracing::info_span!("deposit_all", %op);
        let _guard = span.enter();

        let ctx = TransferContext::new(&self.backends, &self.routing);
        deposit_all(&ctx, &mut self.index, self.local.as_ref()).inspect_err(|e| {
            tracing::error!(error = %e, "deposit pass aborted");
        })
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.query.search = text.into();
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.query.sort = mode;
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    /// Current rows for display.
    pub fn view(&self) -> Vec<&StackRecord> {
        project(&self.index, &self.query)
    }

    pub fn usage(&self) -> DomainResult<UsageSummary> {
        UsageSummary::compute(&self.index, &self.backends)
    }

    pub fn index(&self) -> &ItemIndex {
        &self.index
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Look up a record by display name (case-insensitive exact match) or identity text.
    pub fn resolve_item(&self, text: &str) -> DomainResult<ItemIdentity> {
        let wanted = text.trim().to_lowercase();
        if let Some(record) = self
            .index
            .records()
            .find(|r| r.display_name().to_lowercase() == wanted)
        {
            return Ok(record.identity().clone());
        }
        let identity = ItemIdentity::parse(text)?;
        if self.index.lookup(&identity).is_some() {
            Ok(identity)
        } else {
            Err(DomainError::not_found())
        }
    }
}
