//! The cart synchronizer.
//!
//! Sequences user actions against the order gateway: applies the optimistic
//! delta to the projection before the network call, reconciles with the
//! authoritative snapshot on success, rolls back and notifies on rejection,
//! and discards responses that a later operation on the same line has
//! superseded. Session expiry is recovered transparently by resetting to a
//! fresh anonymous session and replaying the in-flight operation once.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use aircart_core::{LineId, OrderSnapshot, SessionStore, SyncConfig, VariantId};
use aircart_gateway::{GatewayError, OrderGateway, RejectionKind};

use crate::notify::{NotificationSink, Severity};
use crate::pending::{OpKey, OpKind, PendingOperation, SequenceLedger};
use crate::projection::{CartProjection, CartView};
use crate::retry::retry_with_backoff;

/// How a cart operation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The server confirmed the operation; the projection was reconciled.
    Confirmed,
    /// A later operation on the same line was issued before this one's
    /// response arrived; the response was discarded.
    Superseded,
    /// The server rejected the operation on a business rule; the projection
    /// was rolled back and the user notified.
    Rejected(RejectionKind),
    /// Transport retries or session recovery were exhausted; rolled back
    /// and the user asked to retry.
    Failed,
}

struct SyncState {
    projection: CartProjection,
    ledger: SequenceLedger,
    /// Bumped on every session reset. Operations remember the epoch they
    /// were issued under so only the first to observe an expiry performs
    /// the reset.
    session_epoch: u64,
    next_local_id: u64,
}

impl SyncState {
    fn alloc_local_id(&mut self) -> u64 {
        self.next_local_id += 1;
        self.next_local_id
    }
}

/// Orchestrates the projection, the gateway, and the session store.
///
/// All methods take `&self`; operations on different lines may be awaited
/// concurrently. The projection is the single shared mutable resource and
/// is only ever touched under the state lock, never across an await point.
pub struct CartSynchronizer<G: OrderGateway> {
    gateway: G,
    session: Arc<dyn SessionStore>,
    notifier: Arc<dyn NotificationSink>,
    state: Mutex<SyncState>,
    /// Serializes session recovery so concurrent expiries reset only once.
    recovery: tokio::sync::Mutex<()>,
    changes: watch::Sender<CartView>,
    max_transport_retries: u32,
    retry_backoff_base_ms: u64,
}

impl<G: OrderGateway> CartSynchronizer<G> {
    #[must_use]
    pub fn new(
        gateway: G,
        session: Arc<dyn SessionStore>,
        notifier: Arc<dyn NotificationSink>,
        config: &SyncConfig,
    ) -> Self {
        let (changes, _) = watch::channel(CartView::default());
        Self {
            gateway,
            session,
            notifier,
            state: Mutex::new(SyncState {
                projection: CartProjection::new(),
                ledger: SequenceLedger::new(),
                session_epoch: 0,
                next_local_id: 0,
            }),
            recovery: tokio::sync::Mutex::new(()),
            changes,
            max_transport_retries: config.max_transport_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
        }
    }

    /// Subscribes to projection changes. The receiver always holds the
    /// latest [`CartView`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.changes.subscribe()
    }

    /// The current projection state.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.state.lock().projection.view()
    }

    /// Adds `quantity` of a variant to the cart. `unit_price` (minor units)
    /// is only used for the optimistic placeholder; the server's figures
    /// win on confirmation.
    pub async fn add_line(
        &self,
        variant_id: VariantId,
        quantity: u32,
        unit_price: i64,
    ) -> SyncOutcome {
        if quantity == 0 {
            self.notifier
                .notify(Severity::Error, "Quantity must be at least 1.");
            return SyncOutcome::Rejected(RejectionKind::NegativeQuantity);
        }
        let local_id = self.state.lock().alloc_local_id();
        self.run_op(OpKind::Add {
            variant_id,
            quantity,
            unit_price,
            local_id,
        })
        .await
    }

    /// Sets a line to a new quantity. Adjusting to zero removes the line;
    /// a zero-quantity line is never represented.
    pub async fn adjust_line(&self, line_id: LineId, quantity: u32) -> SyncOutcome {
        if quantity == 0 {
            return self.remove_line(line_id).await;
        }
        self.run_op(OpKind::Adjust { line_id, quantity }).await
    }

    pub async fn remove_line(&self, line_id: LineId) -> SyncOutcome {
        self.run_op(OpKind::Remove { line_id }).await
    }

    /// Fetches the active order and repopulates the projection wholesale.
    /// `None` from the server resets the projection to empty.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the fetch (and one session recovery
    /// attempt) failed; the projection is left untouched in that case.
    pub async fn refresh(&self) -> Result<(), GatewayError> {
        let issued_epoch = self.state.lock().session_epoch;
        let fetched = match self.fetch_with_retry().await {
            Err(err) if err.is_session() => {
                self.recover_session(issued_epoch).await?;
                self.fetch_with_retry().await?
            }
            other => other?,
        };

        let mut state = self.state.lock();
        match &fetched {
            Some(snapshot) => state.projection.reconcile(snapshot),
            None => state.projection.reset(),
        }
        self.publish(&state);
        Ok(())
    }

    /// Ends the session: clears the persisted token, empties the projection
    /// and ledger, and drops any in-flight responses when they arrive.
    pub fn logout(&self) {
        self.session.clear();
        let mut state = self.state.lock();
        state.projection.reset();
        state.ledger.clear();
        state.session_epoch += 1;
        self.publish(&state);
    }

    async fn run_op(&self, kind: OpKind) -> SyncOutcome {
        let key = kind.key();
        let (seq, issued_epoch) = {
            let mut state = self.state.lock();
            let seq = state.ledger.issue(&key);
            // Rollback baseline: the line as of the last confirmed state.
            // If an older op on this key is still pending, inherit its
            // baseline instead of snapshotting half-applied optimistic state.
            let (prior, prior_index) = if let Some(inherited) = state.ledger.baseline(&key) {
                inherited
            } else {
                match state.projection.line_position(&key) {
                    Some((index, line)) => (Some(line.clone()), Some(index)),
                    None => (None, None),
                }
            };
            let op = PendingOperation {
                seq,
                kind: kind.clone(),
                prior,
                prior_index,
            };
            state.projection.apply_optimistic(&op);
            state.ledger.record(op);
            self.publish(&state);
            (seq, state.session_epoch)
        };

        let result = self.dispatch_with_recovery(&kind, issued_epoch).await;
        self.settle(&key, seq, result)
    }

    async fn dispatch(&self, kind: &OpKind) -> Result<OrderSnapshot, GatewayError> {
        retry_with_backoff(self.max_transport_retries, self.retry_backoff_base_ms, || {
            async move {
                match kind {
                    OpKind::Add {
                        variant_id,
                        quantity,
                        ..
                    } => self.gateway.add_line(variant_id, *quantity).await,
                    OpKind::Adjust { line_id, quantity } => {
                        self.gateway.adjust_line(line_id, *quantity).await
                    }
                    OpKind::Remove { line_id } => self.gateway.remove_line(line_id).await,
                }
            }
        })
        .await
    }

    async fn dispatch_with_recovery(
        &self,
        kind: &OpKind,
        issued_epoch: u64,
    ) -> Result<OrderSnapshot, GatewayError> {
        match self.dispatch(kind).await {
            Err(err) if err.is_session() => {
                self.recover_session(issued_epoch).await?;
                // Replay once against the fresh session. A second session
                // failure propagates and escalates to the user.
                self.dispatch(kind).await
            }
            other => other,
        }
    }

    async fn fetch_with_retry(&self) -> Result<Option<OrderSnapshot>, GatewayError> {
        retry_with_backoff(
            self.max_transport_retries,
            self.retry_backoff_base_ms,
            || self.gateway.fetch_active_order(),
        )
        .await
    }

    /// Resets to a fresh anonymous session after a token expiry.
    ///
    /// The recovery mutex serializes resets: the first operation to observe
    /// the expiry clears the store and issues a token-less fetch (which
    /// silently starts a new anonymous cart and delivers its token to the
    /// store); operations queued behind it see the bumped epoch and go
    /// straight back to re-dispatch.
    async fn recover_session(&self, issued_epoch: u64) -> Result<(), GatewayError> {
        let _guard = self.recovery.lock().await;
        if self.state.lock().session_epoch != issued_epoch {
            return Ok(());
        }
        tracing::info!("session token rejected; starting a fresh anonymous session");
        self.session.clear();
        // The fetched order is not reconciled here: other operations may
        // still be pending optimistically, and their own settlements will
        // bring the projection in line with the new session.
        self.fetch_with_retry().await?;
        self.state.lock().session_epoch += 1;
        Ok(())
    }

    fn settle(
        &self,
        key: &OpKey,
        seq: u64,
        result: Result<OrderSnapshot, GatewayError>,
    ) -> SyncOutcome {
        let mut state = self.state.lock();
        let Some(op) = state.ledger.settle(seq) else {
            // The ledger was cleared (logout) while this call was in flight.
            return SyncOutcome::Superseded;
        };
        if !state.ledger.is_latest(key, seq) {
            tracing::debug!(seq, "stale response superseded by a later operation; dropping");
            return SyncOutcome::Superseded;
        }
        state.ledger.retire(key, seq);

        match result {
            Ok(snapshot) => {
                state.projection.reconcile(&snapshot);
                self.publish(&state);
                if matches!(op.kind, OpKind::Add { .. }) {
                    self.notifier.notify(Severity::Success, "Added to cart.");
                }
                SyncOutcome::Confirmed
            }
            Err(GatewayError::Rejected { kind, message }) => {
                state.projection.rollback(&op);
                self.publish(&state);
                self.notifier
                    .notify(Severity::Error, &format!("Could not update cart: {message}"));
                SyncOutcome::Rejected(kind)
            }
            Err(err) if err.is_session() => {
                state.projection.rollback(&op);
                self.publish(&state);
                tracing::warn!(error = %err, "session could not be restored after reset");
                self.notifier.notify(
                    Severity::Error,
                    "Your session expired and could not be restored. Please try again.",
                );
                SyncOutcome::Failed
            }
            Err(err) => {
                state.projection.rollback(&op);
                self.publish(&state);
                tracing::warn!(error = %err, "cart operation failed after retry");
                self.notifier.notify(
                    Severity::Error,
                    "Your cart could not be updated. Please try again.",
                );
                SyncOutcome::Failed
            }
        }
    }

    fn publish(&self, state: &SyncState) {
        self.changes.send_replace(state.projection.view());
    }
}
