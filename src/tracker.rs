//! Order lifecycle state machine, single mutex-guarded map from order id
//! to its current state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::decimal::Quantity;
use crate::time::TimePoint;

/// Locally assigned order identifier.
pub type OrderId = u64;

/// An order's place in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    /// Created locally, not yet sent.
    New,
    /// Acknowledged by the exchange.
    Submitted,
    /// Some but not all quantity has filled.
    PartiallyFilled,
    /// All quantity has filled.
    Filled,
    /// A cancel request is in flight.
    PendingCancel,
    /// Canceled before full fill.
    Canceled,
    /// Rejected by the exchange or a pre-trade check.
    Rejected,
    /// Expired (time-in-force elapsed).
    Expired,
    /// Superseded by a replacement order.
    Replaced,
}

impl OrderStatus {
    /// `true` for statuses that never transition further.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

/// Full lifecycle record for one order.
#[derive(Debug, Clone, Copy)]
pub struct OrderState {
    /// The order's current status.
    pub status: OrderStatus,
    /// Originally requested quantity.
    pub quantity: Quantity,
    /// Cumulative filled quantity.
    pub filled: Quantity,
    /// When this order was first submitted.
    pub created_at: TimePoint,
    /// When this order's state last changed.
    pub last_update: TimePoint,
}

/// Why [`OrderTracker`] refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackerError {
    /// `on_submitted` was called for an id that already exists.
    DuplicateId,
    /// The order does not exist in the tracker.
    UnknownId,
    /// The transition is not legal from the order's current (terminal)
    /// status.
    TerminalOrder,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::DuplicateId => write!(f, "order id already exists"),
            TrackerError::UnknownId => write!(f, "order id is not tracked"),
            TrackerError::TerminalOrder => write!(f, "order is already in a terminal state"),
        }
    }
}

impl std::error::Error for TrackerError {}

/// Mutex-guarded map from [`OrderId`] to [`OrderState`], implementing the
/// lifecycle transitions every order moves through from submission to a
/// terminal state.
pub struct OrderTracker {
    orders: Mutex<HashMap<OrderId, OrderState>>,
}

impl OrderTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<OrderId, OrderState>> {
        self.orders.lock().expect("order tracker mutex poisoned")
    }

    /// Registers a newly submitted order. Rejects a duplicate `id`.
    pub fn on_submitted(&self, id: OrderId, quantity: Quantity, now: TimePoint) -> Result<(), TrackerError> {
        let mut orders = self.lock();
        if orders.contains_key(&id) {
            return Err(TrackerError::DuplicateId);
        }
        orders.insert(
            id,
            OrderState {
                status: OrderStatus::Submitted,
                quantity,
                filled: Quantity::ZERO,
                created_at: now,
                last_update: now,
            },
        );
        Ok(())
    }

    /// Records a fill, transitioning to `PartiallyFilled` or `Filled`.
    /// Rejected if `id` is unknown or already terminal.
    pub fn on_filled(&self, id: OrderId, fill: Quantity, now: TimePoint) -> Result<(), TrackerError> {
        let mut orders = self.lock();
        let state = orders.get_mut(&id).ok_or(TrackerError::UnknownId)?;
        if state.status.is_terminal() {
            return Err(TrackerError::TerminalOrder);
        }
        state.filled = state.filled + fill;
        state.status = if state.filled >= state.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        state.last_update = now;
        Ok(())
    }

    /// Transitions to `PendingCancel`. Rejected if terminal.
    pub fn on_pending_cancel(&self, id: OrderId, now: TimePoint) -> Result<(), TrackerError> {
        self.transition(id, OrderStatus::PendingCancel, now)
    }

    /// Transitions to `Canceled`. Rejected if terminal.
    pub fn on_canceled(&self, id: OrderId, now: TimePoint) -> Result<(), TrackerError> {
        self.transition(id, OrderStatus::Canceled, now)
    }

    /// Transitions to `Rejected`. Rejected if terminal.
    pub fn on_rejected(&self, id: OrderId, reason: &str, now: TimePoint) -> Result<(), TrackerError> {
        tracing::warn!(order_id = id, reason, "order rejected");
        self.transition(id, OrderStatus::Rejected, now)
    }

    fn transition(&self, id: OrderId, to: OrderStatus, now: TimePoint) -> Result<(), TrackerError> {
        let mut orders = self.lock();
        let state = orders.get_mut(&id).ok_or(TrackerError::UnknownId)?;
        if state.status.is_terminal() {
            tracing::warn!(order_id = id, ?to, "rejected transition on terminal order");
            return Err(TrackerError::TerminalOrder);
        }
        state.status = to;
        state.last_update = now;
        Ok(())
    }

    /// Replaces `old_id` with `new_id`: the old order becomes `Replaced`
    /// (if not already terminal) and the new order is inserted as
    /// `Submitted`. Rejects a duplicate `new_id`.
    pub fn on_replaced(
        &self,
        old_id: OrderId,
        new_id: OrderId,
        new_quantity: Quantity,
        now: TimePoint,
    ) -> Result<(), TrackerError> {
        let mut orders = self.lock();
        if orders.contains_key(&new_id) {
            return Err(TrackerError::DuplicateId);
        }
        if let Some(old) = orders.get_mut(&old_id) {
            if !old.status.is_terminal() {
                old.status = OrderStatus::Replaced;
                old.last_update = now;
            }
        }
        orders.insert(
            new_id,
            OrderState {
                status: OrderStatus::Submitted,
                quantity: new_quantity,
                filled: Quantity::ZERO,
                created_at: now,
                last_update: now,
            },
        );
        Ok(())
    }

    /// Removes every terminal order from the map.
    pub fn prune_terminal(&self) {
        self.lock().retain(|_, state| !state.status.is_terminal());
    }

    /// `true` iff `id` exists and is not in a terminal state.
    #[must_use]
    pub fn is_active(&self, id: OrderId) -> bool {
        self.lock().get(&id).is_some_and(|s| !s.status.is_terminal())
    }

    /// Returns a copy of `id`'s current state, if tracked.
    #[must_use]
    pub fn state_of(&self, id: OrderId) -> Option<OrderState> {
        self.lock().get(&id).copied()
    }
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}
