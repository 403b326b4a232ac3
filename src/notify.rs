// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Change notification over SQLite's update hook.
//!
//! Delivery is "something changed, re-fetch": at-least-once, no diff payload,
//! and rapid changes may coalesce. The raw hook is table-granular, so a
//! subscriber may be signalled for another entity's row in the same table;
//! callbacks must be idempotent and must re-read the store rather than trust
//! the signal itself. Callbacks run with the registry held: do not subscribe
//! or unsubscribe from inside one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::hooks::Action;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Entity-scoped tables a consumer can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableScope {
    Accounts,
    Budgets,
    BudgetItems,
}

impl TableScope {
    fn matches(self, table: &str) -> bool {
        match self {
            TableScope::Accounts => table == "accounts",
            TableScope::Budgets => table == "budgets",
            TableScope::BudgetItems => table == "budget_items",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
}

type Callback = Box<dyn FnMut(&ChangeEvent) + Send>;

struct Subscriber {
    // Kept for the consumer's re-fetch scope; the hook itself cannot narrow
    // a row to an entity without reading it back.
    #[allow(dead_code)]
    entity_id: i64,
    scope: TableScope,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// Fans table mutation signals out to registered subscribers. One notifier
/// owns the connection's single update hook.
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

/// Opaque handle returned by [`ChangeNotifier::subscribe`]. Unsubscribing
/// through it is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: u64,
}

impl ChangeNotifier {
    pub fn install(conn: &Connection) -> Self {
        let registry: Arc<Mutex<Registry>> = Arc::new(Mutex::new(Registry::default()));
        let hook_registry = Arc::clone(&registry);
        conn.update_hook(Some(
            move |action: Action, _db: &str, table: &str, _rowid: i64| {
                let op = match action {
                    Action::SQLITE_INSERT => ChangeOp::Insert,
                    Action::SQLITE_UPDATE => ChangeOp::Update,
                    Action::SQLITE_DELETE => ChangeOp::Delete,
                    _ => return,
                };
                let event = ChangeEvent {
                    table: table.to_string(),
                    op,
                };
                if let Ok(mut reg) = hook_registry.lock() {
                    for sub in reg.subscribers.values_mut() {
                        if sub.scope.matches(table) {
                            (sub.callback)(&event);
                        }
                    }
                }
            },
        ));
        Self { registry }
    }

    pub fn subscribe(
        &self,
        entity_id: i64,
        scope: TableScope,
        callback: impl FnMut(&ChangeEvent) + Send + 'static,
    ) -> Result<SubscriptionHandle> {
        let mut reg = self
            .registry
            .lock()
            .map_err(|_| anyhow!("Could not establish change-notification subscription"))?;
        reg.next_id += 1;
        let id = reg.next_id;
        reg.subscribers.insert(
            id,
            Subscriber {
                entity_id,
                scope,
                callback: Box::new(callback),
            },
        );
        tracing::debug!(id, entity_id, ?scope, "subscription registered");
        Ok(SubscriptionHandle { id })
    }

    /// Release a subscription. No further callbacks fire through the handle
    /// afterward; releasing an already-released handle is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if let Ok(mut reg) = self.registry.lock() {
            reg.subscribers.remove(&handle.id);
        }
    }

    /// Remove the hook from the connection. Existing handles become inert.
    pub fn uninstall(conn: &Connection) {
        conn.update_hook(None::<fn(Action, &str, &str, i64)>);
    }
}
