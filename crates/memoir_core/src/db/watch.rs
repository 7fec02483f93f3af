//! Continuous queries over the local database.
//!
//! # Responsibility
//! - Keep the registry of live subscriptions and the tables each depends on.
//! - Re-run a subscription's query after a committed write touched one of
//!   its tables and push the fresh snapshot to its sink.
//!
//! # Invariants
//! - A sink receives the current snapshot during registration, before
//!   `watch` returns.
//! - Snapshots are delivered synchronously on the thread that flushed the
//!   write; there is no buffering, consumers keep the latest snapshot.
//! - Dropping a [`Subscription`] frees its registration. Cancellation during
//!   dispatch takes effect before the next refresh.

use super::MemoirDb;
use log::{debug, error};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt::Display;

type Refresh = Box<dyn FnMut(&Connection) + Send>;

struct Watcher {
    id: u64,
    tables: &'static [&'static str],
    refresh: Refresh,
}

impl Watcher {
    fn depends_on_any(&self, touched: &BTreeSet<String>) -> bool {
        self.tables.iter().any(|table| touched.contains(*table))
    }
}

/// Registry of live subscriptions owned by [`MemoirDb`].
///
/// Registrations and cancellations that arrive while a dispatch holds
/// `active` are parked in `pending`/`cancelled` and merged afterwards.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    next_id: Cell<u64>,
    active: RefCell<Vec<Watcher>>,
    pending: RefCell<Vec<Watcher>>,
    cancelled: RefCell<Vec<u64>>,
}

impl WatchRegistry {
    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn register(&self, watcher: Watcher) {
        match self.active.try_borrow_mut() {
            Ok(mut active) => active.push(watcher),
            Err(_) => self.pending.borrow_mut().push(watcher),
        }
    }

    fn cancel(&self, id: u64) {
        self.pending.borrow_mut().retain(|watcher| watcher.id != id);
        match self.active.try_borrow_mut() {
            Ok(mut active) => active.retain(|watcher| watcher.id != id),
            Err(_) => self.cancelled.borrow_mut().push(id),
        }
    }

    fn absorb(&self, active: &mut Vec<Watcher>) {
        active.append(&mut self.pending.borrow_mut());
        let cancelled = std::mem::take(&mut *self.cancelled.borrow_mut());
        if !cancelled.is_empty() {
            active.retain(|watcher| !cancelled.contains(&watcher.id));
        }
    }

    fn is_cancelled(&self, id: u64) -> bool {
        self.cancelled.borrow().contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        let active = self.active.try_borrow().map_or(0, |active| active.len());
        (active + self.pending.borrow().len()).saturating_sub(self.cancelled.borrow().len())
    }

    /// Runs every watcher depending on a table reported by `take_touched`
    /// until no further changes are pending.
    ///
    /// Returns without doing anything when a dispatch is already running on
    /// this registry (a sink wrote to the database); the outer loop picks the
    /// new changes up.
    pub(crate) fn dispatch(
        &self,
        conn: &Connection,
        mut take_touched: impl FnMut() -> BTreeSet<String>,
    ) {
        let Ok(mut active) = self.active.try_borrow_mut() else {
            return;
        };

        loop {
            self.absorb(&mut active);
            let touched = take_touched();
            if touched.is_empty() {
                break;
            }

            debug!(
                "event=watch_dispatch module=db status=start tables={} watchers={}",
                touched.len(),
                active.len()
            );
            for watcher in active.iter_mut() {
                if self.is_cancelled(watcher.id) || !watcher.depends_on_any(&touched) {
                    continue;
                }
                (watcher.refresh)(conn);
            }
        }

        self.absorb(&mut active);
    }
}

/// Handle for one live continuous query.
///
/// The registration lives as long as this value; drop it or call
/// [`Subscription::cancel`] to stop receiving snapshots.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription<'db> {
    db: &'db MemoirDb,
    id: u64,
}

impl Subscription<'_> {
    /// Stable id of this registration, unique per database handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unsubscribes explicitly.
    pub fn cancel(self) {}
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.db.watchers().cancel(self.id);
        debug!(
            "event=watch_cancel module=db status=ok watcher_id={}",
            self.id
        );
    }
}

impl MemoirDb {
    /// Registers a continuous query.
    ///
    /// `query` runs immediately and its result goes to `sink`; afterwards it
    /// re-runs whenever a flushed write touched one of `tables`. A failing
    /// initial query is returned to the caller and nothing is registered.
    /// Failures of later refreshes are logged and skipped.
    pub fn watch<T, E, Q, S>(
        &self,
        tables: &'static [&'static str],
        mut query: Q,
        mut sink: S,
    ) -> Result<Subscription<'_>, E>
    where
        E: Display,
        Q: FnMut(&Connection) -> Result<T, E> + Send + 'static,
        S: FnMut(T) + Send + 'static,
    {
        let initial = query(self.connection())?;
        sink(initial);

        let registry = self.watchers();
        let id = registry.allocate_id();
        let refresh: Refresh = Box::new(move |conn| match query(conn) {
            Ok(snapshot) => sink(snapshot),
            Err(err) => error!(
                "event=watch_refresh module=db status=error watcher_id={id} error={err}"
            ),
        });
        registry.register(Watcher {
            id,
            tables,
            refresh,
        });
        debug!(
            "event=watch_register module=db status=ok watcher_id={id} tables={}",
            tables.join(",")
        );

        Ok(Subscription { db: self, id })
    }
}
