//! # Per-Contract Record Store
//!
//! Pure data structure holding one contract's states with multiple views:
//! by ID for O(1) lookup, plus insertion order for stable query results.
//!
//! Locking rules:
//! - A state is locked by at most one in-flight transaction.
//! - Queries on behalf of a transaction see its own locks as available.
//! - Confirm/spend transitions are idempotent per confirming transaction and
//!   rejected for a second, different transaction.

use crate::domain::errors::StateStoreError;
use crate::domain::matcher::{compare_for_sort, matches, LabeledState};
use crate::domain::query::QueryJson;
use shared_types::{Bytes32, LabelValue, State, StateSchema, StateUpdate};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// One stored state with its extracted labels and transition provenance.
#[derive(Clone, Debug)]
pub struct StoredState {
    /// The state record.
    pub state: State,
    /// Extracted `(label, value)` pairs for query evaluation.
    pub labels: Vec<(String, LabelValue)>,
    /// Transaction that confirmed this state, once confirmed.
    pub confirmed_by: Option<Uuid>,
    /// Transaction that spent this state, once spent.
    pub spent_by: Option<Uuid>,
}

/// All states of one contract instance.
#[derive(Debug, Default)]
pub struct ContractStates {
    /// All states indexed by content-addressed ID.
    by_id: HashMap<Bytes32, StoredState>,
    /// Insertion order, for stable results when sorts tie.
    insertion: Vec<Bytes32>,
}

impl ContractStates {
    /// Creates an empty per-contract store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of states held.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no states are held.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Gets a state by ID.
    pub fn get(&self, id: &Bytes32) -> Option<&StoredState> {
        self.by_id.get(id)
    }

    /// Inserts a state if its ID is not already present.
    ///
    /// Returns `false` for a duplicate (the upsert is a no-op), which makes
    /// re-delivered upserts idempotent.
    pub fn upsert(&mut self, state: State, labels: Vec<(String, LabelValue)>) -> bool {
        if self.by_id.contains_key(&state.id) {
            return false;
        }
        self.insertion.push(state.id);
        self.by_id.insert(
            state.id,
            StoredState {
                state,
                labels,
                confirmed_by: None,
                spent_by: None,
            },
        );
        true
    }

    /// Evaluates a query over the contract's states for one schema.
    ///
    /// Excludes spent states and states locked by a transaction other than
    /// `for_tx`. Results are sorted by the query's sort entries (creation
    /// time ascending when none are given) and truncated to its limit.
    pub fn find_available(
        &self,
        schema: &StateSchema,
        schema_id: &Bytes32,
        query: &QueryJson,
        for_tx: Option<Uuid>,
    ) -> Result<Vec<State>, StateStoreError> {
        let mut hits: Vec<(usize, &StoredState)> = Vec::new();
        for (position, id) in self.insertion.iter().enumerate() {
            let stored = &self.by_id[id];
            if stored.state.schema_id != *schema_id {
                continue;
            }
            if !stored.state.available_to(for_tx) {
                continue;
            }
            let view = LabeledState {
                labels: &stored.labels,
                created: stored.state.created,
            };
            if matches(schema, query, &view)? {
                hits.push((position, stored));
            }
        }

        let sort = if query.sort.is_empty() {
            vec![".created".to_string()]
        } else {
            query.sort.clone()
        };
        let mut sort_error = None;
        hits.sort_by(|(pa, a), (pb, b)| {
            let va = LabeledState {
                labels: &a.labels,
                created: a.state.created,
            };
            let vb = LabeledState {
                labels: &b.labels,
                created: b.state.created,
            };
            match compare_for_sort(schema, &sort, &va, &vb) {
                Ok(Ordering::Equal) => pa.cmp(pb),
                Ok(ordering) => ordering,
                Err(e) => {
                    sort_error.get_or_insert(e);
                    Ordering::Equal
                }
            }
        });
        if let Some(e) = sort_error {
            return Err(e);
        }

        let mut results: Vec<State> = hits.into_iter().map(|(_, s)| s.state.clone()).collect();
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// Locks the given states to an in-flight transaction.
    ///
    /// Re-locking by the same transaction is a no-op. A state already locked
    /// by a different transaction fails the whole call with `Locked`; no
    /// partial locks are taken.
    pub fn lock(&mut self, tx_id: Uuid, ids: &[Bytes32]) -> Result<(), StateStoreError> {
        for id in ids {
            let stored = self.by_id.get(id).ok_or(StateStoreError::NotFound(*id))?;
            if stored.state.spent {
                return Err(StateStoreError::NotFound(*id));
            }
            if let Some(owner) = stored.state.locked_by {
                if owner != tx_id {
                    return Err(StateStoreError::Locked(*id));
                }
            }
        }
        for id in ids {
            if let Some(stored) = self.by_id.get_mut(id) {
                stored.state.locked_by = Some(tx_id);
            }
        }
        Ok(())
    }

    /// Releases the given states if they are locked by the transaction.
    ///
    /// Selective on purpose: an orchestrator releases a transaction's output
    /// locks at dispatch while its input locks stay held until the spend is
    /// confirmed on-ledger.
    pub fn release(&mut self, tx_id: Uuid, ids: &[Bytes32]) -> usize {
        let mut released = 0;
        for id in ids {
            if let Some(stored) = self.by_id.get_mut(id) {
                if stored.state.locked_by == Some(tx_id) {
                    stored.state.locked_by = None;
                    released += 1;
                }
            }
        }
        released
    }

    /// Marks a state confirmed by the given on-ledger transaction.
    ///
    /// Idempotent per confirming transaction; a second, different confirming
    /// transaction is an invariant violation.
    pub fn mark_confirmed(&mut self, update: &StateUpdate) -> Result<(), StateStoreError> {
        let stored = self
            .by_id
            .get_mut(&update.id)
            .ok_or(StateStoreError::NotFound(update.id))?;
        match stored.confirmed_by {
            Some(existing) if existing == update.transaction_id => Ok(()),
            Some(_) => Err(StateStoreError::AlreadyTransitioned {
                id: update.id,
                transition: "confirmed",
            }),
            None => {
                stored.confirmed_by = Some(update.transaction_id);
                stored.state.confirmed = true;
                stored.state.locked_by = None;
                Ok(())
            }
        }
    }

    /// Marks a state spent by the given on-ledger transaction.
    ///
    /// Idempotent per spending transaction; a second, different spender is a
    /// double-spend and an invariant violation.
    pub fn mark_spent(&mut self, update: &StateUpdate) -> Result<(), StateStoreError> {
        let stored = self
            .by_id
            .get_mut(&update.id)
            .ok_or(StateStoreError::NotFound(update.id))?;
        match stored.spent_by {
            Some(existing) if existing == update.transaction_id => Ok(()),
            Some(_) => Err(StateStoreError::AlreadyTransitioned {
                id: update.id,
                transition: "spent",
            }),
            None => {
                stored.spent_by = Some(update.transaction_id);
                stored.state.spent = true;
                stored.state.locked_by = None;
                Ok(())
            }
        }
    }
}
