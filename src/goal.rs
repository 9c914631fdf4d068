// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Moneta Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Savings goals.
//!
//! A goal holds money the owner has set aside from their account
//! balance. Contributions only ever add; the single way money leaves a
//! goal is deletion, which refunds the full saved amount.

use crate::base::{GoalId, UserId};
use crate::error::LedgerError;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifecycle of a savings goal.
///
/// `Achieved` is terminal: the transition fires when the saved amount
/// first reaches the target, and nothing moves a goal back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Achieved,
}

#[derive(Debug)]
pub(crate) struct GoalData {
    pub(crate) title: String,
    pub(crate) target_amount: Decimal,
    pub(crate) current_amount: Decimal,
    pub(crate) deadline: NaiveDate,
    pub(crate) status: GoalStatus,
    pub(crate) created_at: DateTime<Utc>,
    /// Set on deletion. An `Arc<Goal>` cloned out of the map before the
    /// removal may still be locked afterwards; the flag tells that
    /// late-comer the goal is gone.
    pub(crate) deleted: bool,
}

impl GoalData {
    fn new(title: &str, target_amount: Decimal, deadline: NaiveDate) -> Self {
        Self {
            title: title.to_string(),
            target_amount,
            current_amount: Decimal::ZERO,
            deadline,
            status: GoalStatus::InProgress,
            created_at: Utc::now(),
            deleted: false,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.current_amount >= Decimal::ZERO,
            "Invariant violated: goal amount went negative: {}",
            self.current_amount
        );
        debug_assert!(
            self.status == GoalStatus::InProgress || self.current_amount >= self.target_amount,
            "Invariant violated: goal achieved below target: {} < {}",
            self.current_amount,
            self.target_amount
        );
    }

    /// Checks that the goal can accept a contribution.
    pub(crate) fn ensure_fundable(&self) -> Result<(), LedgerError> {
        if self.deleted {
            return Err(LedgerError::GoalNotFound);
        }
        if self.status == GoalStatus::Achieved {
            return Err(LedgerError::GoalAlreadyAchieved);
        }
        Ok(())
    }

    /// Adds a contribution that has already been debited from the
    /// owner's account. Reaching or passing the target achieves the
    /// goal, deadline or not.
    pub(crate) fn apply_contribution(&mut self, amount: Decimal) {
        self.current_amount += amount;
        if self.current_amount >= self.target_amount {
            self.status = GoalStatus::Achieved;
        }
        self.assert_invariants();
    }
}

/// One savings goal.
///
/// Id and owner are fixed at creation and live outside the mutex.
#[derive(Debug)]
pub struct Goal {
    id: GoalId,
    owner: UserId,
    inner: Mutex<GoalData>,
}

impl Goal {
    fn new(id: GoalId, owner: UserId, title: &str, target_amount: Decimal, deadline: NaiveDate) -> Self {
        Self {
            id,
            owner,
            inner: Mutex::new(GoalData::new(title, target_amount, deadline)),
        }
    }

    pub fn id(&self) -> GoalId {
        self.id
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Acquires the goal lock, giving up after `timeout`.
    pub(crate) fn lock_for(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, GoalData>, LedgerError> {
        self.inner.try_lock_for(timeout).ok_or(LedgerError::Timeout)
    }

    /// Point-in-time view, or `None` once the goal has been deleted.
    pub(crate) fn snapshot(&self) -> Option<GoalSnapshot> {
        let data = self.inner.lock();
        if data.deleted {
            return None;
        }
        Some(GoalSnapshot {
            id: self.id,
            owner: self.owner,
            title: data.title.clone(),
            target_amount: data.target_amount,
            current_amount: data.current_amount,
            deadline: data.deadline,
            status: data.status,
            created_at: data.created_at,
        })
    }
}

/// Point-in-time view of one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSnapshot {
    pub id: GoalId,
    pub owner: UserId,
    pub title: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: NaiveDate,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

/// All live savings goals.
#[derive(Debug)]
pub(crate) struct GoalLedger {
    goals: DashMap<GoalId, Arc<Goal>>,
    next_id: AtomicU64,
}

impl GoalLedger {
    pub(crate) fn new() -> Self {
        Self {
            goals: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a goal after validating target and deadline.
    pub(crate) fn create(
        &self,
        owner: UserId,
        title: &str,
        target_amount: Decimal,
        deadline: NaiveDate,
    ) -> Result<GoalId, LedgerError> {
        if target_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if deadline <= Utc::now().date_naive() {
            return Err(LedgerError::DeadlineNotFuture);
        }
        let id = GoalId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.goals
            .insert(id, Arc::new(Goal::new(id, owner, title, target_amount, deadline)));
        Ok(id)
    }

    pub(crate) fn get(&self, id: GoalId) -> Option<Arc<Goal>> {
        self.goals.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Drops the map slot of a goal already marked deleted.
    pub(crate) fn remove(&self, id: GoalId) {
        self.goals.remove(&id);
    }

    /// Snapshots of the user's live goals, ordered by id.
    pub(crate) fn snapshots_for(&self, owner: UserId) -> Vec<GoalSnapshot> {
        let mut all: Vec<GoalSnapshot> = self
            .goals
            .iter()
            .filter(|entry| entry.value().owner() == owner)
            .filter_map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by_key(|snapshot| snapshot.id);
        all
    }
}
