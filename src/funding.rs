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

//! Crowdfunding projects and their investments.
//!
//! Investments follow a state machine:
//! - `Pending` → `Confirmed` (via accept) or `Declined` (via decline)
//! - cancel removes the record in any state; a confirmed cancel also
//!   subtracts its amount from the project total
//!
//! Project status is derived, never written directly:
//! - `Open` → `Funded` (total reaches the goal) or `Closed` (deadline
//!   passed), recomputed after every mutation and by the periodic sweep
//! - a `Closed` project still becomes `Funded` when a late acceptance
//!   pushes the total over the goal

use crate::base::{InvestmentId, ProjectId, UserId};
use crate::error::LedgerError;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Derived lifecycle of a project.
///
/// `Funded` wins over `Closed`, and neither ever reverts to `Open`.
/// In particular a project stays `Funded` even if a later cancellation
/// drops its total back below the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Open,
    Funded,
    Closed,
}

/// Lifecycle of one investment.
///
/// `Confirmed` and `Declined` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Pending,
    Confirmed,
    Declined,
}

#[derive(Debug, Clone)]
struct InvestmentRecord {
    investor: UserId,
    amount: Decimal,
    status: InvestmentStatus,
    created_at: DateTime<Utc>,
}

/// Point-in-time view of one investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentSnapshot {
    pub id: InvestmentId,
    pub project: ProjectId,
    pub investor: UserId,
    pub amount: Decimal,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
}

/// One change of a project's funding total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountHistoryRecord {
    pub project: ProjectId,
    /// Funding total right after the change was applied.
    pub resulting_total: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Partial update for a project without confirmed investments.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal_amount: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug)]
pub(crate) struct ProjectData {
    project: ProjectId,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) goal_amount: Decimal,
    pub(crate) current_amount: Decimal,
    pub(crate) deadline: NaiveDate,
    pub(crate) status: ProjectStatus,
    pub(crate) created_at: DateTime<Utc>,
    /// All investments ever requested for this project, minus the
    /// cancelled ones. Kept inside the project so one lock covers the
    /// records, the total, and the history.
    investments: HashMap<InvestmentId, InvestmentRecord>,
    history: Vec<AmountHistoryRecord>,
    /// Set on deletion, for handles cloned out of the map before the
    /// removal.
    pub(crate) deleted: bool,
}

impl ProjectData {
    fn new(
        project: ProjectId,
        title: &str,
        description: &str,
        goal_amount: Decimal,
        deadline: NaiveDate,
    ) -> Self {
        Self {
            project,
            title: title.to_string(),
            description: description.to_string(),
            goal_amount,
            current_amount: Decimal::ZERO,
            deadline,
            status: ProjectStatus::Open,
            created_at: Utc::now(),
            investments: HashMap::new(),
            history: Vec::new(),
            deleted: false,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.current_amount >= Decimal::ZERO,
            "Invariant violated: funding total went negative: {}",
            self.current_amount
        );
        debug_assert_eq!(
            self.current_amount,
            self.investments
                .values()
                .filter(|record| record.status == InvestmentStatus::Confirmed)
                .map(|record| record.amount)
                .sum::<Decimal>(),
            "Invariant violated: funding total out of sync with confirmed investments"
        );
    }

    /// Changes the funding total and appends a history record.
    fn apply_funding(&mut self, delta: Decimal) {
        self.current_amount += delta;
        self.history.push(AmountHistoryRecord {
            project: self.project,
            resulting_total: self.current_amount,
            timestamp: Utc::now(),
        });
    }

    /// Re-derives the project status. Returns whether it changed.
    pub(crate) fn recompute_status(&mut self, today: NaiveDate) -> bool {
        let next = if self.current_amount >= self.goal_amount {
            ProjectStatus::Funded
        } else if self.status == ProjectStatus::Open && today > self.deadline {
            ProjectStatus::Closed
        } else {
            self.status
        };
        let changed = next != self.status;
        self.status = next;
        changed
    }

    pub(crate) fn has_confirmed(&self) -> bool {
        self.investments
            .values()
            .any(|record| record.status == InvestmentStatus::Confirmed)
    }

    /// Registers a new pending investment. Amount and investor are
    /// validated by the caller.
    pub(crate) fn add_investment(&mut self, id: InvestmentId, investor: UserId, amount: Decimal) {
        self.investments.insert(
            id,
            InvestmentRecord {
                investor,
                amount,
                status: InvestmentStatus::Pending,
                created_at: Utc::now(),
            },
        );
    }

    /// Confirms a pending investment, adding its amount to the funding
    /// total. Returns the confirmed amount.
    pub(crate) fn confirm_investment(
        &mut self,
        id: InvestmentId,
        today: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        let record = self
            .investments
            .get_mut(&id)
            .ok_or(LedgerError::InvestmentNotFound)?;
        if record.status != InvestmentStatus::Pending {
            return Err(LedgerError::InvalidTransition);
        }
        record.status = InvestmentStatus::Confirmed;
        let amount = record.amount;
        self.apply_funding(amount);
        self.recompute_status(today);
        self.assert_invariants();
        Ok(amount)
    }

    /// Declines a pending investment. Totals stay untouched.
    pub(crate) fn decline_investment(&mut self, id: InvestmentId) -> Result<(), LedgerError> {
        let record = self
            .investments
            .get_mut(&id)
            .ok_or(LedgerError::InvestmentNotFound)?;
        if record.status != InvestmentStatus::Pending {
            return Err(LedgerError::InvalidTransition);
        }
        record.status = InvestmentStatus::Declined;
        self.assert_invariants();
        Ok(())
    }

    /// Removes the caller's investment in any state. A confirmed
    /// cancellation first subtracts its amount from the funding total.
    /// Returns the status the investment had.
    pub(crate) fn cancel_investment(
        &mut self,
        caller: UserId,
        id: InvestmentId,
        today: NaiveDate,
    ) -> Result<InvestmentStatus, LedgerError> {
        let record = self
            .investments
            .get(&id)
            .ok_or(LedgerError::InvestmentNotFound)?;
        if record.investor != caller {
            return Err(LedgerError::InvestmentNotFound);
        }
        let status = record.status;
        let amount = record.amount;
        self.investments.remove(&id);
        if status == InvestmentStatus::Confirmed {
            self.apply_funding(-amount);
            self.recompute_status(today);
        }
        self.assert_invariants();
        Ok(status)
    }

    pub(crate) fn investment_snapshots(&self) -> Vec<InvestmentSnapshot> {
        let mut all: Vec<InvestmentSnapshot> = self
            .investments
            .iter()
            .map(|(id, record)| InvestmentSnapshot {
                id: *id,
                project: self.project,
                investor: record.investor,
                amount: record.amount,
                status: record.status,
                created_at: record.created_at,
            })
            .collect();
        all.sort_by_key(|snapshot| snapshot.id);
        all
    }

    pub(crate) fn investment_ids(&self) -> Vec<InvestmentId> {
        self.investments.keys().copied().collect()
    }

    pub(crate) fn history(&self) -> Vec<AmountHistoryRecord> {
        self.history.clone()
    }
}

/// One crowdfunding project.
///
/// Id and owner are fixed at creation and live outside the mutex.
#[derive(Debug)]
pub struct Project {
    id: ProjectId,
    owner: UserId,
    inner: Mutex<ProjectData>,
}

impl Project {
    fn new(
        id: ProjectId,
        owner: UserId,
        title: &str,
        description: &str,
        goal_amount: Decimal,
        deadline: NaiveDate,
    ) -> Self {
        Self {
            id,
            owner,
            inner: Mutex::new(ProjectData::new(id, title, description, goal_amount, deadline)),
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Acquires the project lock, giving up after `timeout`.
    pub(crate) fn lock_for(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, ProjectData>, LedgerError> {
        self.inner.try_lock_for(timeout).ok_or(LedgerError::Timeout)
    }

    /// Non-blocking lock attempt, used by the status sweep.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, ProjectData>> {
        self.inner.try_lock()
    }

    /// The given investor's investments in this project; empty once
    /// the project has been deleted.
    pub(crate) fn investments_of(&self, investor: UserId) -> Vec<InvestmentSnapshot> {
        let data = self.inner.lock();
        if data.deleted {
            return Vec::new();
        }
        data.investment_snapshots()
            .into_iter()
            .filter(|snapshot| snapshot.investor == investor)
            .collect()
    }

    /// Point-in-time view, or `None` once the project has been deleted.
    pub(crate) fn snapshot(&self) -> Option<ProjectSnapshot> {
        let data = self.inner.lock();
        if data.deleted {
            return None;
        }
        Some(ProjectSnapshot {
            id: self.id,
            owner: self.owner,
            title: data.title.clone(),
            description: data.description.clone(),
            goal_amount: data.goal_amount,
            current_amount: data.current_amount,
            deadline: data.deadline,
            status: data.status,
            created_at: data.created_at,
        })
    }
}

/// Point-in-time view of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub goal_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: NaiveDate,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

/// All live projects plus the investment routing index.
///
/// Investments are addressed globally by id, but each record lives
/// inside its project. The index maps an investment id to the project
/// that holds it.
#[derive(Debug)]
pub(crate) struct FundingBoard {
    projects: DashMap<ProjectId, Arc<Project>>,
    index: DashMap<InvestmentId, ProjectId>,
    next_project_id: AtomicU64,
    next_investment_id: AtomicU64,
}

impl FundingBoard {
    pub(crate) fn new() -> Self {
        Self {
            projects: DashMap::new(),
            index: DashMap::new(),
            next_project_id: AtomicU64::new(1),
            next_investment_id: AtomicU64::new(1),
        }
    }

    /// Creates a project after validating the goal amount. The deadline
    /// is taken as-is: a project created past its deadline simply
    /// closes on the first status recompute.
    pub(crate) fn create(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
        goal_amount: Decimal,
        deadline: NaiveDate,
    ) -> Result<ProjectId, LedgerError> {
        if goal_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let id = ProjectId(self.next_project_id.fetch_add(1, Ordering::Relaxed));
        self.projects.insert(
            id,
            Arc::new(Project::new(id, owner, title, description, goal_amount, deadline)),
        );
        Ok(id)
    }

    pub(crate) fn get(&self, id: ProjectId) -> Option<Arc<Project>> {
        self.projects.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Drops the map slot of a project already marked deleted.
    pub(crate) fn remove(&self, id: ProjectId) {
        self.projects.remove(&id);
    }

    pub(crate) fn allocate_investment_id(&self) -> InvestmentId {
        InvestmentId(self.next_investment_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn project_of(&self, investment: InvestmentId) -> Option<ProjectId> {
        self.index.get(&investment).map(|entry| *entry)
    }

    pub(crate) fn link(&self, investment: InvestmentId, project: ProjectId) {
        self.index.insert(investment, project);
    }

    pub(crate) fn unlink(&self, investment: InvestmentId) {
        self.index.remove(&investment);
    }

    pub(crate) fn all(&self) -> Vec<Arc<Project>> {
        self.projects
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Snapshots of every live project, ordered by id.
    pub(crate) fn snapshots(&self) -> Vec<ProjectSnapshot> {
        let mut all: Vec<ProjectSnapshot> = self
            .projects
            .iter()
            .filter_map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by_key(|snapshot| snapshot.id);
        all
    }
}
