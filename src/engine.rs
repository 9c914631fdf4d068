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

//! Ledger engine.
//!
//! The [`Engine`] is the central component that moves money between
//! accounts, savings goals, bills, and crowdfunding projects. Every
//! operation names the acting user explicitly; there is no ambient
//! session.
//!
//! # Operations
//!
//! - **Transfers**: Move funds between two accounts, addressed by the
//!   receiver's card number and national id.
//! - **Bills**: Debit an account and keep a payment record.
//! - **Goals**: Set money aside toward a target; deleting a goal
//!   refunds everything saved.
//! - **Funding**: Request, accept, decline, and cancel investments in
//!   projects, with a derived project status.
//!
//! # Thread Safety
//!
//! Accounts, goals, and projects live in [`dashmap::DashMap`]s of
//! `Arc` handles; each entity guards its mutable state with its own
//! [`parking_lot::Mutex`]. Operations clone the handles they need out
//! of the maps, then lock them in a fixed order:
//!
//! 1. accounts (two accounts in ascending user id order),
//! 2. the goal,
//! 3. the ledger log, last, while account locks are held.
//!
//! Project operations take only the one project lock. Every wait is
//! bounded by [`LedgerConfig::op_timeout`]; a lock that cannot be had
//! in time fails the operation with [`LedgerError::Timeout`] instead
//! of stalling the caller.

use crate::account::{AccountSnapshot, AccountStore};
use crate::base::{BillId, EntryId, GoalId, InvestmentId, ProjectId, ReceiverRef, UserId};
use crate::error::LedgerError;
use crate::funding::{
    AmountHistoryRecord, FundingBoard, InvestmentSnapshot, ProjectSnapshot, ProjectStatus,
    ProjectUpdate,
};
use crate::goal::{GoalLedger, GoalSnapshot};
use crate::ledger_log::{Bill, LedgerEntry, LedgerLog};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Longest one operation may wait for any single entity lock
    /// before failing with [`LedgerError::Timeout`].
    pub op_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
        }
    }
}

/// Ledger engine holding all accounts, goals, projects, and the log.
///
/// Validation happens first, cheap checks before locks and the rest
/// under every lock the operation needs; once writing starts nothing
/// can fail, so there is no undo path.
///
/// # Invariants
///
/// - A transfer debits and credits under both account locks; the sum
///   of all balances changes only through bill payments, goal moves,
///   and account openings.
/// - The ledger log records committed movement only, append-only.
/// - Balances, goal amounts, and funding totals never go negative.
/// - A project's funding total always equals the sum of its confirmed
///   investments.
/// - Project status is derived from total and deadline, never written
///   directly, and never demoted back to open.
pub struct Engine {
    config: LedgerConfig,
    /// User accounts indexed by id and card number.
    accounts: AccountStore,
    /// Append-only transfer and bill history.
    log: LedgerLog,
    /// Savings goals.
    goals: GoalLedger,
    /// Crowdfunding projects and investments.
    board: FundingBoard,
}

impl Engine {
    /// Creates an empty engine with default tunables.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Engine {
            config,
            accounts: AccountStore::new(),
            log: LedgerLog::new(),
            goals: GoalLedger::new(),
            board: FundingBoard::new(),
        }
    }

    // === Accounts ===

    /// Opens an account with an initial balance (zero is fine).
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Initial balance is negative.
    /// - [`LedgerError::DuplicateAccount`] - User id or card number is taken.
    pub fn open_account(
        &self,
        user: UserId,
        card_no: &str,
        national_id: &str,
        initial_balance: Decimal,
    ) -> Result<(), LedgerError> {
        self.accounts.open(user, card_no, national_id, initial_balance)?;
        debug!(%user, card_no, "account opened");
        Ok(())
    }

    /// Sets or clears the block flag on an account.
    ///
    /// The flag is reported in snapshots; balance movement is not
    /// gated on it here. Screening blocked users belongs to the layer
    /// in front of the ledger.
    pub fn set_account_blocked(&self, user: UserId, blocked: bool) -> Result<(), LedgerError> {
        let account = self.accounts.get(user).ok_or(LedgerError::AccountNotFound)?;
        account.lock_for(self.config.op_timeout)?.blocked = blocked;
        debug!(%user, blocked, "account block flag set");
        Ok(())
    }

    pub fn balance(&self, user: UserId) -> Result<Decimal, LedgerError> {
        Ok(self
            .accounts
            .get(user)
            .ok_or(LedgerError::AccountNotFound)?
            .balance())
    }

    pub fn get_account(&self, user: UserId) -> Result<AccountSnapshot, LedgerError> {
        Ok(self
            .accounts
            .get(user)
            .ok_or(LedgerError::AccountNotFound)?
            .snapshot())
    }

    /// Snapshots every account, ordered by user id.
    pub fn accounts(&self) -> Vec<AccountSnapshot> {
        self.accounts.snapshots()
    }

    // === Transfers and bills ===

    /// Moves `amount` from the sender to the account the receiver
    /// reference resolves to.
    ///
    /// The receiver is addressed by card number; the national id the
    /// sender supplies must match the resolved account before any
    /// money moves. On success both balances have changed and exactly
    /// one transfer entry is in the log.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ReceiverNotFound`] - No account has the card number.
    /// - [`LedgerError::IdentityMismatch`] - National id does not match.
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::SelfTransfer`] - Receiver resolves to the sender.
    /// - [`LedgerError::AccountNotFound`] - Sender account does not exist.
    /// - [`LedgerError::InsufficientFunds`] - Sender balance is too low.
    /// - [`LedgerError::Timeout`] - An account lock could not be had in time.
    pub fn transfer(
        &self,
        sender: UserId,
        receiver: &ReceiverRef,
        amount: Decimal,
        description: &str,
    ) -> Result<EntryId, LedgerError> {
        let receiver_id = self
            .accounts
            .resolve_card(&receiver.card_no)
            .ok_or(LedgerError::ReceiverNotFound)?;
        let receiver_account = self
            .accounts
            .get(receiver_id)
            .ok_or(LedgerError::ReceiverNotFound)?;
        if receiver_account.national_id() != receiver.national_id {
            return Err(LedgerError::IdentityMismatch);
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if sender == receiver_id {
            return Err(LedgerError::SelfTransfer);
        }
        let sender_account = self.accounts.get(sender).ok_or(LedgerError::AccountNotFound)?;

        // Lower user id locks first, so opposite-direction transfers
        // between the same pair cannot deadlock.
        let (mut sender_data, mut receiver_data) = if sender < receiver_id {
            let first = sender_account.lock_for(self.config.op_timeout)?;
            let second = receiver_account.lock_for(self.config.op_timeout)?;
            (first, second)
        } else {
            let second = receiver_account.lock_for(self.config.op_timeout)?;
            let first = sender_account.lock_for(self.config.op_timeout)?;
            (first, second)
        };

        sender_data.debit(amount)?;
        receiver_data.credit(amount)?;
        let entry = self.log.record_transfer(sender, receiver_id, amount, description);

        debug!(%sender, receiver = %receiver_id, %amount, entry = %entry, "transfer committed");
        Ok(entry)
    }

    /// Pays a bill from the user's account, keeping a bill row and a
    /// ledger entry as the audit trail.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - Account does not exist.
    /// - [`LedgerError::InsufficientFunds`] - Balance is too low.
    /// - [`LedgerError::Timeout`] - The account lock could not be had in time.
    pub fn pay_bill(
        &self,
        user: UserId,
        reference: &str,
        amount: Decimal,
    ) -> Result<BillId, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self.accounts.get(user).ok_or(LedgerError::AccountNotFound)?;

        let mut data = account.lock_for(self.config.op_timeout)?;
        data.debit(amount)?;
        let (bill, entry) = self.log.record_bill(user, reference, amount);

        debug!(%user, %amount, bill = %bill, entry = %entry, "bill paid");
        Ok(bill)
    }

    /// Every ledger entry, in commit order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.log.entries()
    }

    /// Ledger entries where the user is sender or receiver.
    pub fn entries_for(&self, user: UserId) -> Vec<LedgerEntry> {
        self.log.entries_for(user)
    }

    pub fn bills(&self) -> Vec<Bill> {
        self.log.bills()
    }

    pub fn bills_for(&self, user: UserId) -> Vec<Bill> {
        self.log.bills_for(user)
    }

    // === Savings goals ===

    /// Creates a savings goal for the user.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Owner account does not exist.
    /// - [`LedgerError::InvalidAmount`] - Target is zero or negative.
    /// - [`LedgerError::DeadlineNotFuture`] - Deadline is today or earlier.
    pub fn create_goal(
        &self,
        owner: UserId,
        title: &str,
        target_amount: Decimal,
        deadline: NaiveDate,
    ) -> Result<GoalId, LedgerError> {
        if self.accounts.get(owner).is_none() {
            return Err(LedgerError::AccountNotFound);
        }
        let goal = self.goals.create(owner, title, target_amount, deadline)?;
        debug!(%owner, %goal, %target_amount, "goal created");
        Ok(goal)
    }

    /// Moves `amount` from the owner's balance into the goal.
    ///
    /// Reaching or passing the target marks the goal achieved. A goal
    /// that is already achieved accepts no further money.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::GoalNotFound`] - No such goal, or not the caller's.
    /// - [`LedgerError::GoalAlreadyAchieved`] - Goal already hit its target.
    /// - [`LedgerError::InsufficientFunds`] - Balance is too low.
    /// - [`LedgerError::Timeout`] - A lock could not be had in time.
    pub fn fund_goal(
        &self,
        owner: UserId,
        goal: GoalId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let goal_handle = self.goals.get(goal).ok_or(LedgerError::GoalNotFound)?;
        if goal_handle.owner() != owner {
            return Err(LedgerError::GoalNotFound);
        }
        let account = self.accounts.get(owner).ok_or(LedgerError::AccountNotFound)?;

        // Account before goal, per the crate lock order.
        let mut account_data = account.lock_for(self.config.op_timeout)?;
        let mut goal_data = goal_handle.lock_for(self.config.op_timeout)?;
        goal_data.ensure_fundable()?;
        account_data.debit(amount)?;
        goal_data.apply_contribution(amount);

        debug!(%owner, %goal, %amount, status = ?goal_data.status, "goal funded");
        Ok(())
    }

    /// Deletes the goal and refunds everything saved in it back to the
    /// owner's balance. Returns the refunded amount.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::GoalNotFound`] - No such goal, or not the caller's.
    /// - [`LedgerError::AccountNotFound`] - Owner account does not exist.
    /// - [`LedgerError::Timeout`] - A lock could not be had in time.
    pub fn delete_goal(&self, owner: UserId, goal: GoalId) -> Result<Decimal, LedgerError> {
        let goal_handle = self.goals.get(goal).ok_or(LedgerError::GoalNotFound)?;
        if goal_handle.owner() != owner {
            return Err(LedgerError::GoalNotFound);
        }
        let account = self.accounts.get(owner).ok_or(LedgerError::AccountNotFound)?;

        let refunded = {
            let mut account_data = account.lock_for(self.config.op_timeout)?;
            let mut goal_data = goal_handle.lock_for(self.config.op_timeout)?;
            if goal_data.deleted {
                return Err(LedgerError::GoalNotFound);
            }
            let refund = goal_data.current_amount;
            if refund > Decimal::ZERO {
                account_data.credit(refund)?;
            }
            goal_data.current_amount = Decimal::ZERO;
            goal_data.deleted = true;
            refund
        };
        self.goals.remove(goal);

        debug!(%owner, %goal, %refunded, "goal deleted and refunded");
        Ok(refunded)
    }

    /// Snapshot of one goal, owner only.
    pub fn get_goal(&self, caller: UserId, goal: GoalId) -> Result<GoalSnapshot, LedgerError> {
        let goal_handle = self.goals.get(goal).ok_or(LedgerError::GoalNotFound)?;
        if goal_handle.owner() != caller {
            return Err(LedgerError::GoalNotFound);
        }
        goal_handle.snapshot().ok_or(LedgerError::GoalNotFound)
    }

    /// The user's goals, ordered by id.
    pub fn goals_for(&self, owner: UserId) -> Vec<GoalSnapshot> {
        self.goals.snapshots_for(owner)
    }

    // === Crowdfunding ===

    /// Creates a project owned by the user.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Owner account does not exist.
    /// - [`LedgerError::InvalidAmount`] - Goal amount is zero or negative.
    pub fn create_project(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
        goal_amount: Decimal,
        deadline: NaiveDate,
    ) -> Result<ProjectId, LedgerError> {
        if self.accounts.get(owner).is_none() {
            return Err(LedgerError::AccountNotFound);
        }
        let project = self.board.create(owner, title, description, goal_amount, deadline)?;
        debug!(%owner, %project, %goal_amount, "project created");
        Ok(project)
    }

    /// Applies a partial update to a project without confirmed
    /// investments.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ProjectNotFound`] - No such project, or not the caller's.
    /// - [`LedgerError::InvalidAmount`] - New goal amount is zero or negative.
    /// - [`LedgerError::ProjectLocked`] - Project has confirmed investments.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn update_project(
        &self,
        caller: UserId,
        project: ProjectId,
        update: ProjectUpdate,
    ) -> Result<(), LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        if handle.owner() != caller {
            return Err(LedgerError::ProjectNotFound);
        }
        if let Some(goal_amount) = update.goal_amount {
            if goal_amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
        }
        let today = Utc::now().date_naive();

        let mut data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::ProjectNotFound);
        }
        if data.has_confirmed() {
            return Err(LedgerError::ProjectLocked);
        }
        if let Some(title) = update.title {
            data.title = title;
        }
        if let Some(description) = update.description {
            data.description = description;
        }
        if let Some(goal_amount) = update.goal_amount {
            data.goal_amount = goal_amount;
        }
        if let Some(deadline) = update.deadline {
            data.deadline = deadline;
        }
        data.recompute_status(today);

        debug!(%caller, %project, "project updated");
        Ok(())
    }

    /// Deletes a project without confirmed investments. Pending and
    /// declined investment records are discarded with it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ProjectNotFound`] - No such project, or not the caller's.
    /// - [`LedgerError::ProjectLocked`] - Project has confirmed investments.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn delete_project(&self, caller: UserId, project: ProjectId) -> Result<(), LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        if handle.owner() != caller {
            return Err(LedgerError::ProjectNotFound);
        }

        let orphaned = {
            let mut data = handle.lock_for(self.config.op_timeout)?;
            if data.deleted {
                return Err(LedgerError::ProjectNotFound);
            }
            if data.has_confirmed() {
                return Err(LedgerError::ProjectLocked);
            }
            data.deleted = true;
            data.investment_ids()
        };
        for investment in orphaned {
            self.board.unlink(investment);
        }
        self.board.remove(project);

        debug!(%caller, %project, "project deleted");
        Ok(())
    }

    /// Requests an investment in a project. The money is a pledge
    /// only: nothing is debited now or on acceptance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - Investor account does not exist.
    /// - [`LedgerError::ProjectNotFound`] - Project does not exist.
    /// - [`LedgerError::SelfInvestment`] - Investor owns the project.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn request_investment(
        &self,
        investor: UserId,
        project: ProjectId,
        amount: Decimal,
    ) -> Result<InvestmentId, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        if self.accounts.get(investor).is_none() {
            return Err(LedgerError::AccountNotFound);
        }
        if handle.owner() == investor {
            return Err(LedgerError::SelfInvestment);
        }
        let investment = self.board.allocate_investment_id();
        {
            let mut data = handle.lock_for(self.config.op_timeout)?;
            if data.deleted {
                return Err(LedgerError::ProjectNotFound);
            }
            data.add_investment(investment, investor, amount);
        }
        self.board.link(investment, project);

        debug!(%investor, %project, %investment, %amount, "investment requested");
        Ok(investment)
    }

    /// Accepts a pending investment, project owner only. The amount
    /// joins the funding total and the status is re-derived.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvestmentNotFound`] - No such investment, or the
    ///   caller does not own its project.
    /// - [`LedgerError::InvalidTransition`] - Investment is not pending.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn accept_investment(
        &self,
        caller: UserId,
        investment: InvestmentId,
    ) -> Result<(), LedgerError> {
        let project = self
            .board
            .project_of(investment)
            .ok_or(LedgerError::InvestmentNotFound)?;
        let handle = self.board.get(project).ok_or(LedgerError::InvestmentNotFound)?;
        if handle.owner() != caller {
            return Err(LedgerError::InvestmentNotFound);
        }
        let today = Utc::now().date_naive();

        let mut data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::InvestmentNotFound);
        }
        let amount = data.confirm_investment(investment, today)?;

        debug!(%caller, %project, %investment, %amount, status = ?data.status, "investment accepted");
        Ok(())
    }

    /// Declines a pending investment, project owner only. Totals stay
    /// untouched and the record remains, declined.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvestmentNotFound`] - No such investment, or the
    ///   caller does not own its project.
    /// - [`LedgerError::InvalidTransition`] - Investment is not pending.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn decline_investment(
        &self,
        caller: UserId,
        investment: InvestmentId,
    ) -> Result<(), LedgerError> {
        let project = self
            .board
            .project_of(investment)
            .ok_or(LedgerError::InvestmentNotFound)?;
        let handle = self.board.get(project).ok_or(LedgerError::InvestmentNotFound)?;
        if handle.owner() != caller {
            return Err(LedgerError::InvestmentNotFound);
        }

        let mut data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::InvestmentNotFound);
        }
        data.decline_investment(investment)?;

        debug!(%caller, %project, %investment, "investment declined");
        Ok(())
    }

    /// Removes the caller's own investment in any state. A confirmed
    /// investment leaves the funding total on its way out.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvestmentNotFound`] - No such investment, or it
    ///   belongs to another investor.
    /// - [`LedgerError::Timeout`] - The project lock could not be had in time.
    pub fn cancel_investment(
        &self,
        caller: UserId,
        investment: InvestmentId,
    ) -> Result<(), LedgerError> {
        let project = self
            .board
            .project_of(investment)
            .ok_or(LedgerError::InvestmentNotFound)?;
        let handle = self.board.get(project).ok_or(LedgerError::InvestmentNotFound)?;
        let today = Utc::now().date_naive();

        let prior = {
            let mut data = handle.lock_for(self.config.op_timeout)?;
            if data.deleted {
                return Err(LedgerError::InvestmentNotFound);
            }
            data.cancel_investment(caller, investment, today)?
        };
        self.board.unlink(investment);

        debug!(%caller, %project, %investment, was = ?prior, "investment cancelled");
        Ok(())
    }

    /// Re-derives one project's status and returns it.
    pub fn recompute_project_status(
        &self,
        project: ProjectId,
    ) -> Result<ProjectStatus, LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        let today = Utc::now().date_naive();

        let mut data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::ProjectNotFound);
        }
        if data.recompute_status(today) {
            debug!(%project, status = ?data.status, "project status recomputed");
        }
        Ok(data.status)
    }

    /// Whether the project has confirmed investments. This is the same
    /// check that gates editing and deletion.
    pub fn has_investments(&self, project: ProjectId) -> Result<bool, LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        let data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::ProjectNotFound);
        }
        Ok(data.has_confirmed())
    }

    /// Re-derives every project's status, skipping projects busy in
    /// another operation. Returns how many changed.
    pub fn sweep_project_statuses(&self) -> usize {
        let today = Utc::now().date_naive();
        let mut transitioned = 0;
        for project in self.board.all() {
            // A contended project is mid-mutation and recomputes its
            // own status; the next sweep catches anything left.
            if let Some(mut data) = project.try_lock() {
                if !data.deleted && data.recompute_status(today) {
                    debug!(project = %project.id(), status = ?data.status, "project status swept");
                    transitioned += 1;
                }
            }
        }
        transitioned
    }

    /// Snapshots of every live project, ordered by id.
    pub fn projects(&self) -> Vec<ProjectSnapshot> {
        self.board.snapshots()
    }

    pub fn get_project(&self, project: ProjectId) -> Result<ProjectSnapshot, LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        handle.snapshot().ok_or(LedgerError::ProjectNotFound)
    }

    /// A project's investments, ordered by id.
    pub fn investments_for(
        &self,
        project: ProjectId,
    ) -> Result<Vec<InvestmentSnapshot>, LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        let data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::ProjectNotFound);
        }
        Ok(data.investment_snapshots())
    }

    /// All of one investor's investments across projects, ordered by id.
    pub fn investments_by(&self, investor: UserId) -> Vec<InvestmentSnapshot> {
        let mut all: Vec<InvestmentSnapshot> = self
            .board
            .all()
            .iter()
            .flat_map(|project| project.investments_of(investor))
            .collect();
        all.sort_by_key(|snapshot| snapshot.id);
        all
    }

    /// Every funding total change of a project, oldest first.
    pub fn amount_history(
        &self,
        project: ProjectId,
    ) -> Result<Vec<AmountHistoryRecord>, LedgerError> {
        let handle = self.board.get(project).ok_or(LedgerError::ProjectNotFound)?;
        let data = handle.lock_for(self.config.op_timeout)?;
        if data.deleted {
            return Err(LedgerError::ProjectNotFound);
        }
        Ok(data.history())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
