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

//! Error types for ledger operations.

use thiserror::Error;

/// Ledger operation errors.
///
/// Ownership failures are deliberately indistinguishable from missing
/// records: acting on another user's goal or investment yields the same
/// not-found variant, so callers cannot probe for ids they do not own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Deadline is today or in the past
    #[error("deadline must be in the future")]
    DeadlineNotFuture,

    /// Debit would exceed the current balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Acting account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// No account matches the receiver card number
    #[error("receiver not found")]
    ReceiverNotFound,

    /// Receiver national id does not match the resolved account
    #[error("receiver identity does not match")]
    IdentityMismatch,

    /// Sender and receiver are the same account
    #[error("cannot transfer to own account")]
    SelfTransfer,

    /// User id or card number is already registered
    #[error("account already exists")]
    DuplicateAccount,

    /// Goal does not exist or is not owned by the caller
    #[error("goal not found")]
    GoalNotFound,

    /// Goal has already reached its target
    #[error("goal already achieved")]
    GoalAlreadyAchieved,

    /// Project owners cannot invest in their own project
    #[error("cannot invest in own project")]
    SelfInvestment,

    /// Project does not exist or is not owned by the caller
    #[error("project not found")]
    ProjectNotFound,

    /// Investment does not exist or is not visible to the caller
    #[error("investment not found")]
    InvestmentNotFound,

    /// Investment is not in a state that allows the requested change
    #[error("invalid investment state transition")]
    InvalidTransition,

    /// Project has confirmed investments and cannot be edited or deleted
    #[error("project has confirmed investments")]
    ProjectLocked,

    /// A required lock could not be acquired within the operation timeout
    #[error("operation timed out")]
    Timeout,
}
