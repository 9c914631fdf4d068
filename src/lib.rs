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

//! # Moneta
//!
//! This library provides an in-memory ledger engine for peer-to-peer
//! transfers, bill payments, savings goals, and crowdfunding projects.
//! Every operation is atomic: it either fully commits or leaves no
//! trace, under any interleaving of concurrent callers.
//!
//! ## Core Components
//!
//! - [`Engine`]: Central processor holding accounts, goals, projects, and the log
//! - [`LedgerEntry`]: Append-only record of committed transfers and bill payments
//! - [`StatusSweeper`]: Background thread re-deriving project statuses
//! - [`LedgerError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use moneta::{Engine, ReceiverRef, UserId};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! engine
//!     .open_account(UserId(1), "4000-0001", "19900101-0001", dec!(1000.00))
//!     .unwrap();
//! engine
//!     .open_account(UserId(2), "4000-0002", "19900101-0002", dec!(500.00))
//!     .unwrap();
//!
//! // Transfer 200.00 by card number and national id.
//! let receiver = ReceiverRef::new("4000-0002", "19900101-0002");
//! engine
//!     .transfer(UserId(1), &receiver, dec!(200.00), "rent")
//!     .unwrap();
//!
//! assert_eq!(engine.balance(UserId(1)).unwrap(), dec!(800.00));
//! assert_eq!(engine.balance(UserId(2)).unwrap(), dec!(700.00));
//! assert_eq!(engine.entries().len(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! Entities guard their state with per-entity locks, so operations on
//! unrelated accounts, goals, and projects run in parallel. Operations
//! touching more than one entity lock in a fixed order with bounded
//! waits, failing fast instead of deadlocking.

pub mod account;
mod base;
mod engine;
pub mod error;
mod funding;
mod goal;
mod ledger_log;
mod sweeper;

pub use account::{Account, AccountSnapshot};
pub use base::{BillId, EntryId, GoalId, InvestmentId, ProjectId, ReceiverRef, UserId};
pub use engine::{Engine, LedgerConfig};
pub use error::LedgerError;
pub use funding::{
    AmountHistoryRecord, InvestmentSnapshot, InvestmentStatus, Project, ProjectSnapshot,
    ProjectStatus, ProjectUpdate,
};
pub use goal::{Goal, GoalSnapshot, GoalStatus};
pub use ledger_log::{Bill, EntryKind, LedgerEntry};
pub use sweeper::StatusSweeper;
