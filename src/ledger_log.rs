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

//! Append-only record of committed money movement.
//!
//! Every successful transfer and bill payment lands here, in commit
//! order. Entries are never updated or removed.

use crate::base::{BillId, EntryId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which kind of movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Transfer,
    Bill,
}

/// One committed money movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub sender: UserId,
    /// Receiving account for transfers. Bill payments have no receiver.
    pub receiver: Option<UserId>,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Payment record for a settled bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub owner: UserId,
    /// Issuer reference, e.g. an invoice or meter number.
    pub reference: String,
    pub amount: Decimal,
    pub date_paid: NaiveDate,
}

#[derive(Debug)]
struct LogData {
    entries: Vec<LedgerEntry>,
    bills: Vec<Bill>,
    next_entry_id: u64,
    next_bill_id: u64,
}

/// Shared ledger log.
///
/// A single lock guards both tables so that a bill row and its ledger
/// entry become visible together. The lock is a leaf: it is taken while
/// account locks are held but never the other way around, and nothing
/// else is acquired under it.
#[derive(Debug)]
pub(crate) struct LedgerLog {
    inner: RwLock<LogData>,
}

impl LedgerLog {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(LogData {
                entries: Vec::new(),
                bills: Vec::new(),
                next_entry_id: 1,
                next_bill_id: 1,
            }),
        }
    }

    /// Records a committed transfer.
    ///
    /// Call only while both account locks are held and the balances
    /// have already been updated.
    pub(crate) fn record_transfer(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Decimal,
        description: &str,
    ) -> EntryId {
        let mut data = self.inner.write();
        let id = EntryId(data.next_entry_id);
        data.next_entry_id += 1;
        data.entries.push(LedgerEntry {
            id,
            kind: EntryKind::Transfer,
            sender,
            receiver: Some(receiver),
            amount,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        id
    }

    /// Records a settled bill together with its ledger entry.
    ///
    /// Call only while the paying account lock is held and the balance
    /// has already been debited.
    pub(crate) fn record_bill(
        &self,
        owner: UserId,
        reference: &str,
        amount: Decimal,
    ) -> (BillId, EntryId) {
        let now = Utc::now();
        let mut data = self.inner.write();
        let bill_id = BillId(data.next_bill_id);
        data.next_bill_id += 1;
        data.bills.push(Bill {
            id: bill_id,
            owner,
            reference: reference.to_string(),
            amount,
            date_paid: now.date_naive(),
        });
        let entry_id = EntryId(data.next_entry_id);
        data.next_entry_id += 1;
        data.entries.push(LedgerEntry {
            id: entry_id,
            kind: EntryKind::Bill,
            sender: owner,
            receiver: None,
            amount,
            description: reference.to_string(),
            created_at: now,
        });
        (bill_id, entry_id)
    }

    pub(crate) fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.read().entries.clone()
    }

    /// Entries where the user is sender or receiver, in commit order.
    pub(crate) fn entries_for(&self, user: UserId) -> Vec<LedgerEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|entry| entry.sender == user || entry.receiver == Some(user))
            .cloned()
            .collect()
    }

    pub(crate) fn bills(&self) -> Vec<Bill> {
        self.inner.read().bills.clone()
    }

    pub(crate) fn bills_for(&self, owner: UserId) -> Vec<Bill> {
        self.inner
            .read()
            .bills
            .iter()
            .filter(|bill| bill.owner == owner)
            .cloned()
            .collect()
    }
}

impl Default for LedgerLog {
    fn default() -> Self {
        Self::new()
    }
}
