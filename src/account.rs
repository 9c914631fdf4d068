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

//! Account management.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use moneta::{Engine, UserId};
//!
//! let engine = Engine::new();
//! engine
//!     .open_account(UserId(1), "4000-0001", "19900101-0001", dec!(25.00))
//!     .unwrap();
//! assert_eq!(engine.balance(UserId(1)).unwrap(), dec!(25.00));
//! ```

use crate::base::UserId;
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct AccountData {
    pub(crate) balance: Decimal,
    pub(crate) blocked: bool,
}

impl AccountData {
    fn new(balance: Decimal) -> Self {
        Self {
            balance,
            blocked: false,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance.
    ///
    /// The `blocked` flag does not gate balance movement: screening
    /// blocked users is the job of whatever sits in front of the
    /// ledger, and refunds must still land on a blocked account.
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }
}

/// Ledger account.
///
/// The user id, card number, and national id never change after the
/// account is opened and live outside the mutex. Only the balance and
/// the blocked flag are guarded.
#[derive(Debug)]
pub struct Account {
    user: UserId,
    card_no: String,
    national_id: String,
    inner: Mutex<AccountData>,
}

impl Account {
    fn new(user: UserId, card_no: &str, national_id: &str, balance: Decimal) -> Self {
        Self {
            user,
            card_no: card_no.to_string(),
            national_id: national_id.to_string(),
            inner: Mutex::new(AccountData::new(balance)),
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn card_no(&self) -> &str {
        &self.card_no
    }

    pub fn national_id(&self) -> &str {
        &self.national_id
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub fn blocked(&self) -> bool {
        self.inner.lock().blocked
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        let data = self.inner.lock();
        AccountSnapshot {
            user: self.user,
            balance: data.balance,
            blocked: data.blocked,
        }
    }

    /// Acquires the balance lock, giving up after `timeout`.
    pub(crate) fn lock_for(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, AccountData>, LedgerError> {
        self.inner.try_lock_for(timeout).ok_or(LedgerError::Timeout)
    }
}

/// Point-in-time view of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub user: UserId,
    pub balance: Decimal,
    pub blocked: bool,
}

impl AccountSnapshot {
    const DECIMAL_PRECISION: u32 = 2;
}

impl Serialize for AccountSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field(
            "balance",
            &self.balance.round_dp(AccountSnapshot::DECIMAL_PRECISION),
        )?;
        state.serialize_field("blocked", &self.blocked)?;
        state.end()
    }
}

/// All open accounts, indexed by user id and by card number.
///
/// Accounts are never removed, so an `Arc<Account>` cloned out of the
/// map stays valid for the life of the process.
#[derive(Debug, Default)]
pub(crate) struct AccountStore {
    accounts: DashMap<UserId, Arc<Account>>,
    cards: DashMap<String, UserId>,
}

impl AccountStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new account with an opening balance.
    ///
    /// The card index entry is reserved first, then the account slot.
    /// No other code path holds a card entry while touching the account
    /// map, so holding both entries here cannot deadlock.
    pub(crate) fn open(
        &self,
        user: UserId,
        card_no: &str,
        national_id: &str,
        initial_balance: Decimal,
    ) -> Result<(), LedgerError> {
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        // Use entry API for atomic check-and-insert to prevent race conditions
        match self.cards.entry(card_no.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateAccount),
            Entry::Vacant(card_slot) => match self.accounts.entry(user) {
                Entry::Occupied(_) => Err(LedgerError::DuplicateAccount),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(Account::new(
                        user,
                        card_no,
                        national_id,
                        initial_balance,
                    )));
                    card_slot.insert(user);
                    Ok(())
                }
            },
        }
    }

    pub(crate) fn get(&self, user: UserId) -> Option<Arc<Account>> {
        self.accounts.get(&user).map(|entry| Arc::clone(&entry))
    }

    /// Resolves a card number to the owning user, if any.
    pub(crate) fn resolve_card(&self, card_no: &str) -> Option<UserId> {
        self.cards.get(card_no).map(|entry| *entry)
    }

    /// Snapshots every account, ordered by user id.
    pub(crate) fn snapshots(&self) -> Vec<AccountSnapshot> {
        let mut all: Vec<AccountSnapshot> = self
            .accounts
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by_key(|snapshot| snapshot.user);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // === AccountData Internal Tests ===
    // These test the private AccountData methods directly.

    #[test]
    fn account_data_credit_and_debit() {
        let mut data = AccountData::new(dec!(100.00));
        data.credit(dec!(50.00)).unwrap();
        assert_eq!(data.balance, dec!(150.00));
        data.debit(dec!(30.00)).unwrap();
        assert_eq!(data.balance, dec!(120.00));
    }

    #[test]
    fn debit_insufficient_returns_error() {
        let mut data = AccountData::new(dec!(50.00));
        let result = data.debit(dec!(100.00));
        assert_eq!(result, Err(LedgerError::InsufficientFunds));
        assert_eq!(data.balance, dec!(50.00));
    }

    #[test]
    fn debit_rejects_zero_and_negative_amounts() {
        let mut data = AccountData::new(dec!(50.00));
        assert_eq!(data.debit(Decimal::ZERO), Err(LedgerError::InvalidAmount));
        assert_eq!(data.debit(dec!(-10.00)), Err(LedgerError::InvalidAmount));
        assert_eq!(data.balance, dec!(50.00));
    }

    #[test]
    fn credit_rejects_zero_and_negative_amounts() {
        let mut data = AccountData::new(dec!(50.00));
        assert_eq!(data.credit(Decimal::ZERO), Err(LedgerError::InvalidAmount));
        assert_eq!(data.credit(dec!(-10.00)), Err(LedgerError::InvalidAmount));
    }

    #[test]
    fn blocked_flag_does_not_gate_balance_movement() {
        let mut data = AccountData::new(dec!(100.00));
        data.blocked = true;
        data.debit(dec!(40.00)).unwrap();
        data.credit(dec!(10.00)).unwrap();
        assert_eq!(data.balance, dec!(70.00));
    }

    #[test]
    fn debit_to_exactly_zero_is_allowed() {
        let mut data = AccountData::new(dec!(75.00));
        data.debit(dec!(75.00)).unwrap();
        assert_eq!(data.balance, Decimal::ZERO);
    }

    // === AccountStore Tests ===

    #[test]
    fn open_registers_account_and_card() {
        let store = AccountStore::new();
        store
            .open(UserId(1), "4000-0001", "19900101-0001", dec!(10.00))
            .unwrap();

        let account = store.get(UserId(1)).unwrap();
        assert_eq!(account.user(), UserId(1));
        assert_eq!(account.card_no(), "4000-0001");
        assert_eq!(account.national_id(), "19900101-0001");
        assert_eq!(account.balance(), dec!(10.00));
        assert!(!account.blocked());
        assert_eq!(store.resolve_card("4000-0001"), Some(UserId(1)));
    }

    #[test]
    fn open_rejects_duplicate_user() {
        let store = AccountStore::new();
        store
            .open(UserId(1), "4000-0001", "19900101-0001", dec!(10.00))
            .unwrap();
        let result = store.open(UserId(1), "4000-0002", "19900101-0002", dec!(10.00));
        assert_eq!(result, Err(LedgerError::DuplicateAccount));
        // The losing card must not stay reserved.
        assert_eq!(store.resolve_card("4000-0002"), None);
    }

    #[test]
    fn open_rejects_duplicate_card() {
        let store = AccountStore::new();
        store
            .open(UserId(1), "4000-0001", "19900101-0001", dec!(10.00))
            .unwrap();
        let result = store.open(UserId(2), "4000-0001", "19900101-0002", dec!(10.00));
        assert_eq!(result, Err(LedgerError::DuplicateAccount));
        assert!(store.get(UserId(2)).is_none());
    }

    #[test]
    fn open_rejects_negative_initial_balance() {
        let store = AccountStore::new();
        let result = store.open(UserId(1), "4000-0001", "19900101-0001", dec!(-0.01));
        assert_eq!(result, Err(LedgerError::InvalidAmount));
    }

    #[test]
    fn open_allows_zero_initial_balance() {
        let store = AccountStore::new();
        store
            .open(UserId(1), "4000-0001", "19900101-0001", Decimal::ZERO)
            .unwrap();
        assert_eq!(store.get(UserId(1)).unwrap().balance(), Decimal::ZERO);
    }

    #[test]
    fn snapshots_are_ordered_by_user_id() {
        let store = AccountStore::new();
        store
            .open(UserId(7), "4000-0007", "19900101-0007", dec!(7.00))
            .unwrap();
        store
            .open(UserId(2), "4000-0002", "19900101-0002", dec!(2.00))
            .unwrap();
        store
            .open(UserId(5), "4000-0005", "19900101-0005", dec!(5.00))
            .unwrap();

        let users: Vec<UserId> = store.snapshots().iter().map(|s| s.user).collect();
        assert_eq!(users, vec![UserId(2), UserId(5), UserId(7)]);
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_rounds_to_two_decimal_places() {
        use serde_json;

        let snapshot = AccountSnapshot {
            user: UserId(1),
            // 123.456789 should round to 123.46
            balance: dec!(123.456789),
            blocked: false,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        let balance = parsed["balance"].as_str().unwrap();
        assert_eq!(balance, "123.46", "balance should round to 2 decimal places");
    }

    #[test]
    fn serializer_preserves_precision_up_to_two_decimals() {
        use serde_json;

        let snapshot = AccountSnapshot {
            user: UserId(42),
            balance: dec!(100.12),
            blocked: true,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["user"], 42);
        assert_eq!(parsed["balance"].as_str().unwrap(), "100.12");
        assert_eq!(parsed["blocked"], true);
    }

    #[test]
    fn serializer_handles_whole_numbers() {
        use serde_json;

        let snapshot = AccountSnapshot {
            user: UserId(1),
            balance: dec!(1000),
            blocked: false,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        // Whole numbers serialize without trailing zeros
        assert_eq!(parsed["balance"].as_str().unwrap(), "1000");
    }

    #[test]
    fn serializer_uses_bankers_rounding() {
        use serde_json;

        let snapshot = AccountSnapshot {
            user: UserId(1),
            // Banker's rounding (round half to even):
            // 0.015 rounds to 0.02, 0.005 would round to 0.00
            balance: dec!(0.015),
            blocked: false,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["balance"].as_str().unwrap(), "0.02");
    }

    #[test]
    fn serializer_precision_constant_is_two() {
        assert_eq!(AccountSnapshot::DECIMAL_PRECISION, 2);
    }
}
