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

//! Crowdfunding integration tests: projects, investments and derived status.

use chrono::{Days, NaiveDate, Utc};
use moneta::{
    Engine, InvestmentStatus, LedgerError, ProjectId, ProjectStatus, ProjectUpdate, StatusSweeper,
    UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn open(engine: &Engine, user: u32, balance: Decimal) {
    engine
        .open_account(
            UserId(user),
            &format!("4000-{user:04}"),
            &format!("19900101-{user:04}"),
            balance,
        )
        .unwrap();
}

fn days_ahead(days: u64) -> NaiveDate {
    Utc::now().date_naive() + Days::new(days)
}

fn yesterday() -> NaiveDate {
    Utc::now().date_naive() - Days::new(1)
}

fn solar_farm(engine: &Engine, owner: u32, goal: Decimal, deadline: NaiveDate) -> ProjectId {
    engine
        .create_project(UserId(owner), "solar farm", "panels for the roof", goal, deadline)
        .unwrap()
}

#[test]
fn create_project_starts_open_and_unfunded() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));

    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.owner, UserId(1));
    assert_eq!(snapshot.title, "solar farm");
    assert_eq!(snapshot.goal_amount, dec!(1000.00));
    assert_eq!(snapshot.current_amount, dec!(0.00));
    assert_eq!(snapshot.status, ProjectStatus::Open);
}

#[test]
fn create_project_with_non_positive_goal_fails() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));

    let result = engine.create_project(UserId(1), "x", "", dec!(0.00), days_ahead(30));
    assert_eq!(result, Err(LedgerError::InvalidAmount));
}

#[test]
fn create_project_for_unknown_owner_fails() {
    let engine = Engine::new();
    let result = engine.create_project(UserId(9), "x", "", dec!(10.00), days_ahead(30));
    assert_eq!(result, Err(LedgerError::AccountNotFound));
}

#[test]
fn requested_investment_is_pending_and_moves_no_money() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let investment = engine
        .request_investment(UserId(2), project, dec!(250.00))
        .unwrap();

    let pledged = &engine.investments_for(project).unwrap()[0];
    assert_eq!(pledged.id, investment);
    assert_eq!(pledged.investor, UserId(2));
    assert_eq!(pledged.amount, dec!(250.00));
    assert_eq!(pledged.status, InvestmentStatus::Pending);

    // A pledge is a promise, not a payment.
    assert_eq!(engine.balance(UserId(2)).unwrap(), dec!(500.00));
    assert_eq!(engine.get_project(project).unwrap().current_amount, dec!(0.00));
}

#[test]
fn owner_cannot_invest_in_own_project() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let result = engine.request_investment(UserId(1), project, dec!(50.00));
    assert_eq!(result, Err(LedgerError::SelfInvestment));
}

#[test]
fn investment_in_unknown_project_fails() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));

    let result = engine.request_investment(UserId(1), ProjectId(77), dec!(50.00));
    assert_eq!(result, Err(LedgerError::ProjectNotFound));
}

#[test]
fn investment_by_unknown_user_fails() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let result = engine.request_investment(UserId(9), project, dec!(50.00));
    assert_eq!(result, Err(LedgerError::AccountNotFound));
}

#[test]
fn accepting_adds_to_the_total_and_history() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let investment = engine
        .request_investment(UserId(2), project, dec!(250.00))
        .unwrap();
    engine.accept_investment(UserId(1), investment).unwrap();

    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.current_amount, dec!(250.00));
    assert_eq!(snapshot.status, ProjectStatus::Open);

    let history = engine.amount_history(project).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].resulting_total, dec!(250.00));

    // Accepting still moves no balances.
    assert_eq!(engine.balance(UserId(2)).unwrap(), dec!(500.00));
    assert_eq!(engine.balance(UserId(1)).unwrap(), dec!(100.00));
}

#[test]
fn only_the_owner_can_accept_or_decline() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    open(&engine, 3, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    // A non-owner cannot even learn the investment exists.
    assert_eq!(
        engine.accept_investment(UserId(3), investment),
        Err(LedgerError::InvestmentNotFound)
    );
    assert_eq!(
        engine.decline_investment(UserId(2), investment),
        Err(LedgerError::InvestmentNotFound)
    );

    let pledged = &engine.investments_for(project).unwrap()[0];
    assert_eq!(pledged.status, InvestmentStatus::Pending);
}

#[test]
fn accepting_twice_is_an_invalid_transition() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    engine.accept_investment(UserId(1), investment).unwrap();
    assert_eq!(
        engine.accept_investment(UserId(1), investment),
        Err(LedgerError::InvalidTransition)
    );

    // The total was not double-counted.
    assert_eq!(engine.get_project(project).unwrap().current_amount, dec!(100.00));
}

#[test]
fn declined_investment_is_terminal_and_adds_nothing() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    engine.decline_investment(UserId(1), investment).unwrap();

    let pledged = &engine.investments_for(project).unwrap()[0];
    assert_eq!(pledged.status, InvestmentStatus::Declined);
    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.current_amount, dec!(0.00));
    assert_eq!(snapshot.status, ProjectStatus::Open);
    assert!(engine.amount_history(project).unwrap().is_empty());

    assert_eq!(
        engine.accept_investment(UserId(1), investment),
        Err(LedgerError::InvalidTransition)
    );
    assert_eq!(
        engine.decline_investment(UserId(1), investment),
        Err(LedgerError::InvalidTransition)
    );
}

#[test]
fn reaching_the_goal_marks_the_project_funded() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    open(&engine, 3, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let first = engine
        .request_investment(UserId(2), project, dec!(600.00))
        .unwrap();
    let second = engine
        .request_investment(UserId(3), project, dec!(400.00))
        .unwrap();
    engine.accept_investment(UserId(1), first).unwrap();
    assert_eq!(engine.get_project(project).unwrap().status, ProjectStatus::Open);

    engine.accept_investment(UserId(1), second).unwrap();
    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.current_amount, dec!(1000.00));
    assert_eq!(snapshot.status, ProjectStatus::Funded);

    let totals: Vec<Decimal> = engine
        .amount_history(project)
        .unwrap()
        .iter()
        .map(|row| row.resulting_total)
        .collect();
    assert_eq!(totals, vec![dec!(600.00), dec!(1000.00)]);
}

#[test]
fn investor_can_cancel_a_pending_investment() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    engine.cancel_investment(UserId(2), investment).unwrap();

    assert!(engine.investments_for(project).unwrap().is_empty());
    assert_eq!(
        engine.accept_investment(UserId(1), investment),
        Err(LedgerError::InvestmentNotFound)
    );
}

#[test]
fn cancelling_a_confirmed_investment_subtracts_from_the_total() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    open(&engine, 3, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let keep = engine
        .request_investment(UserId(2), project, dec!(300.00))
        .unwrap();
    let gone = engine
        .request_investment(UserId(3), project, dec!(200.00))
        .unwrap();
    engine.accept_investment(UserId(1), keep).unwrap();
    engine.accept_investment(UserId(1), gone).unwrap();
    assert_eq!(engine.get_project(project).unwrap().current_amount, dec!(500.00));

    engine.cancel_investment(UserId(3), gone).unwrap();

    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.current_amount, dec!(300.00));
    // The subtraction shows up in the history trail too.
    let totals: Vec<Decimal> = engine
        .amount_history(project)
        .unwrap()
        .iter()
        .map(|row| row.resulting_total)
        .collect();
    assert_eq!(totals, vec![dec!(300.00), dec!(500.00), dec!(300.00)]);
}

#[test]
fn only_the_investor_can_cancel() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    // Not even the project owner may cancel someone's pledge.
    assert_eq!(
        engine.cancel_investment(UserId(1), investment),
        Err(LedgerError::InvestmentNotFound)
    );
    assert_eq!(engine.investments_for(project).unwrap().len(), 1);
}

#[test]
fn update_applies_only_the_given_fields() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let update = ProjectUpdate {
        title: Some("wind farm".to_string()),
        goal_amount: Some(dec!(2000.00)),
        ..ProjectUpdate::default()
    };
    engine.update_project(UserId(1), project, update).unwrap();

    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.title, "wind farm");
    assert_eq!(snapshot.description, "panels for the roof");
    assert_eq!(snapshot.goal_amount, dec!(2000.00));
}

#[test]
fn update_with_non_positive_goal_fails() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let update = ProjectUpdate {
        goal_amount: Some(dec!(0.00)),
        ..ProjectUpdate::default()
    };
    assert_eq!(
        engine.update_project(UserId(1), project, update),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(engine.get_project(project).unwrap().goal_amount, dec!(1000.00));
}

#[test]
fn cancelling_the_last_confirmed_investment_unlocks_editing() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(400.00))
        .unwrap();
    engine.accept_investment(UserId(1), investment).unwrap();
    engine.cancel_investment(UserId(2), investment).unwrap();

    // No confirmed investments remain, so the edit is allowed again, and
    // the new goal is re-derived against the current total of zero.
    let update = ProjectUpdate {
        goal_amount: Some(dec!(500.00)),
        ..ProjectUpdate::default()
    };
    engine.update_project(UserId(1), project, update).unwrap();
    assert_eq!(engine.get_project(project).unwrap().status, ProjectStatus::Open);
}

#[test]
fn confirmed_investments_lock_the_project() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();
    engine.accept_investment(UserId(1), investment).unwrap();
    assert!(engine.has_investments(project).unwrap());

    let update = ProjectUpdate {
        title: Some("new name".to_string()),
        ..ProjectUpdate::default()
    };
    assert_eq!(
        engine.update_project(UserId(1), project, update),
        Err(LedgerError::ProjectLocked)
    );
    assert_eq!(
        engine.delete_project(UserId(1), project),
        Err(LedgerError::ProjectLocked)
    );
}

#[test]
fn pending_and_declined_investments_do_not_lock_the_project() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    open(&engine, 3, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let _pending = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();
    let declined = engine
        .request_investment(UserId(3), project, dec!(100.00))
        .unwrap();
    engine.decline_investment(UserId(1), declined).unwrap();

    assert!(!engine.has_investments(project).unwrap());
    let update = ProjectUpdate {
        title: Some("still editable".to_string()),
        ..ProjectUpdate::default()
    };
    engine.update_project(UserId(1), project, update).unwrap();
    assert_eq!(engine.get_project(project).unwrap().title, "still editable");
}

#[test]
fn only_the_owner_may_update_or_delete() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let update = ProjectUpdate {
        title: Some("hijacked".to_string()),
        ..ProjectUpdate::default()
    };
    assert_eq!(
        engine.update_project(UserId(2), project, update),
        Err(LedgerError::ProjectNotFound)
    );
    assert_eq!(
        engine.delete_project(UserId(2), project),
        Err(LedgerError::ProjectNotFound)
    );
    assert_eq!(engine.get_project(project).unwrap().title, "solar farm");
}

#[test]
fn deleting_a_project_removes_its_pending_investments() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let investment = engine
        .request_investment(UserId(2), project, dec!(100.00))
        .unwrap();

    engine.delete_project(UserId(1), project).unwrap();

    assert_eq!(engine.get_project(project), Err(LedgerError::ProjectNotFound));
    assert!(engine.investments_by(UserId(2)).is_empty());
    assert_eq!(
        engine.accept_investment(UserId(1), investment),
        Err(LedgerError::InvestmentNotFound)
    );
    // The pledge never touched the balance, so nothing to give back.
    assert_eq!(engine.balance(UserId(2)).unwrap(), dec!(500.00));
}

#[test]
fn investments_by_collects_across_projects() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(100.00));
    open(&engine, 3, dec!(500.00));
    let first = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));
    let second = engine
        .create_project(UserId(2), "bakery", "", dec!(500.00), days_ahead(30))
        .unwrap();

    let a = engine.request_investment(UserId(3), first, dec!(10.00)).unwrap();
    let b = engine.request_investment(UserId(3), second, dec!(20.00)).unwrap();

    let mine = engine.investments_by(UserId(3));
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, a);
    assert_eq!(mine[0].project, first);
    assert_eq!(mine[1].id, b);
    assert_eq!(mine[1].project, second);
}

// =============================================================================
// Derived Project Status
// =============================================================================
//
// A project never stores a status decision of its own. After every change the
// status is re-derived from two facts:
//
// 1. total >= goal        -> Funded (checked first, so it wins over Closed)
// 2. today > deadline     -> Closed (only an Open project can close this way)
//
// Funded is sticky: once reached it survives cancellations that drop the
// total below the goal again. The deadline day itself still counts as open.
// Idle projects are picked up by the background sweeper, which runs the same
// derivation on a timer.
// =============================================================================

/// An overdue project closes on recompute, and a funded one never does.
///
/// Scenario:
/// 1. Two projects are created with yesterday's deadline
/// 2. One reaches its goal before anyone recomputes
/// 3. Recompute closes the unfunded one and leaves the funded one alone
#[test]
fn recompute_closes_overdue_but_not_funded_projects() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    let stale = solar_farm(&engine, 1, dec!(1000.00), yesterday());
    let winner = engine
        .create_project(UserId(1), "bakery", "", dec!(100.00), yesterday())
        .unwrap();

    let investment = engine
        .request_investment(UserId(2), winner, dec!(100.00))
        .unwrap();
    engine.accept_investment(UserId(1), investment).unwrap();

    assert_eq!(
        engine.recompute_project_status(stale).unwrap(),
        ProjectStatus::Closed
    );
    assert_eq!(
        engine.recompute_project_status(winner).unwrap(),
        ProjectStatus::Funded
    );
}

/// The deadline day itself does not close a project.
#[test]
fn deadline_day_still_counts_as_open() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(0));

    assert_eq!(
        engine.recompute_project_status(project).unwrap(),
        ProjectStatus::Open
    );
}

/// Funded status is sticky.
///
/// Scenario:
/// 1. A project reaches its goal and becomes Funded
/// 2. A confirmed investment is cancelled, dropping the total below the goal
/// 3. The project stays Funded
#[test]
fn funded_survives_dropping_below_the_goal() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(500.00));
    open(&engine, 3, dec!(500.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), days_ahead(30));

    let big = engine
        .request_investment(UserId(2), project, dec!(900.00))
        .unwrap();
    let small = engine
        .request_investment(UserId(3), project, dec!(100.00))
        .unwrap();
    engine.accept_investment(UserId(1), big).unwrap();
    engine.accept_investment(UserId(1), small).unwrap();
    assert_eq!(engine.get_project(project).unwrap().status, ProjectStatus::Funded);

    engine.cancel_investment(UserId(2), big).unwrap();

    let snapshot = engine.get_project(project).unwrap();
    assert_eq!(snapshot.current_amount, dec!(100.00));
    assert_eq!(snapshot.status, ProjectStatus::Funded);
}

/// A closed project can still become funded by a late acceptance.
///
/// Scenario:
/// 1. A pledge arrives while the project is open
/// 2. The deadline passes and a sweep closes the project
/// 3. The owner accepts the old pledge, the total reaches the goal,
///    and the project flips from Closed to Funded
#[test]
fn late_acceptance_flips_closed_to_funded() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    open(&engine, 2, dec!(2000.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), yesterday());
    let investment = engine
        .request_investment(UserId(2), project, dec!(1000.00))
        .unwrap();

    assert_eq!(engine.sweep_project_statuses(), 1);
    assert_eq!(engine.get_project(project).unwrap().status, ProjectStatus::Closed);

    engine.accept_investment(UserId(1), investment).unwrap();
    assert_eq!(engine.get_project(project).unwrap().status, ProjectStatus::Funded);
}

#[test]
fn sweep_reports_how_many_projects_changed() {
    let engine = Engine::new();
    open(&engine, 1, dec!(100.00));
    let _stale_a = solar_farm(&engine, 1, dec!(1000.00), yesterday());
    let _stale_b = engine
        .create_project(UserId(1), "bakery", "", dec!(500.00), yesterday())
        .unwrap();
    let _current = engine
        .create_project(UserId(1), "garden", "", dec!(500.00), days_ahead(30))
        .unwrap();

    assert_eq!(engine.sweep_project_statuses(), 2);
    // A second sweep finds nothing left to do.
    assert_eq!(engine.sweep_project_statuses(), 0);

    let open_count = engine
        .projects()
        .iter()
        .filter(|p| p.status == ProjectStatus::Open)
        .count();
    assert_eq!(open_count, 1);
}

#[test]
fn background_sweeper_closes_overdue_projects() {
    let engine = Arc::new(Engine::new());
    open(&engine, 1, dec!(100.00));
    let project = solar_farm(&engine, 1, dec!(1000.00), yesterday());

    let sweeper = StatusSweeper::spawn(Arc::clone(&engine), Duration::from_millis(10));

    // Poll until the sweeper has done its pass.
    let mut closed = false;
    for _ in 0..100 {
        if engine.get_project(project).unwrap().status == ProjectStatus::Closed {
            closed = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    drop(sweeper);
    assert!(closed, "sweeper never closed the overdue project");
}
