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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use moneta::{Engine, GoalId, InvestmentId, LedgerConfig, ProjectId, ReceiverRef, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Ledger Engine - Process operation CSV files
///
/// Reads ledger operations from a CSV file and outputs account states
/// to stdout. Supports account opening, transfers, bill payments,
/// savings goals, and crowdfunding investments.
#[derive(Parser, Debug)]
#[command(name = "moneta")]
#[command(about = "A ledger engine that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,user,ref,identity,target,amount,deadline,note
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Longest wait for any entity lock, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Logs go to stderr; stdout carries the account CSV.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Process operations from CSV
    let config = LedgerConfig {
        op_timeout: Duration::from_millis(args.timeout_ms),
    };
    let engine = match process_operations(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    if let Err(e) = write_accounts(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, ref, identity, target, amount, deadline, note`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user: Option<u32>,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default)]
    identity: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    target: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    deadline: Option<NaiveDate>,
    #[serde(default)]
    note: Option<String>,
}

/// One ledger operation parsed from a CSV row.
#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Open {
        user: UserId,
        card_no: String,
        national_id: String,
        initial_balance: Decimal,
    },
    Transfer {
        sender: UserId,
        receiver: ReceiverRef,
        amount: Decimal,
        note: String,
    },
    Bill {
        user: UserId,
        reference: String,
        amount: Decimal,
    },
    Goal {
        owner: UserId,
        title: String,
        target_amount: Decimal,
        deadline: NaiveDate,
    },
    Fund {
        owner: UserId,
        goal: GoalId,
        amount: Decimal,
    },
    DropGoal {
        owner: UserId,
        goal: GoalId,
    },
    Project {
        owner: UserId,
        title: String,
        description: String,
        goal_amount: Decimal,
        deadline: NaiveDate,
    },
    Invest {
        investor: UserId,
        project: ProjectId,
        amount: Decimal,
    },
    Accept {
        caller: UserId,
        investment: InvestmentId,
    },
    Decline {
        caller: UserId,
        investment: InvestmentId,
    },
    Cancel {
        caller: UserId,
        investment: InvestmentId,
    },
    Sweep,
}

impl CsvRecord {
    /// Converts the CSV record to an [`Operation`].
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let user = self.user.map(UserId);
        let reference = self.reference.filter(|s| !s.is_empty());
        let identity = self.identity.filter(|s| !s.is_empty());
        let note = self.note.filter(|s| !s.is_empty());

        match self.op.to_lowercase().as_str() {
            "open" => Some(Operation::Open {
                user: user?,
                card_no: reference?,
                national_id: identity?,
                initial_balance: self.amount?,
            }),
            "transfer" => Some(Operation::Transfer {
                sender: user?,
                receiver: ReceiverRef::new(reference?, identity?),
                amount: self.amount?,
                note: note.unwrap_or_default(),
            }),
            "bill" => Some(Operation::Bill {
                user: user?,
                reference: reference?,
                amount: self.amount?,
            }),
            "goal" => Some(Operation::Goal {
                owner: user?,
                title: reference?,
                target_amount: self.amount?,
                deadline: self.deadline?,
            }),
            "fund" => Some(Operation::Fund {
                owner: user?,
                goal: GoalId(self.target?),
                amount: self.amount?,
            }),
            "dropgoal" => Some(Operation::DropGoal {
                owner: user?,
                goal: GoalId(self.target?),
            }),
            "project" => Some(Operation::Project {
                owner: user?,
                title: reference?,
                description: note.unwrap_or_default(),
                goal_amount: self.amount?,
                deadline: self.deadline?,
            }),
            "invest" => Some(Operation::Invest {
                investor: user?,
                project: ProjectId(self.target?),
                amount: self.amount?,
            }),
            "accept" => Some(Operation::Accept {
                caller: user?,
                investment: InvestmentId(self.target?),
            }),
            "decline" => Some(Operation::Decline {
                caller: user?,
                investment: InvestmentId(self.target?),
            }),
            "cancel" => Some(Operation::Cancel {
                caller: user?,
                investment: InvestmentId(self.target?),
            }),
            "sweep" => Some(Operation::Sweep),
            _ => None,
        }
    }
}

/// Runs one parsed operation against the engine.
fn apply(engine: &Engine, operation: Operation) -> Result<(), moneta::LedgerError> {
    match operation {
        Operation::Open {
            user,
            card_no,
            national_id,
            initial_balance,
        } => engine.open_account(user, &card_no, &national_id, initial_balance),
        Operation::Transfer {
            sender,
            receiver,
            amount,
            note,
        } => engine.transfer(sender, &receiver, amount, &note).map(|_| ()),
        Operation::Bill {
            user,
            reference,
            amount,
        } => engine.pay_bill(user, &reference, amount).map(|_| ()),
        Operation::Goal {
            owner,
            title,
            target_amount,
            deadline,
        } => engine
            .create_goal(owner, &title, target_amount, deadline)
            .map(|_| ()),
        Operation::Fund {
            owner,
            goal,
            amount,
        } => engine.fund_goal(owner, goal, amount),
        Operation::DropGoal { owner, goal } => engine.delete_goal(owner, goal).map(|_| ()),
        Operation::Project {
            owner,
            title,
            description,
            goal_amount,
            deadline,
        } => engine
            .create_project(owner, &title, &description, goal_amount, deadline)
            .map(|_| ()),
        Operation::Invest {
            investor,
            project,
            amount,
        } => engine
            .request_investment(investor, project, amount)
            .map(|_| ()),
        Operation::Accept { caller, investment } => engine.accept_investment(caller, investment),
        Operation::Decline { caller, investment } => engine.decline_investment(caller, investment),
        Operation::Cancel { caller, investment } => engine.cancel_investment(caller, investment),
        Operation::Sweep => {
            engine.sweep_project_statuses();
            Ok(())
        }
    }
}

/// Process operations from a CSV reader.
///
/// This function uses streaming parsing to handle arbitrarily large CSV
/// files without loading the entire file into memory. Malformed rows and
/// rejected operations are skipped so one bad row never stops a batch.
///
/// # CSV Format
///
/// Expected columns: `op, user, ref, identity, target, amount, deadline, note`
/// - `op`: Operation (open, transfer, bill, goal, fund, dropgoal,
///   project, invest, accept, decline, cancel, sweep)
/// - `user`: Acting user id (u32)
/// - `ref`: Card number, bill reference, or title, depending on `op`
/// - `identity`: Receiver national id (transfers and account opening)
/// - `target`: Goal, project, or investment id, depending on `op`
/// - `amount`: Decimal amount
/// - `deadline`: Goal or project deadline, `YYYY-MM-DD`
/// - `note`: Free-text description
///
/// # Example
///
/// ```csv
/// op,user,ref,identity,target,amount,deadline,note
/// open,1,4000-0001,19900101-0001,,1000.00,,
/// open,2,4000-0002,19900101-0002,,500.00,,
/// transfer,1,4000-0002,19900101-0002,,200.00,,rent
/// bill,2,ELEC-2025-07,,,42.50,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails. Individual operation errors
/// are logged in debug mode but don't stop processing.
pub fn process_operations<R: Read>(reader: R, config: LedgerConfig) -> Result<Engine, csv::Error> {
    let engine = Engine::with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " transfer "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                // Convert CSV record to a ledger operation
                let Some(operation) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                // Apply the operation, ignoring rejections (silent failure)
                if let Err(e) = apply(&engine, operation) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation: {}", e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

/// Write account states to a CSV writer
///
/// Outputs all accounts in CSV format with 2 decimal precision,
/// ordered by user id.
///
/// # CSV Format
///
/// Columns: `user, balance, blocked`
///
/// # Example
///
/// ```csv
/// user,balance,blocked
/// 1,757.50,false
/// 2,657.50,false
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    // Get all account snapshots and serialize each one
    for account in engine.accounts() {
        wtr.serialize(&account)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
