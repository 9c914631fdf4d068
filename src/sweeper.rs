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

//! Periodic project status sweep.
//!
//! Project status is derived from the funding total and the deadline.
//! Mutations re-derive it on the spot, but a project nobody touches
//! would otherwise never notice its deadline passing. The sweeper
//! closes that gap from a background thread.

use crate::Engine;
use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Background thread that re-derives project statuses on an interval.
///
/// Dropping the sweeper stops the thread and joins it.
pub struct StatusSweeper {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StatusSweeper {
    /// Spawns the sweep thread. Each tick runs one engine sweep;
    /// contended projects are skipped and picked up next tick.
    pub fn spawn(engine: Arc<Engine>, interval: Duration) -> Self {
        let (shutdown, quit) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);
        let handle = thread::spawn(move || {
            loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        let transitioned = engine.sweep_project_statuses();
                        if transitioned > 0 {
                            debug!(transitioned, "project status sweep");
                        }
                    }
                    recv(quit) -> _ => break,
                }
            }
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for StatusSweeper {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
