/*
 * Created on Sun Jul 09 2023
 *
 * This file is a part of Stratus
 * Stratus is a free and open-source in-memory datastore written by
 * Sayan Nandan ("the Author") with the vision to provide speed and
 * reliability in volatile data handling without compromising on
 * consistency or simplicity.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Background services
//!
//! The sweeper is the server's only timer: at a configurable cadence it
//! evicts a bounded batch of expired keys, times out blocking waiters and
//! settles overdue WAITs. All of that happens under the engine lock, so the
//! service never races the command path

use {
    crate::{dbnet::Terminator, engine::EngineHandle},
    std::time::Instant,
    tokio::{
        sync::mpsc,
        time::{self, Duration},
    },
};

/// The sweeper calls [`crate::engine::Engine::sweep`] every
/// `sweep-every-ms` milliseconds until the termination signal lands
pub async fn sweeper(
    handle: EngineHandle,
    mut terminator: Terminator,
    _term_sig_tx: mpsc::Sender<()>,
) {
    loop {
        // re-read the cadence every tick so CONFIG SET applies live
        let every = Duration::from_millis(handle.lock().cfg.sweep_every_ms);
        tokio::select! {
            _ = time::sleep(every) => {
                handle.lock().sweep(Instant::now());
            }
            _ = terminator.receive_signal() => break,
        }
    }
    log::info!("Sweeper service has exited");
}
