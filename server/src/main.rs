/*
 * Created on Mon Feb 06 2023
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

//! # Stratus
//!
//! The `stratd` crate is the Stratus database server: a RESP-speaking
//! in-memory data engine with typed containers, blocking reads, optimistic
//! transactions, pub/sub and leader/follower replication. See the module
//! docs for the details of each subsystem

#![deny(unused_must_use)]

use {
    crate::{
        config::ConfigurationSet,
        dbnet::{BaseListener, Listener, Terminator},
        engine::EngineHandle,
        util::error::StratResult,
    },
    env_logger::Builder,
    std::{env, sync::Arc},
    tokio::{
        signal,
        sync::{broadcast, Semaphore},
    },
};

mod actions;
mod blocking;
mod config;
mod corestore;
mod dbnet;
mod engine;
mod protocol;
mod pubsub;
mod queryengine;
mod registry;
mod replication;
mod resp;
mod services;
mod txn;
mod util;
#[cfg(test)]
mod tests;

pub type IoResult<T> = std::io::Result<T>;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

/// The terminal art for `!noart` configurations
static TEXT: &str = "\n███████ ████████ ██████   █████  ████████ ██    ██ ███████ \n██         ██    ██   ██ ██   ██    ██    ██    ██ ██      \n███████    ██    ██████  ███████    ██    ██    ██ ███████ \n     ██    ██    ██   ██ ██   ██    ██    ██    ██      ██ \n███████    ██    ██   ██ ██   ██    ██     ██████  ███████ \n";

fn main() {
    Builder::new()
        .parse_filters(&env::var("STRAT_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap();
    let exit = runtime.block_on(async {
        match run_server().await {
            Ok(()) => 0,
            Err(e) => {
                log::error!("Server failed to run: {e}");
                1
            }
        }
    });
    drop(runtime);
    log::info!("Goodbye :)");
    std::process::exit(exit);
}

async fn run_server() -> StratResult<()> {
    let cfg: ConfigurationSet = config::parse()?;
    if !cfg.noart {
        println!("{TEXT}");
    }
    log::info!("Stratus v{} | {}", libstrat::VERSION, libstrat::URL);
    let db = EngineHandle::new(cfg.clone());
    // replay whatever the bootstrap-load hook supplies
    db.lock().bootstrap_load();
    let (signal_tx, _) = broadcast::channel::<()>(1);
    let climit = Arc::new(Semaphore::new(cfg.maxcon));
    let base = BaseListener::init(&db, cfg.host, cfg.port, climit, signal_tx.clone()).await?;
    // the background services share the listener's termination plumbing
    tokio::spawn(services::sweeper(
        db.clone(),
        Terminator::new(signal_tx.subscribe()),
        base.terminate_tx.clone(),
    ));
    if let Some((host, port)) = cfg.replicaof.clone() {
        tokio::spawn(replication::follower::run_follower(
            db.clone(),
            host,
            port,
            cfg.port,
            Terminator::new(signal_tx.subscribe()),
            base.terminate_tx.clone(),
        ));
    }
    let mut listener = Listener::new(base);
    log::info!("Server started on stratus://{}:{}", cfg.host, cfg.port);
    tokio::select! {
        ret = listener.run() => {
            if let Err(e) = ret {
                log::error!("Listener failed with: {e}");
            }
        }
        _ = signal::ctrl_c() => {
            log::info!("Signalling all workers to shut down");
        }
    }
    // dropping our sender plus the listener's copy (inside release_self)
    // trips every Terminator; release_self then waits for the workers
    drop(signal_tx);
    let Listener { base } = listener;
    base.release_self().await;
    log::info!(
        "Stopped accepting incoming connections; served {} connections and {} commands",
        db.stats().connections_accepted(),
        db.stats().commands_processed()
    );
    Ok(())
}
