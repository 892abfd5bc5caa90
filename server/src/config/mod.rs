/*
 * Created on Tue Feb 14 2023
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

//! # Configuration
//!
//! Three layers, later ones winning: built-in defaults, an optional YAML
//! file (pointed at by `STRAT_CONFIG_FILE`), and `STRAT_*` environment
//! variables. Process arguments are deliberately not parsed here; process
//! supervision owns them

mod cfgfile;

use {
    self::cfgfile::ConfigFile,
    crate::{
        dbnet::MAXIMUM_CONNECTION_LIMIT,
        util::error::{Error, StratResult},
    },
    std::{
        env,
        fs,
        net::{IpAddr, Ipv4Addr},
    },
};

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
// sweeper defaults
const DEFAULT_SWEEP_EVERY_MS: u64 = 100;

/// The resolved configuration the server runs with. A copy lives inside the
/// engine so `CONFIG GET/SET` can read and (for the mutable subset) update
/// it at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSet {
    pub host: IpAddr,
    pub port: u16,
    pub maxcon: usize,
    /// the single optional shared secret
    pub requirepass: Option<String>,
    /// follow this leader if set
    pub replicaof: Option<(String, u16)>,
    pub sweep_every_ms: u64,
    pub noart: bool,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        Self {
            host: DEFAULT_IPV4,
            port: libstrat::DEFAULT_PORT,
            maxcon: MAXIMUM_CONNECTION_LIMIT,
            requirepass: None,
            replicaof: None,
            sweep_every_ms: DEFAULT_SWEEP_EVERY_MS,
            noart: false,
        }
    }
}

/// Parse a `host:port` leader address
pub fn parse_replicaof(raw: &str) -> StratResult<(String, u16)> {
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::Config(format!("bad replicaof port in {raw:?}")))?;
            Ok((host.to_owned(), port))
        }
        _ => Err(Error::Config(format!(
            "replicaof must look like host:port, got {raw:?}"
        ))),
    }
}

fn apply_file(cfg: &mut ConfigurationSet, file: ConfigFile) -> StratResult<()> {
    if let Some(server) = file.server {
        if let Some(host) = server.host {
            cfg.host = host;
        }
        if let Some(port) = server.port {
            cfg.port = port;
        }
        if let Some(maxclients) = server.maxclients {
            cfg.maxcon = maxclients;
        }
        if let Some(noart) = server.noart {
            cfg.noart = noart;
        }
        if let Some(every) = server.sweep_every_ms {
            if every == 0 {
                return Err(Error::Config("sweep_every_ms must be positive".to_owned()));
            }
            cfg.sweep_every_ms = every;
        }
    }
    if let Some(auth) = file.auth {
        if let Some(requirepass) = auth.requirepass {
            cfg.requirepass = if requirepass.is_empty() {
                None
            } else {
                Some(requirepass)
            };
        }
    }
    if let Some(replication) = file.replication {
        if let Some(replicaof) = replication.replicaof {
            cfg.replicaof = Some(parse_replicaof(&replicaof)?);
        }
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn apply_env(cfg: &mut ConfigurationSet) -> StratResult<()> {
    if let Some(host) = env_var("STRAT_HOST") {
        cfg.host = host
            .parse()
            .map_err(|_| Error::Config(format!("bad STRAT_HOST {host:?}")))?;
    }
    if let Some(port) = env_var("STRAT_PORT") {
        cfg.port = port
            .parse()
            .map_err(|_| Error::Config(format!("bad STRAT_PORT {port:?}")))?;
    }
    if let Some(maxcon) = env_var("STRAT_MAXCON") {
        cfg.maxcon = maxcon
            .parse()
            .map_err(|_| Error::Config(format!("bad STRAT_MAXCON {maxcon:?}")))?;
    }
    if let Some(requirepass) = env_var("STRAT_REQUIREPASS") {
        cfg.requirepass = Some(requirepass);
    }
    if let Some(replicaof) = env_var("STRAT_REPLICAOF") {
        cfg.replicaof = Some(parse_replicaof(&replicaof)?);
    }
    if let Some(every) = env_var("STRAT_SWEEP_EVERY_MS") {
        let every: u64 = every
            .parse()
            .map_err(|_| Error::Config(format!("bad STRAT_SWEEP_EVERY_MS {every:?}")))?;
        if every == 0 {
            return Err(Error::Config("STRAT_SWEEP_EVERY_MS must be positive".to_owned()));
        }
        cfg.sweep_every_ms = every;
    }
    if env_var("STRAT_NOART").is_some() {
        cfg.noart = true;
    }
    Ok(())
}

/// Resolve the full configuration: defaults, then the optional file, then
/// the environment
pub fn parse() -> StratResult<ConfigurationSet> {
    let mut cfg = ConfigurationSet::default();
    if let Some(path) = env_var("STRAT_CONFIG_FILE") {
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::ioerror_extra(e, format!("reading config file {path:?}")))?;
        let file: ConfigFile = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("bad config file {path:?}: {e}")))?;
        apply_file(&mut cfg, file)?;
        log::info!("Configuration loaded from {path}");
    }
    apply_env(&mut cfg)?;
    if let Some((host, port)) = cfg.replicaof.as_ref() {
        log::info!("Configured as a replica of {host}:{port}");
    }
    Ok(cfg)
}
