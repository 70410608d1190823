//! Standalone storage
//!
//! A single-node `Storage`: every byte lives in the local engine, nothing
//! is replicated.

use parking_lot::RwLock;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::{Context, Modify, StandaloneReader, Storage};

enum State {
    Uninitialized,
    Running(Engine),
    Stopped,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Uninitialized => "uninitialized",
            State::Running(_) => "running",
            State::Stopped => "stopped",
        }
    }
}

/// `Storage` backed by one local engine
///
/// Construct once at startup and share it (e.g. behind an `Arc`) with every
/// request handler.
pub struct StandaloneStorage {
    config: Config,
    /// `write` holds the read side for the whole commit, so `stop` waits
    /// for in-flight batches
    state: RwLock<State>,
}

impl StandaloneStorage {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: RwLock::new(State::Uninitialized),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.read(), State::Running(_))
    }

    /// Transactions (readers and in-flight writes) not yet released
    pub fn open_readers(&self) -> usize {
        match &*self.state.read() {
            State::Running(engine) => engine.open_transactions(),
            _ => 0,
        }
    }

    /// Run `f` against the engine if running
    fn with_engine<T>(&self, op: &str, f: impl FnOnce(&Engine) -> Result<T>) -> Result<T> {
        match &*self.state.read() {
            State::Running(engine) => f(engine),
            other => Err(KvError::Lifecycle(format!(
                "{} called while storage is {}",
                op,
                other.name()
            ))),
        }
    }
}

impl Storage for StandaloneStorage {
    type Reader = StandaloneReader;

    fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        if !matches!(*state, State::Uninitialized) {
            return Err(KvError::Lifecycle(format!(
                "start called while storage is {}",
                state.name()
            )));
        }

        let engine = Engine::open(self.config.clone()).map_err(|e| {
            tracing::error!(
                data_dir = %self.config.data_dir.display(),
                "failed to open storage engine: {}",
                e
            );
            e
        })?;

        *state = State::Running(engine);
        tracing::info!(data_dir = %self.config.data_dir.display(), "storage started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state.write();
        let engine = match std::mem::replace(&mut *state, State::Stopped) {
            State::Running(engine) => engine,
            other => {
                let name = other.name();
                *state = other;
                return Err(KvError::Lifecycle(format!(
                    "stop called while storage is {}",
                    name
                )));
            }
        };

        engine.close().map_err(|e| {
            tracing::error!("failed to close storage engine: {}", e);
            e
        })?;

        tracing::info!("storage stopped");
        Ok(())
    }

    fn reader(&self, _ctx: &Context) -> Result<StandaloneReader> {
        self.with_engine("reader", |engine| {
            engine.begin_transaction(true).map(StandaloneReader::new)
        })
    }

    fn write(&self, _ctx: &Context, batch: Vec<Modify>) -> Result<()> {
        self.with_engine("write", |engine| {
            let entries = batch.len();
            engine.update(|txn| {
                for modify in batch {
                    let physical = modify.physical_key();
                    match modify {
                        Modify::Put { value, .. } => txn.set(physical, value)?,
                        Modify::Delete { .. } => txn.delete(physical)?,
                    }
                }
                Ok(())
            })?;
            tracing::trace!(entries, "batch written");
            Ok(())
        })
    }
}
