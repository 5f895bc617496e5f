// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The command gateway.
//!
//! [`CommandGateway::execute`] is the single entry point. It never returns
//! an error: every failure is logged with the command name and converted
//! to a [`ResultCode`].
//!
//! Read and Write answer a transient failure with one health check; if the
//! session recovers the operation is retried once, otherwise the command
//! returns `DISCONNECTED`.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tagbridge_config::ConfigLoader;
use tagbridge_core::{BridgeResult, OperationError, ResultCode};
use tagbridge_da::{ConnectionManager, DaTransport, ManagerOptions};

use crate::command::{Command, CommandParam, Property, VariableSlot};
use crate::sessions::{SessionHandle, SessionRegistry};

// =============================================================================
// TransportFactory
// =============================================================================

/// Creates one transport per session.
pub trait TransportFactory: Send + Sync + 'static {
    /// Transport type produced.
    type Transport: DaTransport;

    /// Creates a transport for a new session.
    fn create(&self) -> BridgeResult<Arc<Self::Transport>>;
}

impl<T, F> TransportFactory for F
where
    T: DaTransport,
    F: Fn() -> Arc<T> + Send + Sync + 'static,
{
    type Transport = T;

    fn create(&self) -> BridgeResult<Arc<T>> {
        Ok(self())
    }
}

/// Session type managed by a gateway built on `F`.
pub type Session<F> = ConnectionManager<<F as TransportFactory>::Transport>;

// =============================================================================
// CommandGateway
// =============================================================================

/// String-keyed command dispatcher over a table of sessions.
pub struct CommandGateway<F: TransportFactory> {
    factory: F,
    options: ManagerOptions,
    loader: ConfigLoader,
    sessions: SessionRegistry<Session<F>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl<F: TransportFactory> CommandGateway<F> {
    /// Creates a gateway with default supervision timing.
    pub fn new(factory: F) -> Self {
        Self::with_options(factory, ManagerOptions::default())
    }

    /// Creates a gateway whose sessions use `options`.
    pub fn with_options(factory: F, options: ManagerOptions) -> Self {
        Self {
            factory,
            options,
            loader: ConfigLoader::new().with_env_overrides(false),
            sessions: SessionRegistry::new(),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the device document loader.
    ///
    /// The default loader ignores environment overrides: every session
    /// connects to the host and server named in its own document.
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Returns the session named by `handle`.
    pub fn session(&self, handle: SessionHandle) -> Option<Arc<Session<F>>> {
        self.sessions.get(handle)
    }

    /// Returns the number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Runs one command.
    pub async fn execute(
        &self,
        command: &str,
        session: &mut Option<SessionHandle>,
        param: CommandParam<'_>,
    ) -> ResultCode {
        let cmd: Command = match command.parse() {
            Ok(cmd) => cmd,
            Err(e) => {
                e.log("execute");
                return e.result_code();
            }
        };

        tracing::trace!(command = %cmd, param = param.kind(), "Executing command");

        match self.dispatch(cmd, session, param).await {
            Ok(code) => code,
            Err(e) => {
                let handle = session.map(|h| h.to_string()).unwrap_or_default();
                tracing::warn!(command = %cmd, session = %handle, error = %e, "Command failed");
                e.log(cmd.as_str());
                e.result_code()
            }
        }
    }

    /// Closes every live session.
    pub async fn close_all(&self) {
        let _guard = self.lifecycle.lock().await;
        for session in self.sessions.drain() {
            if let Err(e) = session.close().await {
                e.log("close_all");
            }
        }
    }

    async fn dispatch(
        &self,
        cmd: Command,
        session: &mut Option<SessionHandle>,
        param: CommandParam<'_>,
    ) -> BridgeResult<ResultCode> {
        match cmd {
            Command::InitDriver => {
                let CommandParam::Properties(props) = param else {
                    return Err(invalid_param(cmd, "property list"));
                };
                *session = Some(self.init(props).await?);
                Ok(ResultCode::Ok)
            }
            Command::CloseDriver => {
                self.close(session).await?;
                Ok(ResultCode::Ok)
            }
            Command::Read => {
                let manager = self.resolve(session)?;
                let CommandParam::Variables(slots) = param else {
                    return Err(invalid_param(cmd, "variable list"));
                };
                if slots.is_empty() {
                    return Err(invalid_param(cmd, "non-empty variable list"));
                }
                read_slots(&*manager, slots).await?;
                Ok(ResultCode::Ok)
            }
            Command::Write => {
                let manager = self.resolve(session)?;
                let CommandParam::Variable(slot) = param else {
                    return Err(invalid_param(cmd, "single variable"));
                };
                write_slot(&*manager, slot).await?;
                Ok(ResultCode::Ok)
            }
            Command::SubscribeCallBack => {
                let manager = self.resolve(session)?;
                let CommandParam::Callback(handler) = param else {
                    return Err(invalid_param(cmd, "callback"));
                };
                manager.set_handler(handler);
                Ok(ResultCode::Ok)
            }
            Command::Subscribe | Command::EnableSubscribe => {
                let manager = self.resolve(session)?;
                manager.subscribe().await?;
                Ok(ResultCode::Ok)
            }
            Command::UnSubscribe => {
                let manager = self.resolve(session)?;
                manager.unsubscribe().await?;
                Ok(ResultCode::Ok)
            }
            Command::GetStatus => {
                let manager = self.resolve(session)?;
                if manager.check_status(true).await {
                    Ok(ResultCode::Ok)
                } else {
                    Ok(ResultCode::Disconnected)
                }
            }
        }
    }

    async fn init(&self, props: &[Property]) -> BridgeResult<SessionHandle> {
        let path = props
            .first()
            .map(|p| p.value.as_str())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| invalid_param(Command::InitDriver, "config path property"))?;

        let _guard = self.lifecycle.lock().await;

        let config = self.loader.load(Path::new(path))?;
        let transport = self.factory.create()?;
        let manager = Arc::new(ConnectionManager::new(transport, self.options.clone()));

        if let Err(e) = manager.connect(config).await {
            if let Err(close_err) = manager.close().await {
                close_err.log("init cleanup");
            }
            return Err(e);
        }

        let handle = self.sessions.insert(manager);
        tracing::info!(session = %handle, config = %path, "Session created");
        Ok(handle)
    }

    async fn close(&self, session: &mut Option<SessionHandle>) -> BridgeResult<()> {
        let handle = session.ok_or_else(no_session)?;

        let _guard = self.lifecycle.lock().await;
        let manager = self
            .sessions
            .remove(handle)
            .ok_or_else(|| invalid_session(handle))?;

        *session = None;
        if let Err(e) = manager.close().await {
            e.log("close");
        }
        tracing::info!(session = %handle, "Session closed");
        Ok(())
    }

    fn resolve(&self, session: &Option<SessionHandle>) -> BridgeResult<Arc<Session<F>>> {
        let handle = session.ok_or_else(no_session)?;
        self.sessions
            .get(handle)
            .ok_or_else(|| invalid_session(handle))
    }
}

impl<F: TransportFactory> std::fmt::Debug for CommandGateway<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("sessions", &self.sessions)
            .field("options", &self.options)
            .finish()
    }
}

// =============================================================================
// Read / Write
// =============================================================================

/// Fills each slot in order. The first failing slot ends the command.
async fn read_slots<T: DaTransport>(
    manager: &ConnectionManager<T>,
    slots: &mut [VariableSlot],
) -> BridgeResult<()> {
    for slot in slots.iter_mut() {
        let id = slot.tag_id()?;
        let source = slot.source();

        let value = retry_once(manager, || manager.read(id, source))
            .await
            .map_err(|e| {
                tracing::debug!(tag_id = %id, error = %e, "Read failed");
                e
            })?;
        slot.fill(id, value)?;
    }
    Ok(())
}

async fn write_slot<T: DaTransport>(
    manager: &ConnectionManager<T>,
    slot: &VariableSlot,
) -> BridgeResult<()> {
    let id = slot.tag_id()?;
    retry_once(manager, || manager.write(id, &slot.data))
        .await
        .map_err(|e| {
            tracing::debug!(tag_id = %id, error = %e, "Write failed");
            e
        })
}

/// Runs `op`; after a transient failure runs it once more if the session
/// can be recovered.
async fn retry_once<T, R, Fut, Op>(manager: &ConnectionManager<T>, mut op: Op) -> BridgeResult<R>
where
    T: DaTransport,
    Op: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<R>>,
{
    match op().await {
        Err(e) if e.is_transient() => {
            tracing::debug!(error = %e, "Transient failure, checking session");
            if manager.check_status(true).await {
                op().await
            } else {
                Err(e)
            }
        }
        other => other,
    }
}

fn invalid_param(cmd: Command, expected: &'static str) -> tagbridge_core::BridgeError {
    OperationError::InvalidParameter {
        command: cmd.as_str(),
        expected,
    }
    .into()
}

fn no_session() -> tagbridge_core::BridgeError {
    OperationError::InvalidSession {
        handle: "none".to_string(),
    }
    .into()
}

fn invalid_session(handle: SessionHandle) -> tagbridge_core::BridgeError {
    OperationError::InvalidSession {
        handle: handle.to_string(),
    }
    .into()
}

// =============================================================================
// Tests
// =============================================================================
