// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Wires a [`ConnectionManager`] or a [`CommandGateway`] to a shared
//! [`MockTransport`], so tests can drive the public surface and inspect
//! what reached the server.

use std::sync::Arc;

use tagbridge_config::{ConfigLoader, DeviceConfig};
use tagbridge_core::{BridgeResult, ResultCode};
use tagbridge_da::{ConnectionManager, ManagerOptions, MockTransport};
use tagbridge_gateway::{
    CommandGateway, CommandParam, Property, Session, SessionHandle, TransportFactory,
    VariableSlot,
};
use tempfile::NamedTempFile;

use super::fixtures::{parse_document, write_document, DocumentFixtures, TransportFixtures};

/// Default capacity of read slots created by the harness.
pub const SLOT_CAPACITY: usize = 16;

// =============================================================================
// SharedTransport
// =============================================================================

/// Factory handing every session the same mock.
#[derive(Debug, Clone)]
pub struct SharedTransport(pub Arc<MockTransport>);

impl TransportFactory for SharedTransport {
    type Transport = MockTransport;

    fn create(&self) -> BridgeResult<Arc<MockTransport>> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// ManagerHarness
// =============================================================================

/// A connection manager over a mock transport.
pub struct ManagerHarness {
    /// The mock behind the manager.
    pub transport: Arc<MockTransport>,
    /// The manager under test.
    pub manager: ConnectionManager<MockTransport>,
}

impl ManagerHarness {
    /// Creates a stopped manager with zero delays.
    pub fn new(transport: MockTransport) -> Self {
        Self::with_options(transport, ManagerOptions::immediate())
    }

    /// Creates a stopped manager with explicit options.
    pub fn with_options(transport: MockTransport, options: ManagerOptions) -> Self {
        let transport = Arc::new(transport);
        let manager = ConnectionManager::new(transport.clone(), options);
        Self { transport, manager }
    }

    /// Creates a manager connected to the plant fixture.
    pub async fn connected() -> Self {
        let harness = Self::new(TransportFixtures::plant());
        harness
            .manager
            .connect(Self::plant_config())
            .await
            .expect("Plant fixture must connect");
        harness
    }

    /// The plant document, parsed.
    pub fn plant_config() -> DeviceConfig {
        parse_document(DocumentFixtures::plant())
    }
}

// =============================================================================
// GatewayHarness
// =============================================================================

/// A command gateway with one caller-side session slot.
pub struct GatewayHarness {
    /// The mock behind every session.
    pub transport: Arc<MockTransport>,
    /// The gateway under test.
    pub gateway: CommandGateway<SharedTransport>,
    /// The caller's session slot.
    pub session: Option<SessionHandle>,
    document: NamedTempFile,
}

impl GatewayHarness {
    /// Plant transport and plant document.
    pub fn new() -> Self {
        Self::with(TransportFixtures::plant(), DocumentFixtures::plant())
    }

    /// Custom transport and document.
    pub fn with(transport: MockTransport, document: &str) -> Self {
        let transport = Arc::new(transport);
        let gateway = CommandGateway::with_options(
            SharedTransport(transport.clone()),
            ManagerOptions::immediate(),
        )
        .with_loader(ConfigLoader::new().with_env_overrides(false));

        Self {
            transport,
            gateway,
            session: None,
            document: write_document(document),
        }
    }

    /// Path of the document passed to `InitDriver`.
    pub fn document_path(&self) -> String {
        self.document.path().to_string_lossy().into_owned()
    }

    /// Runs `InitDriver` with the harness document.
    pub async fn init(&mut self) -> ResultCode {
        let props = [Property::new("config", self.document_path())];
        self.execute("InitDriver", CommandParam::Properties(&props))
            .await
    }

    /// Runs any command against the harness session.
    pub async fn execute(&mut self, command: &str, param: CommandParam<'_>) -> ResultCode {
        self.gateway.execute(command, &mut self.session, param).await
    }

    /// Reads `ids` into fresh slots.
    pub async fn read(&mut self, ids: &[&str]) -> (ResultCode, Vec<VariableSlot>) {
        let mut slots: Vec<VariableSlot> = ids
            .iter()
            .map(|id| VariableSlot::new(*id, SLOT_CAPACITY))
            .collect();
        let code = self
            .execute("Read", CommandParam::Variables(&mut slots))
            .await;
        (code, slots)
    }

    /// Writes `bytes` to `id`.
    pub async fn write(&mut self, id: &str, bytes: &[u8]) -> ResultCode {
        let slot = VariableSlot::with_data(id, bytes.to_vec());
        self.execute("Write", CommandParam::Variable(&slot)).await
    }

    /// The manager behind the harness session.
    pub fn manager(&self) -> Option<Arc<Session<SharedTransport>>> {
        self.session.and_then(|handle| self.gateway.session(handle))
    }
}

impl Default for GatewayHarness {
    fn default() -> Self {
        Self::new()
    }
}
