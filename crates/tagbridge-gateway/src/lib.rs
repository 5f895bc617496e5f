// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagbridge-gateway
//!
//! String-keyed command surface over tag sessions.
//!
//! A host program drives everything through [`CommandGateway::execute`]:
//! a command name, the caller's session handle slot, and a parameter whose
//! shape depends on the command. The result is always a [`ResultCode`].
//!
//! | Command             | Parameter                    | Effect                              |
//! |---------------------|------------------------------|-------------------------------------|
//! | `InitDriver`        | `Properties` (document path) | load, connect, store session handle |
//! | `Read`              | `Variables`                  | fill each slot in order             |
//! | `Write`             | `Variable`                   | decode bytes and write one tag      |
//! | `SubscribeCallBack` | `Callback`                   | register the change handler         |
//! | `Subscribe`         | none                         | enable change delivery              |
//! | `EnableSubscribe`   | none                         | same as `Subscribe`                 |
//! | `UnSubscribe`       | none                         | disable change delivery             |
//! | `GetStatus`         | none                         | health check with recovery          |
//! | `CloseDriver`       | none                         | tear down, release the handle       |
//!
//! # Example
//!
//! ```rust,ignore
//! use tagbridge_gateway::{CommandGateway, CommandParam, Property, VariableSlot};
//!
//! let gateway = CommandGateway::new(|| Arc::new(MyTransport::default()));
//! let mut session = None;
//!
//! let props = [Property::new("config", "device.json")];
//! gateway.execute("InitDriver", &mut session, CommandParam::Properties(&props)).await;
//!
//! let mut slots = vec![VariableSlot::new("1", 8)];
//! gateway.execute("Read", &mut session, CommandParam::Variables(&mut slots)).await;
//! ```
//!
//! [`ResultCode`]: tagbridge_core::ResultCode

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod command;
pub mod gateway;
pub mod sessions;

pub use command::{Command, CommandParam, Property, VariableSlot, SOURCE_ATTRIBUTE};
pub use gateway::{CommandGateway, Session, TransportFactory};
pub use sessions::{SessionHandle, SessionRegistry};

pub use tagbridge_core::ResultCode;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
