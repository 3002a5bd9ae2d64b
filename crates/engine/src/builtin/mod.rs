// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in reference want types.
//!
//! These exercise every driver feature (emission, fan-in, service delays,
//! completion on drained inputs, quorum, recipe expansion) and back the
//! workspace spec suite. Domain-specific types register alongside them.

mod coordinator;
mod generator;
mod owner;
mod passthrough;
mod queue;
mod sink;

pub use coordinator::Coordinator;
pub use generator::Generator;
pub use owner::Owner;
pub use passthrough::Passthrough;
pub use queue::Queue;
pub use sink::Sink;

use crate::exec::WantRole;
use crate::registry::WantTypeRegistry;
use std::sync::Arc;

/// Register every built-in type.
pub fn register_all(registry: &WantTypeRegistry) {
    registry.register(
        generator::definition(),
        WantRole::Generator,
        Arc::new(|_| Box::new(Generator::default())),
    );
    registry.register(
        queue::definition(),
        WantRole::Processor,
        Arc::new(|_| Box::new(Queue::default())),
    );
    registry.register(
        sink::definition(),
        WantRole::Sink,
        Arc::new(|_| Box::new(Sink::default())),
    );
    registry.register(
        passthrough::definition(),
        WantRole::Independent,
        Arc::new(|_| Box::new(Passthrough::default())),
    );
    registry.register(
        coordinator::definition(),
        WantRole::Coordinator,
        Arc::new(|_| Box::new(Coordinator::default())),
    );
    registry.register(
        owner::definition(),
        WantRole::Independent,
        Arc::new(|_| Box::new(Owner::default())),
    );
}
