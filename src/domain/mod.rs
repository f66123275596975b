//! Order domain: status registry, workflow guard, and the backend's order read model
pub mod aggregates;
pub mod events;
pub mod value_objects;
pub mod workflow;
