//! Settlement domain model
pub mod aggregates;
pub mod events;
pub mod status;
pub mod value_objects;
