//! Services for companion state management

pub mod evolution_engine;

pub use evolution_engine::*;
