// Core trading domain entities and value objects
pub mod signal;
pub mod symbol_state;
pub mod types;
