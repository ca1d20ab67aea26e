//! Menu dialog virtual machine.
//!
//! Runs bytecode-driven menu sessions of the kind used over USSD and IVR
//! channels, rendering each step within a fixed output budget.

pub mod engine;
pub mod storage;
pub mod types;
pub mod utils;
pub mod virtual_machine;
