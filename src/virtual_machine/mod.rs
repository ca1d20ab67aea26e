//! Bytecode virtual machine for size-constrained menu dialogs.
//!
//! A session walks a tree of nodes. Each node has bytecode that loads
//! content, builds a menu and declares which client inputs lead where; the
//! VM runs that code one turn at a time and renders the current node as a
//! page that fits the channel's byte budget.
//!
//! # Architecture
//!
//! - **Execution path**: a stack of node symbols plus a page index
//! - **Flags**: a bit vector; the first 8 bits are reserved for the runner
//! - **Cache**: one frame of loaded content per node on the path
//! - **Rendering**: template, mapped values and menu, paginated over one
//!   sink when the page would not fit
//!
//! # Modules
//!
//! - [`cache`]: Frame-scoped content cache with size accounting
//! - [`errors`]: Decode and execution error types
//! - [`flags`]: Reserved flag indices and the flag bit vector
//! - [`input`]: Client input and navigation target validation
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Operand wire encoding
//! - [`program`]: Decoding, disassembly and the bytecode builder
//! - [`render`]: Templates, menus and pagination
//! - [`resource`]: Content provider trait and in-memory implementation
//! - [`state`]: Navigation state
//! - [`vm`]: The runner

pub mod cache;
pub mod errors;
pub mod flags;
pub mod input;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod render;
pub mod resource;
pub mod state;
pub mod vm;
