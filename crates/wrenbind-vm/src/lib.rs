//! An embeddable interpreter for a Wren-style scripting language.
//!
//! The VM executes script modules, hosts `foreign` classes and methods whose
//! implementations come from the embedding application, and exposes the
//! slot/handle API hosts use to exchange values with scripts:
//!
//! ```text
//! host                         vm
//!  ├─ interpret(module, src) ─▶ parse ─▶ run module body
//!  ├─ ensure_slots / set_slot_* ─▶ slots[0..n]
//!  ├─ call(handle) ──────────▶ slots[0].method(slots[1..])
//!  └─ foreign methods ◀────── script calls `foreign` member
//! ```
//!
//! Execution is single threaded. Foreign methods must not re-enter the VM;
//! attempts fail with [`VmError::Reentrant`].

pub mod ast;
mod builtins;
pub mod config;
pub mod error;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod signature;
pub mod token;
mod value;
mod vm;

pub use config::{ForeignMethodFn, VmConfig};
pub use error::{ErrorReport, SlotType, TraceFrame, VmError};
pub use parser::{parse_module, ParseError};
pub use vm::{Handle, Vm};
