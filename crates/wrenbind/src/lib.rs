//! wrenbind - typed host bindings for the wrenbind scripting VM
//!
//! Host functions, objects and enums are declared once, compiled into script
//! glue plus a dispatch table, and called from scripts with arguments and
//! results converted through the VM's slots.
//!
//! # Example
//!
//! ```ignore
//! use wrenbind::{ClassDecl, ModuleDecl, Session};
//!
//! let mut session = Session::new();
//! session.declare(
//!     ModuleDecl::new("main")
//!         .class(ClassDecl::namespace("Math").proc("add", |a: i64, b: i64| a + b)),
//! )?;
//! session.arm()?;
//! session.run("main", "var sum = Math.add(1, 2)")?;
//! assert_eq!(session.get::<i64>("main", "sum")?, 3);
//! ```

pub mod compiler;
pub mod config;
pub mod decl;
pub mod dispatch;
pub mod error;
pub mod function;
pub mod handle;
pub mod host;
pub mod marshal;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod types;

pub use compiler::{ClassSummary, CompiledModule};
pub use config::{Config, SessionOptions};
pub use decl::{ClassDecl, EnumDecl, ModuleDecl};
pub use dispatch::DispatchTable;
pub use error::{BindError, LoadError, MarshalError, SessionError};
pub use function::{HostError, IntoForeignFn, IntoHostResult};
pub use handle::{ArgPack, CallHandle, WrenRef};
pub use host::{FieldDecl, HostEnum, HostType, Obj};
pub use marshal::{FromSlot, HostValue, Slots, Tagged, ToSlot};
pub use registry::{BindingKind, TypeBinding, TypeRegistry};
pub use resolver::{FsLoader, MemoryLoader, ModuleLoader, NoImports};
pub use session::{Session, SessionState};
pub use types::{HostTypeId, TypeTag};

pub use wrenbind_vm as vm;
