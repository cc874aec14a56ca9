//! Operator macros: a line-oriented file of device-control rows plus a loop
//! count, and the validation that turns raw rows into a typed [`BatchJob`].
//!
//! ```text
//! A,12,UP,3
//! B,,STOP,0
//! LoopCount=2
//! ```
//!
//! Validation is all-or-nothing: every violation in the file is reported and
//! nothing is produced unless the whole file is clean.

pub mod config;
pub mod error;
pub mod file;
pub mod validator;

pub use config::{MacroConfig, ValidationOptions};
pub use error::{Column, MacroError, Result, ValidationError, ValidationErrors};
pub use file::{MacroFile, MacroRow};
pub use validator::{validate, BatchJob, BatchRow};
