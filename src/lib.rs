pub mod ast;
pub mod compiler;
pub mod error;
pub mod js_codegen;
pub mod lexer;
pub mod parser;
pub mod symbol_table;
pub mod type_checker;
pub mod types;

pub use compiler::{CompileOutput, Compiler, ContextTypes};
pub use error::CompileError;
pub use types::{PrimitiveType, Type};
