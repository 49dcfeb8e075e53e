/// Embers template compiler
///
/// Compiles text templates with embedded `<% %>` scriptlets into reusable
/// [`Template`] units. Includes are inlined at compile time; runtime failures
/// are mapped back to template lines when compiled with debug on.

pub mod codegen;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod include;
pub mod loader;
pub mod options;
pub mod template;

pub use codegen::{CodeGenerator, Generated, LineEntry, LineTable};
pub use driver::{compile, compile_async, compile_with, render, render_async, render_file, render_file_async, Compiler};
pub use error::{CompileError, RenderError, Result, RuntimeError};
pub use include::{IncludeResolver, Resolved};
pub use loader::{AsyncContentLoader, ContentLoader, FsLoader, LoadError, MemoryLoader};
pub use options::{CompileOptions, TargetMode};
pub use template::Template;

pub use embers_eval::{escape_html, Escaper, FilterRegistry, Value};
