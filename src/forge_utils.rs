pub mod common;
pub mod script;

pub use self::common::{ForgeRunner, Invocation, RunResult, ToolRunner};
pub use self::script::ForgeScript;
