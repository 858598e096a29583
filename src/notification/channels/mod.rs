//! sink 实现

pub mod callback;
pub mod json_lines;
pub mod memory;

pub use callback::CallbackSink;
pub use json_lines::JsonLinesSink;
pub use memory::MemorySink;
