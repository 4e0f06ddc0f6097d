pub mod console;
pub mod context;
pub mod list;
pub mod prepare;
pub mod process;
