pub mod mountinfo;
pub mod process;
pub mod shell;
