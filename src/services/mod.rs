pub mod console;
pub mod ladder;

pub use console::ConsoleService;
pub use ladder::Ladder;
