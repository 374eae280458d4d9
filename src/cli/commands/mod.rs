//! CLI command implementations

pub mod add;
pub mod install;
pub mod remove;
pub mod tree;
pub mod update;

pub use add::execute as add;
pub use install::execute as install;
pub use remove::execute as remove;
pub use tree::execute as tree;
pub use update::execute as update;
