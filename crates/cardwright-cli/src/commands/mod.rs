//! Command implementations.

pub mod chunks;
pub mod generate;
pub mod probe;
pub mod show_config;

pub use self::chunks::execute_chunks;
pub use self::generate::execute_generate;
pub use self::probe::execute_probe;
pub use self::show_config::execute_config;
