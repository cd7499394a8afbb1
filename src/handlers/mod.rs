pub mod config;
pub mod retempo;

pub use self::config::*;
pub use self::retempo::*;
