#[macro_use]
pub mod macros;
pub mod gen;
pub mod util;
