pub mod clocks;
pub mod errors;
pub mod params;
pub mod tool;

pub use clocks::*;
pub use errors::*;
pub use params::*;
pub use tool::*;
