pub mod instrument;
pub mod quote;

pub use instrument::*;
pub use quote::*;
