pub use crate::core::config::*;
pub use crate::core::error::*;
pub use crate::core::expr::evaluate;
pub use crate::core::options::{OptionValue, Options};
pub use crate::core::symbols::{Nearest, SymbolTable};
pub use crate::core::Address;
