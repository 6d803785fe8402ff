//! Bearer tokens, the shared auth context, and the token refresher.

pub mod context;
pub mod refresh;
pub mod token;

pub use context::*;
pub use refresh::*;
pub use token::{secret::*, *};
