pub mod bindings;
pub mod interaction;
pub mod tooltip;

pub use bindings::*;
pub use interaction::*;
pub use tooltip::*;
