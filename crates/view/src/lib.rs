pub mod controller;
pub mod engine;
pub mod navigation;
pub mod options;

pub use controller::*;
pub use engine::*;
pub use navigation::*;
pub use options::*;
