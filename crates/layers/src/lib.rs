pub mod expression;
pub mod headless;
pub mod layer;
pub mod lod;
pub mod manager;
pub mod surface;
pub mod symbology;

pub use expression::*;
pub use headless::*;
pub use layer::*;
pub use lod::*;
pub use manager::*;
pub use surface::*;
pub use symbology::*;
