pub mod columns;
pub mod features;
pub mod fetcher;
pub mod protocol;

pub use columns::*;
pub use features::*;
pub use fetcher::*;
pub use protocol::*;
