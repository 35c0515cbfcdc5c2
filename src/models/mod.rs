pub mod document;
pub mod enums;
pub mod summary;

pub use document::*;
pub use enums::*;
pub use summary::*;
