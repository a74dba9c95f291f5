pub mod layout;
pub mod error;
pub mod detect;
pub mod plan;
pub mod edit;
pub mod rewrite;
pub mod convert;

pub use layout::{Header, Footer, FileType};
pub use error::{FormatError, GiaError};
pub use detect::{AssetMode, Detection, detect};
pub use plan::{Plan, Edit, plan};
pub use edit::{EditBuffer, MappedFile, apply_in_place};
pub use rewrite::rewrite;
pub use convert::{convert, inspect, query, ConvertOptions, Destination, InPlaceStrategy, Outcome};
