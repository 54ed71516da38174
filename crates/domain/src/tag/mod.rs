mod change;
mod name;
mod tag_type;

pub use change::{TagChange, TagSnapshot};
pub use name::{FIELD_SEPARATOR, TagName};
pub use tag_type::{TagType, is_truthy};
