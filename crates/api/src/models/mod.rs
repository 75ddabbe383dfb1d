pub mod file;
pub mod issue;
pub mod util;

pub use file::*;
pub use issue::*;
