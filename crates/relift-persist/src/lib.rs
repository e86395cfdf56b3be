pub mod error;
pub mod ids;
pub mod lock;
pub mod reader;
pub mod tags;
pub mod util;
pub mod writer;

pub use error::PersistError;
pub use lock::{lock_file_read, lock_file_write, FileLock};
pub use reader::load;
pub use util::escape_xml;
pub use writer::{save, StreamSet};
