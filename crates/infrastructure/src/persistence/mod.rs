//! Session persistence on the local file system.

mod file_system;
mod session_file;

pub use file_system::{FileSystem, FileSystemError, TokioFileSystem};
pub use session_file::{FileSessionStorage, SESSION_FILE_NAME, default_data_dir};
