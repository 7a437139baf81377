pub mod cancel;
pub mod compression;
pub mod fs_atomic;
pub mod paths;
pub mod shell;
pub mod user_paths;
