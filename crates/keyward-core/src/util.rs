//! Common utility functions.

pub mod data;
pub mod fs;
pub mod process;

// Re-export commonly used items
pub use data::{deep_merge, load_yaml, load_yaml_file, save_yaml_file};
pub use fs::{copy_owner_write_file, expand_path, make_owner_access_only, make_owner_only_write_access};
pub use process::{redact_secrets, run, run_with_password};
