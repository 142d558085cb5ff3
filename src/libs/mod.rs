pub mod archive;
pub mod binaries;
pub mod ini_files;
pub mod prereq;
pub mod properties;
pub mod reconciler;
