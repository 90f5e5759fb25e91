pub mod backend;
pub mod clipboard;
pub mod config;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub mod test_support;
