pub mod browser;
pub mod config;
pub mod directory;
pub mod entry;
pub mod error;
pub mod history;
pub mod listing;
pub mod localization;
pub mod path_fields;
pub mod pattern;
pub mod probe;
pub mod selection;
pub mod sorting;

#[cfg(test)]
mod test_utils;
