pub mod rgb_map;
pub mod rgb_script;
pub mod script_catalog;
pub mod script_dirs;
pub mod script_fault;

pub mod cli;
