pub mod args;
pub mod migrate;
pub mod name;
