pub mod cli;
pub mod config;

pub use config::{Configuration, Stage, Strategy, Task};
