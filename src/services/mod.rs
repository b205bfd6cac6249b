pub mod commands;
pub mod evaluator;
pub mod quotes;
pub mod registry;
pub mod stocks;
pub mod watcher;
