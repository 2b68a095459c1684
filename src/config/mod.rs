pub mod settings;

pub use settings::{AppConfig, GuardSettings, StatsSettings, StorageBackend, StorageSettings};
