pub mod engine;
pub mod supervise;

pub type CommandError = Box<dyn std::error::Error + Send + Sync>;
