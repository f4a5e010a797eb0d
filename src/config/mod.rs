pub mod settings;

pub use settings::BotSettings;
