use crate::engine::generator::GeneratorError;

#[derive(Debug)]
pub enum BotServiceError {
    /// No move generator is configured; bot matches degrade to the bot
    /// never moving.
    Disabled,
    Generator(GeneratorError),
}

impl std::fmt::Display for BotServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotServiceError::Disabled => write!(f, "Move generator is not configured"),
            BotServiceError::Generator(err) => write!(f, "Move generator error: {}", err),
        }
    }
}

impl std::error::Error for BotServiceError {}

impl From<GeneratorError> for BotServiceError {
    fn from(err: GeneratorError) -> Self {
        BotServiceError::Generator(err)
    }
}
