use std::sync::Arc;

use tracing::debug;

use crate::engine::generator::MoveGenerator;
use crate::models::move_record::MoveInput;
use crate::services::errors::bot_service_errors::BotServiceError;

/// Wraps the external move generator. Failures are surfaced to the caller,
/// which leaves the match untouched — the bot simply misses its turn and the
/// match resolves through the human's play or the bot's own clock.
#[derive(Clone)]
pub struct BotService {
    generator: Option<Arc<dyn MoveGenerator>>,
}

impl BotService {
    pub fn new(generator: Option<Arc<dyn MoveGenerator>>) -> Self {
        BotService { generator }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn request_move(&self, position: &str) -> Result<MoveInput, BotServiceError> {
        let generator = self.generator.as_ref().ok_or(BotServiceError::Disabled)?;
        let mv = generator.best_move(position).await?;
        debug!("generator picked {}-{}", mv.from, mv.to);
        Ok(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generator::GeneratorError;
    use async_trait::async_trait;

    struct FixedGenerator;

    #[async_trait]
    impl MoveGenerator for FixedGenerator {
        async fn best_move(&self, _position: &str) -> Result<MoveInput, GeneratorError> {
            Ok(MoveInput::new("e7", "e5"))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl MoveGenerator for FailingGenerator {
        async fn best_move(&self, _position: &str) -> Result<MoveInput, GeneratorError> {
            Err(GeneratorError::Timeout)
        }
    }

    #[tokio::test]
    async fn returns_generator_move() {
        let service = BotService::new(Some(Arc::new(FixedGenerator)));
        let mv = service.request_move("fen").await.unwrap();
        assert_eq!(mv.from, "e7");
    }

    #[tokio::test]
    async fn disabled_service_reports_it() {
        let service = BotService::new(None);
        assert!(matches!(
            service.request_move("fen").await,
            Err(BotServiceError::Disabled)
        ));
    }

    #[tokio::test]
    async fn generator_failures_pass_through() {
        let service = BotService::new(Some(Arc::new(FailingGenerator)));
        assert!(matches!(
            service.request_move("fen").await,
            Err(BotServiceError::Generator(GeneratorError::Timeout))
        ));
    }
}
