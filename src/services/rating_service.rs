use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::models::match_session::{MatchSession, Outcome};
use crate::models::user::UserProfile;
use crate::repositories::user_repository::UserRepository;
use crate::services::errors::rating_service_errors::RatingServiceError;

pub const INITIAL_RATING: f64 = 1500.0;
pub const INITIAL_DEVIATION: f64 = 350.0;

const INACTIVITY_DEVIATION_STEP: f64 = 10.0;
const INACTIVITY_THRESHOLD_DAYS: i64 = 30;

/// Glicko-style rating engine: pure calculation plus persistence of the
/// updated values, applied exactly once per participant per completed match.
#[derive(Clone)]
pub struct RatingService {
    repository: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl RatingService {
    pub fn new(repository: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        RatingService { repository, clock }
    }

    fn q() -> f64 {
        10f64.ln() / 400.0
    }

    /// One-sided Glicko update for a player with rating `r1` and deviation
    /// `d1` against an opponent `r2`/`d2`, with score `s` in {0, 0.5, 1}.
    pub fn calculate_new_rating(r1: f64, d1: f64, r2: f64, d2: f64, s: f64) -> (f64, f64) {
        let q = Self::q();
        let g = 1.0 / (1.0 + 3.0 * q * q * d2 * d2 / (PI * PI)).sqrt();
        let e = 1.0 / (1.0 + (-g * (r1 - r2) * q).exp());
        let d_sq = 1.0 / (q * q * g * g * e * (1.0 - e));
        let new_rating = r1 + q / (1.0 / (d1 * d1) + 1.0 / d_sq) * g * (s - e);
        let new_deviation = (1.0 / (1.0 / (d1 * d1) + 1.0 / d_sq)).sqrt();
        (new_rating, new_deviation)
    }

    /// Creates a profile with the initial rating values if the user has none
    /// yet. Signup is handled elsewhere; this covers first contact.
    pub async fn ensure_profile(&self, user_id: &str) -> Result<(), RatingServiceError> {
        if self.repository.get_profile(user_id).await?.is_none() {
            let profile =
                UserProfile::new(user_id, INITIAL_RATING, INITIAL_DEVIATION, self.clock.now());
            self.repository.put_profile(&profile).await?;
            info!("created initial rating profile for {}", user_id);
        }
        Ok(())
    }

    /// Applies the outcome of a completed match to both participants. The two
    /// sides are updated independently: a failure on one side is recorded and
    /// does not block the other. Bot matches never reach this point.
    pub async fn handle_match_end(&self, session: &MatchSession) {
        if session.is_bot_match {
            return;
        }
        let (white, black) = match (session.white.user_id(), session.black.user_id()) {
            (Some(w), Some(b)) => (w, b),
            _ => {
                warn!("match {} has a bot seat, skipping rating", session.id);
                return;
            }
        };
        let score = match session.winner {
            Some(Outcome::White) => 1.0,
            Some(Outcome::Black) => 0.0,
            Some(Outcome::Draw) => 0.5,
            None => {
                warn!("match {} ended without a winner, skipping rating", session.id);
                return;
            }
        };

        if let Err(e) = self.update_player(white, black, score).await {
            error!("rating update failed for {}: {}", white, e);
        }
        if let Err(e) = self.update_player(black, white, 1.0 - score).await {
            error!("rating update failed for {}: {}", black, e);
        }
    }

    async fn update_player(
        &self,
        player_id: &str,
        opponent_id: &str,
        score: f64,
    ) -> Result<(), RatingServiceError> {
        let player = self
            .repository
            .get_profile(player_id)
            .await?
            .ok_or_else(|| RatingServiceError::UnknownUser(player_id.to_string()))?;
        let opponent = self
            .repository
            .get_profile(opponent_id)
            .await?
            .ok_or_else(|| RatingServiceError::UnknownUser(opponent_id.to_string()))?;

        let (new_rating, new_deviation) = Self::calculate_new_rating(
            player.rating,
            player.deviation,
            opponent.rating,
            opponent.deviation,
            score,
        );

        let updated = UserProfile::new(
            player_id,
            new_rating.round(),
            new_deviation.round().max(1.0),
            self.clock.now(),
        );
        self.repository.put_profile(&updated).await?;

        info!(
            "rating for {}: {} -> {} (deviation {} -> {})",
            player_id, player.rating, updated.rating, player.deviation, updated.deviation
        );
        Ok(())
    }

    /// Periodic inactivity pass: players idle for over a month grow less
    /// certain, bounded by the initial deviation.
    pub async fn raise_inactive_deviations(&self) {
        let threshold = self.clock.now() - ChronoDuration::days(INACTIVITY_THRESHOLD_DAYS);
        let inactive = match self.repository.list_inactive(threshold).await {
            Ok(profiles) => profiles,
            Err(e) => {
                error!("inactivity scan failed: {}", e);
                return;
            }
        };

        for profile in inactive {
            let raised = (profile.deviation + INACTIVITY_DEVIATION_STEP).min(INITIAL_DEVIATION);
            if raised == profile.deviation {
                continue;
            }
            let mut updated = profile.clone();
            updated.deviation = raised;
            if let Err(e) = self.repository.put_profile(&updated).await {
                error!("deviation bump failed for {}: {}", profile.user_id, e);
            }
        }
    }

    pub fn spawn_inactivity_job(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup does not
            // double-bump deviations after a restart.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.raise_inactive_deviations().await;
            }
        })
    }
}
