use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::ScoringStore;
use crate::models::fixture::Match;
use crate::models::prediction::{Prediction, PredictionPoints};
use crate::models::profile::LeaderboardEntry;
use crate::scoring::StoreError;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgScoringStore {
    pool: PgPool,
}

impl PgScoringStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoringStore for PgScoringStore {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>, StoreError> {
        let game = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, home_team_id, away_team_id, start_time, status,
                   home_score, away_score, round
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(game)
    }

    async fn list_finished_matches(&self) -> Result<Vec<Match>, StoreError> {
        let games = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, home_team_id, away_team_id, start_time, status,
                   home_score, away_score, round
            FROM matches
            WHERE status = 'finished'
            ORDER BY round ASC, start_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    async fn list_predictions(&self, match_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        let predictions = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, match_id, home_score, away_score, points_awarded, created_at
            FROM predictions
            WHERE match_id = $1
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(predictions)
    }

    async fn write_prediction_points(&self, points: &[PredictionPoints]) -> Result<u64, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = points.iter().map(|p| p.prediction_id).collect();
        let values: Vec<i32> = points.iter().map(|p| p.points).collect();

        // Single multi-row update for the whole match
        let result = sqlx::query(
            r#"
            UPDATE predictions AS p
            SET points_awarded = v.points
            FROM UNNEST($1::uuid[], $2::int4[]) AS v(id, points)
            WHERE p.id = v.id
            "#,
        )
        .bind(ids)
        .bind(values)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn sum_points_for_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(points_awarded), 0)::BIGINT
            FROM predictions
            WHERE user_id = $1 AND points_awarded IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn write_user_total_points(&self, user_id: Uuid, total: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET points = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(total)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("profile {} does not exist", user_id)));
        }

        Ok(())
    }

    async fn list_all_user_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM profiles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    fn supports_bulk_recompute(&self) -> bool {
        true
    }

    async fn recompute_all_user_totals(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE profiles AS pr
            SET points = totals.total, updated_at = NOW()
            FROM (
                SELECT p.id, COALESCE(SUM(pd.points_awarded), 0)::INTEGER AS total
                FROM profiles p
                LEFT JOIN predictions pd
                    ON pd.user_id = p.id AND pd.points_awarded IS NOT NULL
                GROUP BY p.id
            ) AS totals
            WHERE pr.id = totals.id
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn record_match_result(
        &self,
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    ) -> Result<Option<Match>, StoreError> {
        let game = sqlx::query_as::<_, Match>(
            r#"
            UPDATE matches
            SET home_score = $2, away_score = $3, status = 'finished'
            WHERE id = $1
            RETURNING id, home_team_id, away_team_id, start_time, status,
                      home_score, away_score, round
            "#,
        )
        .bind(match_id)
        .bind(home_score)
        .bind(away_score)
        .fetch_optional(&self.pool)
        .await?;

        Ok(game)
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT id AS user_id, username, points, updated_at
            FROM profiles
            ORDER BY points DESC, username ASC NULLS LAST
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
