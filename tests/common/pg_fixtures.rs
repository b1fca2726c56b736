use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_user(pool: &PgPool, username: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO profiles (id, username) VALUES ($1, $2)")
        .bind(user_id)
        .bind(format!("{}_{}", username, &user_id.to_string()[..4]))
        .execute(pool)
        .await
        .expect("Failed to insert profile");
    user_id
}

async fn insert_team(pool: &PgPool, name: &str) -> Uuid {
    let team_id = Uuid::new_v4();
    sqlx::query("INSERT INTO teams (id, name, short_name) VALUES ($1, $2, $3)")
        .bind(team_id)
        .bind(name)
        .bind(&name[..3])
        .execute(pool)
        .await
        .expect("Failed to insert team");
    team_id
}

async fn insert_match(pool: &PgPool, status: &str, score: Option<(i32, i32)>, round: i32) -> Uuid {
    let home = insert_team(pool, "Home United").await;
    let away = insert_team(pool, "Away City").await;
    let match_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO matches (id, home_team_id, away_team_id, start_time, status, home_score, away_score, round)
        VALUES ($1, $2, $3, NOW() - INTERVAL '1 day', $4, $5, $6, $7)
        "#,
    )
    .bind(match_id)
    .bind(home)
    .bind(away)
    .bind(status)
    .bind(score.map(|(h, _)| h))
    .bind(score.map(|(_, a)| a))
    .bind(round)
    .execute(pool)
    .await
    .expect("Failed to insert match");
    match_id
}

pub async fn insert_finished_match(pool: &PgPool, home: i32, away: i32, round: i32) -> Uuid {
    insert_match(pool, "finished", Some((home, away)), round).await
}

pub async fn insert_scheduled_match(pool: &PgPool, round: i32) -> Uuid {
    insert_match(pool, "scheduled", None, round).await
}

pub async fn insert_prediction(pool: &PgPool, user_id: Uuid, match_id: Uuid, home: i32, away: i32) -> Uuid {
    let prediction_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO predictions (id, user_id, match_id, home_score, away_score) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(prediction_id)
    .bind(user_id)
    .bind(match_id)
    .bind(home)
    .bind(away)
    .execute(pool)
    .await
    .expect("Failed to insert prediction");
    prediction_id
}

pub async fn prediction_points(pool: &PgPool, prediction_id: Uuid) -> Option<i32> {
    sqlx::query_scalar("SELECT points_awarded FROM predictions WHERE id = $1")
        .bind(prediction_id)
        .fetch_one(pool)
        .await
        .expect("Prediction should exist")
}

pub async fn profile_points(pool: &PgPool, user_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT points FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Profile should exist")
}

pub async fn set_profile_points(pool: &PgPool, user_id: Uuid, points: i32) {
    sqlx::query("UPDATE profiles SET points = $2 WHERE id = $1")
        .bind(user_id)
        .bind(points)
        .execute(pool)
        .await
        .expect("Failed to update profile");
}

/// Sum of a user's awarded points, straight from the predictions table.
pub async fn expected_total(pool: &PgPool, user_id: Uuid) -> i32 {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points_awarded), 0)::BIGINT FROM predictions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("Failed to sum points");
    total as i32
}
