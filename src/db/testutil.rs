/// Shared row-seeding helpers for manager tests
use crate::db::models::ScheduledPost;
use chrono::Utc;
use sqlx::SqlitePool;

pub async fn seed_account(pool: &SqlitePool, id: &str) {
    sqlx::query(
        r#"
        INSERT INTO account (id, owner_id, handle, credential, warming_status, created_at)
        VALUES (?, 'owner-1', ?, 'cred', 'not_warmed', ?)
        "#,
    )
    .bind(id)
    .bind(format!("@{}", id))
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
}

/// Sequence with `days` entries; each tuple is (is_rest, post count).
/// Posts land at 09:00 with custom text and no jitter.
pub async fn seed_sequence(pool: &SqlitePool, id: &str, days: &[(bool, usize)]) {
    sqlx::query(
        r#"
        INSERT INTO sequence (id, owner_id, name, total_days, status, created_at)
        VALUES (?, 'owner-1', ?, ?, 'active', ?)
        "#,
    )
    .bind(id)
    .bind(format!("seq {}", id))
    .bind(days.len() as i64)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    for (i, (is_rest, posts)) in days.iter().enumerate() {
        let day_id = format!("{}-day-{}", id, i + 1);
        sqlx::query(
            "INSERT INTO sequence_day (id, sequence_id, day_index, is_rest) VALUES (?, ?, ?, ?)",
        )
        .bind(&day_id)
        .bind(id)
        .bind((i + 1) as i64)
        .bind(*is_rest)
        .execute(pool)
        .await
        .unwrap();

        for p in 0..*posts {
            sqlx::query(
                r#"
                INSERT INTO post_template
                    (id, day_id, order_index, time_of_day, post_type, intelligent_delay, content_spec)
                VALUES (?, ?, ?, '09:00', 'text', 0, '{"text":{"kind":"custom","text":"hi"}}')
                "#,
            )
            .bind(format!("{}-p{}", day_id, p))
            .bind(&day_id)
            .bind(p as i64)
            .execute(pool)
            .await
            .unwrap();
        }
    }
}

pub async fn seed_periodic(pool: &SqlitePool, id: &str, account_id: &str, active: bool) {
    sqlx::query(
        r#"
        INSERT INTO periodic_post
            (id, account_id, interval_minutes, post_type, content_spec, active, times_posted)
        VALUES (?, ?, 60, 'text', '{"text":{"kind":"custom","text":"drip"}}', ?, 0)
        "#,
    )
    .bind(id)
    .bind(account_id)
    .bind(active)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn scheduled_posts(pool: &SqlitePool, run_id: &str) -> Vec<ScheduledPost> {
    sqlx::query_as::<_, ScheduledPost>(
        "SELECT * FROM scheduled_post WHERE run_id = ? ORDER BY day_index, order_index",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

/// Pull every scheduled post for a run back to a past due time so the next
/// tick picks them up
pub async fn make_due(pool: &SqlitePool, run_id: &str) {
    sqlx::query(
        "UPDATE scheduled_post SET scheduled_at = '2000-01-01T00:00:00Z' WHERE run_id = ? AND status = 'pending'",
    )
    .bind(run_id)
    .execute(pool)
    .await
    .unwrap();
}
