/// Plan building
///
/// Expands a sequence's day/post templates into concrete scheduled posts at
/// enrollment time. Building the plan is pure; persisting it happens inside
/// the enrollment transaction so a partial insert can never survive.
use crate::db::models::{PostType, Sequence, SequenceDay};
use crate::error::{AutomationError, AutomationResult};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use rand::Rng;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Intelligent delay draws uniformly from [-15, +15] minutes
pub const JITTER_SECONDS: i64 = 15 * 60;

/// A sequence day together with its ordered post templates
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub day: SequenceDay,
    pub posts: Vec<crate::db::models::PostTemplate>,
}

/// A fully loaded sequence, days ordered by index
#[derive(Debug, Clone)]
pub struct SequenceTemplate {
    pub sequence: Sequence,
    pub days: Vec<DayPlan>,
}

/// A scheduled post ready for bulk insert
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub id: String,
    pub run_id: String,
    pub account_id: String,
    pub template_id: String,
    pub day_index: i64,
    pub order_index: i64,
    pub post_type: PostType,
    pub content_spec: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Load a sequence with its days and post templates
pub async fn load_template(
    db: &SqlitePool,
    sequence_id: &str,
) -> AutomationResult<SequenceTemplate> {
    let sequence = sqlx::query_as::<_, Sequence>("SELECT * FROM sequence WHERE id = ?")
        .bind(sequence_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AutomationError::NotFound(format!("sequence {}", sequence_id)))?;

    let day_rows = sqlx::query_as::<_, SequenceDay>(
        "SELECT * FROM sequence_day WHERE sequence_id = ? ORDER BY day_index",
    )
    .bind(sequence_id)
    .fetch_all(db)
    .await?;

    let mut days = Vec::with_capacity(day_rows.len());
    for day in day_rows {
        let posts = sqlx::query_as::<_, crate::db::models::PostTemplate>(
            "SELECT * FROM post_template WHERE day_id = ? ORDER BY order_index, time_of_day",
        )
        .bind(&day.id)
        .fetch_all(db)
        .await?;

        days.push(DayPlan { day, posts });
    }

    Ok(SequenceTemplate { sequence, days })
}

/// Expand a sequence template into concrete scheduled posts.
///
/// Day N lands on the midnight-of-enrollment date plus N-1 days, regardless
/// of the enrollment time of day. Rest days emit nothing.
pub fn build_plan<R: Rng>(
    template: &SequenceTemplate,
    run_id: &str,
    account_id: &str,
    enrolled_at: DateTime<Utc>,
    rng: &mut R,
) -> AutomationResult<Vec<NewScheduledPost>> {
    let enrollment_date = enrolled_at.date_naive();
    let mut plan = Vec::new();

    for day_plan in &template.days {
        if day_plan.day.day_index < 1 || day_plan.day.day_index > template.sequence.total_days {
            return Err(AutomationError::Validation(format!(
                "day index {} outside sequence of {} days",
                day_plan.day.day_index, template.sequence.total_days
            )));
        }

        if day_plan.day.is_rest {
            continue;
        }

        let day_date = enrollment_date + Duration::days(day_plan.day.day_index - 1);

        for post in &day_plan.posts {
            let time_of_day = NaiveTime::parse_from_str(&post.time_of_day, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&post.time_of_day, "%H:%M:%S"))
                .map_err(|_| {
                    AutomationError::Validation(format!(
                        "invalid time of day '{}' on template {}",
                        post.time_of_day, post.id
                    ))
                })?;

            let mut scheduled_at = Utc.from_utc_datetime(&day_date.and_time(time_of_day));

            if post.intelligent_delay {
                let offset = rng.gen_range(-JITTER_SECONDS..=JITTER_SECONDS);
                scheduled_at += Duration::seconds(offset);
            }

            plan.push(NewScheduledPost {
                id: Uuid::new_v4().to_string(),
                run_id: run_id.to_string(),
                account_id: account_id.to_string(),
                template_id: post.id.clone(),
                day_index: day_plan.day.day_index,
                order_index: post.order_index,
                post_type: post.post_type,
                content_spec: post.content_spec.clone(),
                scheduled_at,
            });
        }
    }

    Ok(plan)
}

/// Bulk-insert a plan inside the enrollment transaction
pub async fn insert_plan(
    tx: &mut Transaction<'_, Sqlite>,
    plan: &[NewScheduledPost],
) -> AutomationResult<()> {
    for item in plan {
        sqlx::query(
            r#"
            INSERT INTO scheduled_post
                (id, run_id, account_id, template_id, day_index, order_index,
                 post_type, content_spec, scheduled_at, status, attempts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0)
            "#,
        )
        .bind(&item.id)
        .bind(&item.run_id)
        .bind(&item.account_id)
        .bind(&item.template_id)
        .bind(item.day_index)
        .bind(item.order_index)
        .bind(item.post_type)
        .bind(&item.content_spec)
        .bind(item.scheduled_at)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
