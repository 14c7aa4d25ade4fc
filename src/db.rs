use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::{OutcomeOverride, OutcomeWrite, OverrideStats};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn read_override(row: &PgRow) -> OutcomeOverride {
    OutcomeOverride {
        appointment_id: row.get("fub_appointment_id"),
        outcome_id: row.get("outcome_id"),
        outcome_name: row.get("outcome_name"),
        note: row.get("note"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const OVERRIDE_COLUMNS: &str = "fub_appointment_id, outcome_id, outcome_name, note, updated_by, \
     created_at, updated_at";

/// Local outcome for one appointment, if any has been recorded.
pub async fn get_outcome(
    pool: &PgPool,
    appointment_id: i64,
) -> anyhow::Result<Option<OutcomeOverride>> {
    let row = sqlx::query(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM fub_analytics.appointment_outcomes \
         WHERE fub_appointment_id = $1",
    ))
    .bind(appointment_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(read_override))
}

pub async fn all_outcomes(pool: &PgPool) -> anyhow::Result<Vec<OutcomeOverride>> {
    let rows = sqlx::query(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM fub_analytics.appointment_outcomes \
         ORDER BY updated_at DESC",
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(read_override).collect())
}

/// Local outcomes for a batch of appointment ids (one round trip).
pub async fn outcomes_for_appointments(
    pool: &PgPool,
    appointment_ids: &[i64],
) -> anyhow::Result<Vec<OutcomeOverride>> {
    if appointment_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(&format!(
        "SELECT {OVERRIDE_COLUMNS} FROM fub_analytics.appointment_outcomes \
         WHERE fub_appointment_id = ANY($1)",
    ))
    .bind(appointment_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(read_override).collect())
}

/// Insert or update the local outcome for an appointment.
///
/// Re-entering an outcome without a note keeps the note already on file.
pub async fn set_outcome(
    pool: &PgPool,
    appointment_id: i64,
    outcome_id: i64,
    outcome_name: &str,
    note: Option<&str>,
    updated_by: Option<&str>,
) -> anyhow::Result<OutcomeOverride> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO fub_analytics.appointment_outcomes
        (fub_appointment_id, outcome_id, outcome_name, note, updated_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (fub_appointment_id) DO UPDATE SET
            outcome_id = EXCLUDED.outcome_id,
            outcome_name = EXCLUDED.outcome_name,
            note = COALESCE(EXCLUDED.note, appointment_outcomes.note),
            updated_by = EXCLUDED.updated_by,
            updated_at = now()
        RETURNING {OVERRIDE_COLUMNS}
        "#,
    ))
    .bind(appointment_id)
    .bind(outcome_id)
    .bind(outcome_name)
    .bind(note)
    .bind(updated_by)
    .fetch_one(pool)
    .await?;

    Ok(read_override(&row))
}

/// Remove the local outcome, reverting to whatever the remote system holds.
/// Returns false when nothing was on file.
pub async fn delete_outcome(pool: &PgPool, appointment_id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM fub_analytics.appointment_outcomes WHERE fub_appointment_id = $1",
    )
    .bind(appointment_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_outcomes_bulk(pool: &PgPool, entries: &[OutcomeWrite]) -> anyhow::Result<usize> {
    let mut written = 0usize;
    for entry in entries {
        set_outcome(
            pool,
            entry.appointment_id,
            entry.outcome_id,
            &entry.outcome_name,
            entry.note.as_deref(),
            entry.updated_by.as_deref(),
        )
        .await?;
        written += 1;
    }
    Ok(written)
}

/// Import outcome overrides from a CSV file with columns
/// `appointment_id,outcome_id,outcome_name,note,updated_by`.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut entries = Vec::new();

    for result in reader.deserialize::<OutcomeWrite>() {
        entries.push(result?);
    }

    set_outcomes_bulk(pool, &entries).await
}

pub async fn stats(pool: &PgPool) -> anyhow::Result<OverrideStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, COUNT(DISTINCT outcome_id) AS unique_outcomes, \
         MIN(created_at) AS first_entry, MAX(updated_at) AS last_update \
         FROM fub_analytics.appointment_outcomes",
    )
    .fetch_one(pool)
    .await?;

    Ok(OverrideStats {
        total: row.get("total"),
        unique_outcomes: row.get("unique_outcomes"),
        first_entry: row.get("first_entry"),
        last_update: row.get("last_update"),
    })
}

/// User ids designated as Inside Sales Associates for the ISA dashboard.
pub async fn isa_user_ids(pool: &PgPool) -> anyhow::Result<Vec<i64>> {
    let rows = sqlx::query("SELECT user_id FROM fub_analytics.isa_users ORDER BY user_id")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get("user_id")).collect())
}

/// Replace the ISA designation set wholesale.
pub async fn set_isa_users(pool: &PgPool, user_ids: &[i64]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM fub_analytics.isa_users")
        .execute(&mut *tx)
        .await?;

    for user_id in user_ids {
        sqlx::query(
            "INSERT INTO fub_analytics.isa_users (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(*user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
