//! PostgreSQL implementation of PollRepository.
//!
//! Polls, options and votes live in three tables (see `migrations/`).
//! Options changes and votes run inside a transaction.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::foundation::{OptionId, PollId, Timestamp, UserId};
use crate::domain::poll::{Category, NewPoll, Poll, PollChange, PollOption};
use crate::ports::{PollRepository, RepositoryError};

const POLL_COLUMNS: &str = "id, owner_id, title, category, is_active, ends_at, created_at";

const OPEN_FILTER: &str = "is_active AND (ends_at IS NULL OR ends_at > now())";

/// PostgreSQL implementation of PollRepository.
#[derive(Clone)]
pub struct PostgresPollRepository {
    pool: PgPool,
}

impl PostgresPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads options for the given poll rows and assembles polls in row order.
    async fn with_options(&self, rows: Vec<PgRow>) -> Result<Vec<Poll>, RepositoryError> {
        let mut polls = rows
            .into_iter()
            .map(row_to_poll)
            .collect::<Result<Vec<Poll>, RepositoryError>>()?;
        if polls.is_empty() {
            return Ok(polls);
        }

        let ids: Vec<Uuid> = polls.iter().map(|p| *p.id.as_uuid()).collect();
        let option_rows = sqlx::query(
            r#"
            SELECT id, poll_id, text, position, votes
            FROM poll_options
            WHERE poll_id = ANY($1)
            ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch poll options"))?;

        let mut by_poll: HashMap<PollId, Vec<PollOption>> = HashMap::new();
        for row in option_rows {
            let option = row_to_option(&row);
            by_poll.entry(option.poll_id).or_default().push(option);
        }
        for poll in &mut polls {
            poll.options = by_poll.remove(&poll.id).unwrap_or_default();
        }
        Ok(polls)
    }

    async fn fetch_one(&self, rows: Vec<PgRow>) -> Result<Option<Poll>, RepositoryError> {
        Ok(self.with_options(rows).await?.into_iter().next())
    }

    async fn require_owner(
        tx: &mut Transaction<'_, Postgres>,
        poll_id: PollId,
        owner: &UserId,
    ) -> Result<(), RepositoryError> {
        let found = sqlx::query("SELECT 1 FROM polls WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(poll_id.as_uuid())
            .bind(owner.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error("check poll owner"))?;
        found.map(|_| ()).ok_or(RepositoryError::PollNotFound)
    }

    /// Swaps the option set, keeping rows (and votes) of retained texts.
    async fn replace_options(
        tx: &mut Transaction<'_, Postgres>,
        poll_id: PollId,
        texts: &[String],
    ) -> Result<(), RepositoryError> {
        let existing = sqlx::query("SELECT id, text FROM poll_options WHERE poll_id = $1")
            .bind(poll_id.as_uuid())
            .fetch_all(&mut **tx)
            .await
            .map_err(db_error("fetch options for update"))?;
        let existing: HashMap<String, Uuid> = existing
            .iter()
            .map(|row| (row.get::<String, _>("text").to_lowercase(), row.get::<Uuid, _>("id")))
            .collect();

        let retained: Vec<Uuid> = texts
            .iter()
            .filter_map(|t| existing.get(&t.to_lowercase()).copied())
            .collect();

        sqlx::query("DELETE FROM poll_options WHERE poll_id = $1 AND NOT (id = ANY($2))")
            .bind(poll_id.as_uuid())
            .bind(&retained)
            .execute(&mut **tx)
            .await
            .map_err(db_error("delete dropped options"))?;

        for (position, text) in texts.iter().enumerate() {
            let position = position as i32;
            match existing.get(&text.to_lowercase()) {
                Some(id) => {
                    sqlx::query("UPDATE poll_options SET text = $2, position = $3 WHERE id = $1")
                        .bind(id)
                        .bind(text)
                        .bind(position)
                        .execute(&mut **tx)
                        .await
                        .map_err(db_error("reorder option"))?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO poll_options (id, poll_id, text, position, votes) VALUES ($1, $2, $3, $4, 0)",
                    )
                    .bind(OptionId::new().as_uuid())
                    .bind(poll_id.as_uuid())
                    .bind(text)
                    .bind(position)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_error("insert option"))?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PollRepository for PostgresPollRepository {
    async fn fetch_polls_by_owner(&self, owner: &UserId) -> Result<Vec<Poll>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch polls by owner"))?;
        self.with_options(rows).await
    }

    async fn fetch_poll_by_id_and_owner(
        &self,
        poll_id: PollId,
        owner: &UserId,
    ) -> Result<Option<Poll>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1 AND owner_id = $2"
        ))
        .bind(poll_id.as_uuid())
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch poll"))?;
        self.fetch_one(rows).await
    }

    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, RepositoryError> {
        let id = PollId::new();
        let created_at = Timestamp::now();
        sqlx::query(
            r#"
            INSERT INTO polls (id, owner_id, title, category, is_active, ends_at, created_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(poll.owner_id.as_str())
        .bind(&poll.title)
        .bind(poll.category.as_str())
        .bind(poll.ends_at.map(|t| *t.as_datetime()))
        .bind(created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("insert poll"))?;

        Ok(Poll {
            id,
            owner_id: poll.owner_id,
            title: poll.title,
            category: poll.category,
            options: Vec::new(),
            is_active: true,
            ends_at: poll.ends_at,
            created_at,
        })
    }

    async fn insert_options(
        &self,
        poll_id: PollId,
        options: &[String],
    ) -> Result<Vec<PollOption>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        let offset: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poll_options WHERE poll_id = $1")
            .bind(poll_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("count options"))?;

        let mut inserted = Vec::with_capacity(options.len());
        for (i, text) in options.iter().enumerate() {
            let option = PollOption {
                id: OptionId::new(),
                poll_id,
                text: text.clone(),
                position: (offset as u32) + i as u32,
                votes: 0,
            };
            sqlx::query(
                "INSERT INTO poll_options (id, poll_id, text, position, votes) VALUES ($1, $2, $3, $4, 0)",
            )
            .bind(option.id.as_uuid())
            .bind(poll_id.as_uuid())
            .bind(&option.text)
            .bind(option.position as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert options"))?;
            inserted.push(option);
        }

        tx.commit().await.map_err(db_error("commit options"))?;
        Ok(inserted)
    }

    async fn delete_options_by_poll(&self, poll_id: PollId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM poll_options WHERE poll_id = $1")
            .bind(poll_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("delete options"))?;
        Ok(())
    }

    async fn update_poll_field(
        &self,
        poll_id: PollId,
        owner: &UserId,
        change: &PollChange,
    ) -> Result<Poll, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        Self::require_owner(&mut tx, poll_id, owner).await?;

        let query = match change {
            PollChange::Options(texts) => {
                Self::replace_options(&mut tx, poll_id, texts).await?;
                None
            }
            PollChange::Title(title) => Some(
                sqlx::query("UPDATE polls SET title = $2 WHERE id = $1")
                    .bind(poll_id.as_uuid())
                    .bind(title.as_str()),
            ),
            PollChange::Category(category) => Some(
                sqlx::query("UPDATE polls SET category = $2 WHERE id = $1")
                    .bind(poll_id.as_uuid())
                    .bind(category.as_str()),
            ),
            PollChange::EndDate(at) => Some(
                sqlx::query("UPDATE polls SET ends_at = $2 WHERE id = $1")
                    .bind(poll_id.as_uuid())
                    .bind(*at.as_datetime()),
            ),
        };
        if let Some(query) = query {
            query
                .execute(&mut *tx)
                .await
                .map_err(db_error("update poll"))?;
        }
        tx.commit().await.map_err(db_error("commit poll update"))?;

        self.fetch_poll_by_id_and_owner(poll_id, owner)
            .await?
            .ok_or(RepositoryError::PollNotFound)
    }

    async fn delete_poll(&self, poll_id: PollId) -> Result<(), RepositoryError> {
        // options and votes cascade
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(poll_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("delete poll"))?;
        Ok(())
    }

    async fn fetch_active_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE {OPEN_FILTER} ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch active polls"))?;
        self.with_options(rows).await
    }

    async fn fetch_recent_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch recent polls"))?;
        self.with_options(rows).await
    }

    async fn fetch_polls_voted_by(&self, user: &UserId) -> Result<Vec<Poll>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.owner_id, p.title, p.category, p.is_active, p.ends_at, p.created_at
            FROM polls p
            JOIN poll_votes v ON v.poll_id = p.id
            WHERE v.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch voted polls"))?;
        self.with_options(rows).await
    }

    async fn fetch_active_poll(&self, poll_id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1 AND {OPEN_FILTER}"
        ))
        .bind(poll_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch active poll"))?;
        self.fetch_one(rows).await
    }

    async fn cast_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        user: &UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let open = sqlx::query(&format!(
            "SELECT 1 FROM polls WHERE id = $1 AND {OPEN_FILTER} FOR UPDATE"
        ))
        .bind(poll_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("check poll open"))?;
        if open.is_none() {
            return Err(RepositoryError::PollClosed);
        }

        let counted = sqlx::query(
            "UPDATE poll_options SET votes = votes + 1 WHERE id = $1 AND poll_id = $2",
        )
        .bind(option_id.as_uuid())
        .bind(poll_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_error("count vote"))?;
        if counted.rows_affected() == 0 {
            return Err(RepositoryError::OptionNotFound);
        }

        let recorded = sqlx::query(
            r#"
            INSERT INTO poll_votes (poll_id, user_id, option_id, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (poll_id, user_id) DO NOTHING
            "#,
        )
        .bind(poll_id.as_uuid())
        .bind(user.as_str())
        .bind(option_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_error("record vote"))?;
        if recorded.rows_affected() == 0 {
            // dropping the transaction rolls back the count
            return Err(RepositoryError::AlreadyVoted);
        }

        tx.commit().await.map_err(db_error("commit vote"))?;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| RepositoryError::Storage(format!("Failed to {}: {}", action, e))
}

fn row_to_poll(row: PgRow) -> Result<Poll, RepositoryError> {
    let owner: String = row.get("owner_id");
    let category: String = row.get("category");
    let ends_at: Option<chrono::DateTime<chrono::Utc>> = row.get("ends_at");
    Ok(Poll {
        id: PollId::from_uuid(row.get("id")),
        owner_id: UserId::new(owner)
            .map_err(|e| RepositoryError::Storage(format!("Invalid owner id: {}", e)))?,
        title: row.get("title"),
        category: category
            .parse::<Category>()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        options: Vec::new(),
        is_active: row.get("is_active"),
        ends_at: ends_at.map(Timestamp::from_datetime),
        created_at: Timestamp::from_datetime(row.get("created_at")),
    })
}

fn row_to_option(row: &PgRow) -> PollOption {
    let position: i32 = row.get("position");
    let votes: i32 = row.get("votes");
    PollOption {
        id: OptionId::from_uuid(row.get("id")),
        poll_id: PollId::from_uuid(row.get("poll_id")),
        text: row.get("text"),
        position: position.max(0) as u32,
        votes: votes.max(0) as u32,
    }
}
