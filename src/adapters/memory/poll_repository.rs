//! In-memory poll repository.
//!
//! Polls are kept in insertion order so "newest first" is the reverse of
//! the backing vector. Writes can be made to fail for compensation tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{OptionId, OwnedByUser, PollId, Timestamp, UserId};
use crate::domain::poll::{NewPoll, Poll, PollChange, PollOption};
use crate::ports::{PollRepository, RepositoryError};

#[derive(Debug, Default)]
struct Store {
    polls: Vec<Poll>,
    votes: HashMap<(PollId, UserId), OptionId>,
}

impl Store {
    fn poll_mut(&mut self, poll_id: PollId) -> Result<&mut Poll, RepositoryError> {
        self.polls
            .iter_mut()
            .find(|p| p.id == poll_id)
            .ok_or(RepositoryError::PollNotFound)
    }
}

/// In-memory poll storage for tests and the console binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPollRepository {
    store: Arc<RwLock<Store>>,
    fail_option_inserts: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fully built poll as is.
    pub async fn seed(&self, poll: Poll) {
        self.store.write().await.polls.push(poll);
    }

    /// Convenience for tests: a poll with the given options.
    pub async fn seed_poll(&self, owner: &UserId, title: &str, options: &[&str]) -> Poll {
        let id = PollId::new();
        let poll = Poll {
            id,
            owner_id: owner.clone(),
            title: title.to_string(),
            category: crate::domain::poll::Category::Other,
            options: build_options(id, options.iter().map(|s| s.to_string()), &[]),
            is_active: true,
            ends_at: None,
            created_at: Timestamp::now(),
        };
        self.seed(poll.clone()).await;
        poll
    }

    /// Makes every `insert_options` call fail until switched off.
    pub fn fail_option_inserts(&self, fail: bool) {
        self.fail_option_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every `update_poll_field` call fail until switched off.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub async fn poll_count(&self) -> usize {
        self.store.read().await.polls.len()
    }

    /// Any poll by id, regardless of owner or status.
    pub async fn get(&self, poll_id: PollId) -> Option<Poll> {
        self.store
            .read()
            .await
            .polls
            .iter()
            .find(|p| p.id == poll_id)
            .cloned()
    }

    pub async fn all(&self) -> Vec<Poll> {
        self.store.read().await.polls.clone()
    }
}

/// Builds options in order, keeping id and votes of retained texts.
fn build_options(
    poll_id: PollId,
    texts: impl IntoIterator<Item = String>,
    existing: &[PollOption],
) -> Vec<PollOption> {
    texts
        .into_iter()
        .enumerate()
        .map(|(position, text)| {
            let kept = existing
                .iter()
                .find(|o| o.text.to_lowercase() == text.to_lowercase());
            PollOption {
                id: kept.map_or_else(OptionId::new, |o| o.id),
                poll_id,
                text,
                position: position as u32,
                votes: kept.map_or(0, |o| o.votes),
            }
        })
        .collect()
}

fn newest_first<'a>(polls: impl DoubleEndedIterator<Item = &'a Poll>) -> Vec<Poll> {
    polls.rev().cloned().collect()
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn fetch_polls_by_owner(&self, owner: &UserId) -> Result<Vec<Poll>, RepositoryError> {
        let store = self.store.read().await;
        Ok(newest_first(store.polls.iter().filter(|p| p.is_owner(owner))))
    }

    async fn fetch_poll_by_id_and_owner(
        &self,
        poll_id: PollId,
        owner: &UserId,
    ) -> Result<Option<Poll>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .polls
            .iter()
            .find(|p| p.id == poll_id && p.is_owner(owner))
            .cloned())
    }

    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, RepositoryError> {
        let poll = Poll {
            id: PollId::new(),
            owner_id: poll.owner_id,
            title: poll.title,
            category: poll.category,
            options: Vec::new(),
            is_active: true,
            ends_at: poll.ends_at,
            created_at: Timestamp::now(),
        };
        self.store.write().await.polls.push(poll.clone());
        Ok(poll)
    }

    async fn insert_options(
        &self,
        poll_id: PollId,
        options: &[String],
    ) -> Result<Vec<PollOption>, RepositoryError> {
        if self.fail_option_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("option insert failed".to_string()));
        }
        let mut store = self.store.write().await;
        let poll = store.poll_mut(poll_id)?;
        let offset = poll.options.len();
        let inserted: Vec<PollOption> = build_options(poll_id, options.iter().cloned(), &[])
            .into_iter()
            .map(|mut o| {
                o.position += offset as u32;
                o
            })
            .collect();
        poll.options.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn delete_options_by_poll(&self, poll_id: PollId) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        store.poll_mut(poll_id)?.options.clear();
        store.votes.retain(|(id, _), _| *id != poll_id);
        Ok(())
    }

    async fn update_poll_field(
        &self,
        poll_id: PollId,
        owner: &UserId,
        change: &PollChange,
    ) -> Result<Poll, RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("update failed".to_string()));
        }
        let mut store = self.store.write().await;
        let poll = store.poll_mut(poll_id)?;
        poll.check_ownership(owner).map_err(|_| RepositoryError::PollNotFound)?;

        match change {
            PollChange::Title(title) => poll.title = title.clone(),
            PollChange::Category(category) => poll.category = *category,
            PollChange::EndDate(at) => poll.ends_at = Some(*at),
            PollChange::Options(texts) => {
                let options = build_options(poll_id, texts.iter().cloned(), &poll.options);
                poll.options = options;
            }
        }
        let updated = poll.clone();

        if matches!(change, PollChange::Options(_)) {
            let kept: Vec<OptionId> = updated.options.iter().map(|o| o.id).collect();
            store
                .votes
                .retain(|(id, _), option| *id != poll_id || kept.contains(option));
        }
        Ok(updated)
    }

    async fn delete_poll(&self, poll_id: PollId) -> Result<(), RepositoryError> {
        self.delete_options_by_poll(poll_id).await?;
        self.store.write().await.polls.retain(|p| p.id != poll_id);
        Ok(())
    }

    async fn fetch_active_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError> {
        let now = Timestamp::now();
        let store = self.store.read().await;
        let mut polls = newest_first(store.polls.iter().filter(|p| p.is_open(&now)));
        polls.truncate(limit);
        Ok(polls)
    }

    async fn fetch_recent_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError> {
        let store = self.store.read().await;
        let mut polls = newest_first(store.polls.iter());
        polls.truncate(limit);
        Ok(polls)
    }

    async fn fetch_polls_voted_by(&self, user: &UserId) -> Result<Vec<Poll>, RepositoryError> {
        let store = self.store.read().await;
        let voted = store.polls.iter().filter(|p| {
            store.votes.contains_key(&(p.id, user.clone()))
        });
        Ok(newest_first(voted))
    }

    async fn fetch_active_poll(&self, poll_id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let now = Timestamp::now();
        let store = self.store.read().await;
        Ok(store
            .polls
            .iter()
            .find(|p| p.id == poll_id && p.is_open(&now))
            .cloned())
    }

    async fn cast_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        user: &UserId,
    ) -> Result<(), RepositoryError> {
        let now = Timestamp::now();
        let mut store = self.store.write().await;
        if store.votes.contains_key(&(poll_id, user.clone())) {
            return Err(RepositoryError::AlreadyVoted);
        }
        let poll = store.poll_mut(poll_id)?;
        if !poll.is_open(&now) {
            return Err(RepositoryError::PollClosed);
        }
        let option = poll
            .options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or(RepositoryError::OptionNotFound)?;
        option.votes += 1;
        store.votes.insert((poll_id, user.clone()), option_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::poll::Category;

    fn owner() -> UserId {
        UserId::new("owner").unwrap()
    }

    fn other() -> UserId {
        UserId::new("other").unwrap()
    }

    #[tokio::test]
    async fn options_keep_insertion_order() {
        let repo = InMemoryPollRepository::new();
        let poll = repo
            .insert_poll(NewPoll::new(owner(), "Best language?", Category::Technology, None).unwrap())
            .await
            .unwrap();
        let texts: Vec<String> = ["Python", "Rust", "Go"].iter().map(|s| s.to_string()).collect();
        repo.insert_options(poll.id, &texts).await.unwrap();

        let stored = repo.get(poll.id).await.unwrap();
        assert_eq!(stored.option_texts(), texts);
    }

    #[tokio::test]
    async fn foreign_poll_is_not_found() {
        let repo = InMemoryPollRepository::new();
        let poll = repo.seed_poll(&owner(), "Owner's poll", &["A", "B"]).await;

        assert!(repo
            .fetch_poll_by_id_and_owner(poll.id, &other())
            .await
            .unwrap()
            .is_none());
        let err = repo
            .update_poll_field(poll.id, &other(), &PollChange::Title("Hijacked".into()))
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::PollNotFound);
    }

    #[tokio::test]
    async fn options_change_keeps_votes_of_retained_texts() {
        let repo = InMemoryPollRepository::new();
        let poll = repo.seed_poll(&owner(), "Cities", &["Chennai", "Pune"]).await;
        let chennai = poll.options[0].id;
        repo.cast_vote(poll.id, chennai, &other()).await.unwrap();

        let change = PollChange::Options(vec!["Chennai".into(), "Mumbai".into(), "Delhi".into()]);
        let updated = repo.update_poll_field(poll.id, &owner(), &change).await.unwrap();

        assert_eq!(updated.option_texts(), vec!["Chennai", "Mumbai", "Delhi"]);
        assert_eq!(updated.options[0].id, chennai);
        assert_eq!(updated.options[0].votes, 1);
        assert_eq!(repo.fetch_polls_voted_by(&other()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_vote_per_user() {
        let repo = InMemoryPollRepository::new();
        let poll = repo.seed_poll(&owner(), "Lunch", &["Pizza", "Sushi"]).await;

        repo.cast_vote(poll.id, poll.options[1].id, &other()).await.unwrap();
        let err = repo
            .cast_vote(poll.id, poll.options[0].id, &other())
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::AlreadyVoted);
    }

    #[tokio::test]
    async fn injected_option_failure_is_reported() {
        let repo = InMemoryPollRepository::new();
        repo.fail_option_inserts(true);
        let poll = repo
            .insert_poll(NewPoll::new(owner(), "Failing poll", Category::Other, None).unwrap())
            .await
            .unwrap();
        assert!(repo.insert_options(poll.id, &["A".into(), "B".into()]).await.is_err());

        repo.delete_poll(poll.id).await.unwrap();
        assert_eq!(repo.poll_count().await, 0);
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let repo = InMemoryPollRepository::new();
        repo.seed_poll(&owner(), "First poll", &["A", "B"]).await;
        repo.seed_poll(&owner(), "Second poll", &["A", "B"]).await;

        let recent = repo.fetch_recent_polls(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "Second poll");
    }
}
