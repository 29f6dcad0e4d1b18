//! Popularity ranking of content authored by a set of users.
//!
//! The ranker is a pure function over whatever events it is given. It keeps
//! only events whose author is in the requested user set, then orders them
//! most-liked first. Ties go to the older post, and then to the lower topic
//! id, so the result is deterministic for any input order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use vicinity_types::{ContentEvent, UserId};

/// Ranking order: `like_count` descending, `created_at` ascending,
/// `topic_id` ascending.
pub fn popularity_order(a: &ContentEvent, b: &ContentEvent) -> Ordering {
    b.like_count
        .cmp(&a.like_count)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.topic_id.cmp(&b.topic_id))
}

/// Rank the events authored by `users`, most popular first.
///
/// Events whose author is not in `users` are skipped. In particular, events
/// attributed to a user that is missing from the registry can never be
/// ranked: the user set comes from the neighbor finder, which only returns
/// registered users. Such events are not an error.
///
/// Returns an empty vector when nothing matches.
pub fn rank_by_users<'a, I>(events: I, users: &BTreeSet<UserId>) -> Vec<ContentEvent>
where
    I: IntoIterator<Item = &'a ContentEvent>,
{
    if users.is_empty() {
        return Vec::new();
    }
    let mut ranked: Vec<ContentEvent> = events
        .into_iter()
        .filter(|event| users.contains(&event.user_id))
        .cloned()
        .collect();
    ranked.sort_by(popularity_order);
    ranked
}

/// Like [`rank_by_users`], but keep only the top `limit` events.
pub fn rank_by_users_limited<'a, I>(
    events: I,
    users: &BTreeSet<UserId>,
    limit: usize,
) -> Vec<ContentEvent>
where
    I: IntoIterator<Item = &'a ContentEvent>,
{
    if limit == 0 {
        return Vec::new();
    }
    let mut ranked = rank_by_users(events, users);
    ranked.truncate(limit);
    ranked
}
