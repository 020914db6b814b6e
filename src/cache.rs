//! Paginated post caches
//!
//! One [`TimelineCache`] exists per feed kind and per opened thread.
//! Post IDs are kept in server delivery order, with each ID present
//! exactly once; a post arriving again only updates the stored copy.
//! Deleted posts leave a tombstone in the order so that positions
//! don't shift under the reader.

use crate::feed::{Direction, FeedRequest, FeedTarget, Interactions, Page, PageToken, Post, PostId};
use log::debug;
use std::collections::HashMap;

/// Local change applied ahead of server confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Like(bool),
    Boost(bool),
    Bookmark(bool),
    Delete,
    Edit {
        body: String,
        spoiler: Option<String>,
    },
    /// Server-confirmed interaction state
    Counts(Interactions),
}

/// A slot in the ordered sequence
pub enum Slot<'a> {
    Live(&'a Post),
    Removed(&'a PostId),
}

pub struct TimelineCache {
    target: FeedTarget,
    order: Vec<PostId>,
    // `None` is a tombstone
    posts: HashMap<PostId, Option<Post>>,
    older: Option<PageToken>,
    newer: Option<PageToken>,
    older_in_flight: bool,
    newer_in_flight: bool,
    loaded: bool,
    exhausted: bool,
}

impl TimelineCache {
    pub fn new(target: FeedTarget) -> Self {
        Self {
            target,
            order: Vec::new(),
            posts: HashMap::new(),
            older: None,
            newer: None,
            older_in_flight: false,
            newer_in_flight: false,
            loaded: false,
            exhausted: false,
        }
    }

    pub fn target(&self) -> &FeedTarget {
        &self.target
    }

    /// Number of slots, tombstones included
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Has a first page been received?
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Did the last older-page fetch come back empty?
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_loading_older(&self) -> bool {
        self.older_in_flight
    }

    pub fn is_loading_newer(&self) -> bool {
        self.newer_in_flight
    }

    pub fn cursors(&self) -> (Option<&PageToken>, Option<&PageToken>) {
        (self.older.as_ref(), self.newer.as_ref())
    }

    pub fn slot(&self, index: usize) -> Option<Slot<'_>> {
        let id = self.order.get(index)?;
        Some(match self.posts.get(id) {
            Some(Some(post)) => Slot::Live(post),
            _ => Slot::Removed(id),
        })
    }

    /// Live posts in order, skipping tombstones
    pub fn posts(&self) -> impl Iterator<Item = &Post> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.posts.get(id).and_then(|p| p.as_ref()))
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id).and_then(|p| p.as_ref())
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.contains_key(id)
    }

    /// Request the first page if nothing is loaded and nothing is on
    /// the way
    pub fn ensure_initial_load(&mut self, limit: usize) -> Option<FeedRequest> {
        if self.loaded || self.older_in_flight {
            return None;
        }
        self.older_in_flight = true;
        Some(self.request(Direction::Initial, None, limit))
    }

    /// Request the page before the tail.  No-op while a fetch in that
    /// direction is outstanding or once the feed is exhausted.
    pub fn load_older(&mut self, limit: usize) -> Option<FeedRequest> {
        if !self.loaded {
            return self.ensure_initial_load(limit);
        }
        if self.older_in_flight || self.exhausted {
            return None;
        }
        self.older_in_flight = true;
        Some(self.request(Direction::Older, self.older.clone(), limit))
    }

    /// Request posts newer than the head
    pub fn load_newer(&mut self, limit: usize) -> Option<FeedRequest> {
        if !self.loaded {
            return self.ensure_initial_load(limit);
        }
        if self.newer_in_flight {
            return None;
        }
        self.newer_in_flight = true;
        Some(self.request(Direction::Newer, self.newer.clone(), limit))
    }

    fn request(&self, direction: Direction, cursor: Option<PageToken>, limit: usize) -> FeedRequest {
        FeedRequest::FetchPage {
            target: self.target.clone(),
            direction,
            cursor,
            limit,
        }
    }

    /// Merge a fetched page
    pub fn apply_page(&mut self, direction: Direction, page: Page) {
        let count = page.posts.len();
        match direction {
            Direction::Initial | Direction::Older => {
                self.older_in_flight = false;
                let fresh = self.merge(page.posts);
                self.order.extend(fresh);
                if count == 0 || page.older.is_none() {
                    self.exhausted = true;
                }
                if page.older.is_some() {
                    self.older = page.older;
                }
                if direction == Direction::Initial || self.newer.is_none() {
                    self.newer = page.newer.or_else(|| self.newer.take());
                }
                self.loaded = true;
            }
            Direction::Newer => {
                self.newer_in_flight = false;
                let fresh = self.merge(page.posts);
                self.order.splice(0..0, fresh);
                if page.newer.is_some() {
                    self.newer = page.newer;
                }
            }
        }
        debug!(
            "{:?} {:?} page of {} merged, {} slots",
            self.target,
            direction,
            count,
            self.order.len()
        );
    }

    // Update posts already present, and return the IDs that are new,
    // in page order
    fn merge(&mut self, posts: Vec<Post>) -> Vec<PostId> {
        let mut fresh = Vec::new();
        for post in posts {
            match self.posts.get_mut(&post.id) {
                // A tombstone stays deleted
                Some(None) => (),
                Some(slot) => *slot = Some(post),
                None => {
                    fresh.push(post.id.clone());
                    self.posts.insert(post.id.clone(), Some(post));
                }
            }
        }
        fresh
    }

    /// A fetch failed: clear the in-flight flag so it can be retried
    pub fn fetch_failed(&mut self, direction: Direction) {
        match direction {
            Direction::Initial | Direction::Older => self.older_in_flight = false,
            Direction::Newer => self.newer_in_flight = false,
        }
    }

    /// Put a post at the head, e.g. one just posted by the user.
    /// Updates in place if already present.
    pub fn insert_head(&mut self, post: Post) {
        let fresh = self.merge(vec![post]);
        self.order.splice(0..0, fresh);
    }

    /// Put a post at the tail, e.g. a new reply in a thread
    pub fn insert_tail(&mut self, post: Post) {
        let fresh = self.merge(vec![post]);
        self.order.extend(fresh);
    }

    /// Replace the stored copy of a post, restoring it if it was
    /// tombstoned.  Ignored if the post isn't in this cache.
    pub fn replace(&mut self, post: Post) -> bool {
        match self.posts.get_mut(&post.id) {
            Some(slot) => {
                *slot = Some(post);
                true
            }
            None => false,
        }
    }

    /// Reflect a local change immediately.  Returns `false` if the
    /// post isn't live in this cache.
    pub fn apply_local_mutation(&mut self, id: &PostId, change: &Mutation) -> bool {
        let slot = match self.posts.get_mut(id) {
            Some(slot) => slot,
            None => return false,
        };
        if let Mutation::Delete = change {
            return slot.take().is_some();
        }
        let post = match slot {
            Some(post) => post,
            None => return false,
        };
        let counts = &mut post.interactions;
        match change {
            Mutation::Like(on) => toggle(&mut counts.liked, &mut counts.likes, *on),
            Mutation::Boost(on) => toggle(&mut counts.boosted, &mut counts.boosts, *on),
            Mutation::Bookmark(on) => counts.bookmarked = *on,
            Mutation::Counts(new) => *counts = *new,
            Mutation::Edit { body, spoiler } => {
                post.body = body.clone();
                post.spoiler = spoiler.clone();
            }
            Mutation::Delete => (),
        }
        true
    }

    /// Drop all content, keeping the target
    pub fn reset(&mut self) {
        *self = Self::new(self.target.clone());
    }
}

fn toggle(flag: &mut bool, count: &mut u32, on: bool) {
    if *flag != on {
        *flag = on;
        *count = if on {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
    }
}

/// All caches, keyed by target
#[derive(Default)]
pub struct Caches {
    map: HashMap<FeedTarget, TimelineCache>,
}

impl Caches {
    pub fn get(&self, target: &FeedTarget) -> Option<&TimelineCache> {
        self.map.get(target)
    }

    pub fn entry(&mut self, target: &FeedTarget) -> &mut TimelineCache {
        self.map
            .entry(target.clone())
            .or_insert_with(|| TimelineCache::new(target.clone()))
    }

    /// Find a live copy of a post in any cache
    pub fn find(&self, id: &PostId) -> Option<&Post> {
        self.map.values().find_map(|c| c.get(id))
    }

    /// Apply a mutation to every cache that holds the post
    pub fn mutate(&mut self, id: &PostId, change: &Mutation) {
        for cache in self.map.values_mut() {
            cache.apply_local_mutation(id, change);
        }
    }

    /// Replace the post in every cache that holds it
    pub fn replace(&mut self, post: &Post) {
        for cache in self.map.values_mut() {
            cache.replace(post.clone());
        }
    }

    /// Append a new reply to every loaded thread containing its parent
    pub fn add_reply(&mut self, parent: &PostId, reply: &Post) {
        for (target, cache) in self.map.iter_mut() {
            if matches!(target, FeedTarget::Thread(_)) && cache.contains(parent) {
                cache.insert_tail(reply.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
