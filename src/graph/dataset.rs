//! Crawl output: user records and the follow adjacency list

use crate::directory::{UserId, UserRecord};
use crate::graph::ordered::OrderedMap;
use serde::{Deserialize, Serialize};

/// Friend and follower ids recorded for one user, in fetch order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyEntry {
    /// Accounts this user follows
    pub friends: Vec<UserId>,

    /// Accounts following this user
    pub followers: Vec<UserId>,
}

/// Every user observed so far, keyed by id
pub type Visited = OrderedMap<UserRecord>;

/// Follow lists per visited user
pub type Adjacency = OrderedMap<AdjacencyEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// Never observed
    Unvisited,
    /// Observed and queued, lists not fetched yet
    Frontier,
    /// Friends and followers fetched
    Explored,
}

/// Users and adjacency collected by a crawl.
///
/// Both maps always hold the same ids in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub visited: Visited,
    pub adjacency: Adjacency,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly observed user with an empty adjacency entry.
    ///
    /// Returns `false` if the user was already known; the existing record is
    /// kept as is.
    pub fn observe(&mut self, id: UserId, record: UserRecord) -> bool {
        if !self.visited.insert_new(id, record) {
            return false;
        }
        self.adjacency.insert_new(id, AdjacencyEntry::default());
        true
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.visited.contains(id)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn record(&self, id: &UserId) -> Option<&UserRecord> {
        self.visited.get(id)
    }

    pub fn screen_name(&self, id: &UserId) -> Option<&str> {
        self.record(id).map(|r| r.screen_name.as_str())
    }

    pub fn push_friend(&mut self, id: &UserId, friend: UserId) {
        if let Some(entry) = self.adjacency.get_mut(id) {
            entry.friends.push(friend);
        }
    }

    pub fn push_follower(&mut self, id: &UserId, follower: UserId) {
        if let Some(entry) = self.adjacency.get_mut(id) {
            entry.followers.push(follower);
        }
    }

    /// State of `id` given the crawler's current frontier
    pub fn visit_state(&self, id: &UserId, frontier: &[UserId]) -> VisitState {
        if !self.contains(id) {
            VisitState::Unvisited
        } else if frontier.contains(id) {
            VisitState::Frontier
        } else {
            VisitState::Explored
        }
    }

    /// Whether the user and adjacency maps cover the same ids in the same
    /// order, and every listed friend or follower is itself a key
    pub fn is_consistent(&self) -> bool {
        if !self.visited.keys().eq(self.adjacency.keys()) {
            return false;
        }
        self.adjacency.values().all(|entry| {
            entry
                .friends
                .iter()
                .chain(entry.followers.iter())
                .all(|id| self.adjacency.contains(id))
        })
    }

    /// Total number of recorded friend and follower links
    pub fn link_count(&self) -> usize {
        self.adjacency
            .values()
            .map(|e| e.friends.len() + e.followers.len())
            .sum()
    }
}
