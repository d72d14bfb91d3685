//! The remote social directory the crawler reads from

pub mod fixture;

use crate::error::DirectoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use fixture::StaticDirectory;

/// Opaque identifier of a network account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id)
    }
}

/// Display information recorded the first time a user is seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub screen_name: String,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, screen_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            screen_name: screen_name.into(),
        }
    }
}

/// A user as returned by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(flatten)]
    pub record: UserRecord,
}

impl Profile {
    pub fn new(id: impl Into<UserId>, name: &str, screen_name: &str) -> Self {
        Self {
            id: id.into(),
            record: UserRecord::new(name, screen_name),
        }
    }
}

/// Rate-limited listing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Friends,
    Followers,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::Friends, Endpoint::Followers];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Friends => "friends",
            Endpoint::Followers => "followers",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining calls on an endpoint and the unix time (seconds) the budget resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub remaining: u32,
    pub reset_time: i64,
}

/// Capability for reading profiles and follow lists from a social network.
///
/// Implementations paginate internally and return at most `cap` profiles,
/// in the order the network reports them.
pub trait DirectoryClient {
    /// Look up a user by numeric id or screen name
    fn get_profile(&mut self, id_or_name: &str) -> Result<Profile, DirectoryError>;

    /// List up to `cap` users on the given endpoint for `id`
    fn list(&mut self, endpoint: Endpoint, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError>;

    /// Current quota for an endpoint
    fn quota(&mut self, endpoint: Endpoint) -> Result<Quota, DirectoryError>;

    /// Accounts `id` follows
    fn list_friends(&mut self, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError> {
        self.list(Endpoint::Friends, id, cap)
    }

    /// Accounts following `id`
    fn list_followers(&mut self, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError> {
        self.list(Endpoint::Followers, id, cap)
    }
}

impl<D: DirectoryClient + ?Sized> DirectoryClient for &mut D {
    fn get_profile(&mut self, id_or_name: &str) -> Result<Profile, DirectoryError> {
        (**self).get_profile(id_or_name)
    }

    fn list(&mut self, endpoint: Endpoint, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError> {
        (**self).list(endpoint, id, cap)
    }

    fn quota(&mut self, endpoint: Endpoint) -> Result<Quota, DirectoryError> {
        (**self).quota(endpoint)
    }
}
