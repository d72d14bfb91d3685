//! Offline directory backed by a JSON export of a social graph

use crate::directory::{DirectoryClient, Endpoint, Profile, Quota, UserId, UserRecord};
use crate::error::{DirectoryError, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One account in an exported directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedUser {
    pub id: UserId,
    pub name: String,
    pub screen_name: String,
    #[serde(default)]
    pub friends: Vec<UserId>,
    #[serde(default)]
    pub followers: Vec<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryExport {
    pub users: Vec<ExportedUser>,
}

/// A [`DirectoryClient`] answering from memory with an unlimited quota.
///
/// Ids that appear in follow lists without their own export entry are
/// returned with their numeric id as screen name.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, ExportedUser>,
    by_screen_name: HashMap<String, UserId>,
    /// Export order, which breaks ties between users sharing a display name
    order: Vec<UserId>,
}

impl StaticDirectory {
    pub fn from_export(export: DirectoryExport) -> Self {
        let mut directory = Self::default();
        for user in export.users {
            directory.insert(user);
        }
        directory
    }

    /// Load an export written as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        log::info!("Reading directory export: {}", path.display());

        let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        let export: DirectoryExport = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| StorageError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        log::info!("Directory export holds {} users", export.users.len());
        Ok(Self::from_export(export))
    }

    pub fn insert(&mut self, user: ExportedUser) {
        let id = user.id;
        self.by_screen_name.insert(user.screen_name.to_lowercase(), id);
        if self.users.insert(id, user).is_none() {
            self.order.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn profile(&self, id: UserId) -> Profile {
        match self.users.get(&id) {
            Some(user) => Profile {
                id,
                record: UserRecord::new(user.name.clone(), user.screen_name.clone()),
            },
            None => Profile {
                id,
                record: UserRecord::new(String::new(), id.to_string()),
            },
        }
    }
}

impl DirectoryClient for StaticDirectory {
    fn get_profile(&mut self, id_or_name: &str) -> Result<Profile, DirectoryError> {
        let needle = id_or_name.trim().trim_start_matches('@');

        if let Ok(raw) = needle.parse::<u64>() {
            if self.users.contains_key(&UserId(raw)) {
                return Ok(self.profile(UserId(raw)));
            }
        }

        if let Some(&id) = self.by_screen_name.get(&needle.to_lowercase()) {
            return Ok(self.profile(id));
        }

        self.order
            .iter()
            .find(|id| self.users.get(id).is_some_and(|user| user.name == needle))
            .map(|&id| self.profile(id))
            .ok_or_else(|| DirectoryError::UnknownUser(id_or_name.to_string()))
    }

    fn list(&mut self, endpoint: Endpoint, id: UserId, cap: usize) -> Result<Vec<Profile>, DirectoryError> {
        let Some(user) = self.users.get(&id) else {
            // Accounts outside the export have no visible connections
            return Ok(Vec::new());
        };

        let ids = match endpoint {
            Endpoint::Friends => &user.friends,
            Endpoint::Followers => &user.followers,
        };

        Ok(ids.iter().take(cap).map(|&other| self.profile(other)).collect())
    }

    fn quota(&mut self, _endpoint: Endpoint) -> Result<Quota, DirectoryError> {
        Ok(Quota {
            remaining: u32::MAX,
            reset_time: 0,
        })
    }
}
