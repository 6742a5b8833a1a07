use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Deref;

use crate::model::{EnvProfile, EnvVariable};

pub const IMPORTED_PROFILE_NAME: &str = "Imported profile";

/// Partial edit of a profile's metadata and variables.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
    pub tags: Option<Vec<String>>,
    pub variables: Option<Vec<EnvVariable>>,
}

/// Every profile in display (insertion) order.
///
/// At most one profile is active; [`ProfileCollection::activate`] is the only
/// place that flips `is_active`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileCollection(Vec<EnvProfile>);

impl Deref for ProfileCollection {
    type Target = [EnvProfile];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<EnvProfile>> for ProfileCollection {
    fn from(profiles: Vec<EnvProfile>) -> Self {
        Self(profiles)
    }
}

impl IntoIterator for ProfileCollection {
    type Item = EnvProfile;
    type IntoIter = std::vec::IntoIter<EnvProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl ProfileCollection {
    pub fn push(&mut self, profile: EnvProfile) {
        self.0.push(profile);
    }

    pub fn get(&self, id: &str) -> Option<&EnvProfile> {
        self.0.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut EnvProfile> {
        self.0.iter_mut().find(|p| p.id == id)
    }

    /// Look a profile up by id, falling back to an exact name match.
    pub fn find(&self, reference: &str) -> Option<&EnvProfile> {
        self.get(reference)
            .or_else(|| self.0.iter().find(|p| p.name == reference))
    }

    pub fn active(&self) -> Option<&EnvProfile> {
        self.0.iter().find(|p| p.is_active)
    }

    pub fn create(&mut self, name: &str, description: Option<String>) -> &EnvProfile {
        let idx = self.0.len();
        self.0.push(EnvProfile::new(name, description));
        &self.0[idx]
    }

    pub fn create_from_variables(
        &mut self,
        name: Option<&str>,
        variables: Vec<EnvVariable>,
    ) -> &EnvProfile {
        let idx = self.0.len();
        self.0.push(
            EnvProfile::new(name.unwrap_or(IMPORTED_PROFILE_NAME), None).with_variables(variables),
        );
        &self.0[idx]
    }

    /// Append already re-stamped imported profiles.
    pub fn append_imported(&mut self, profiles: Vec<EnvProfile>) -> usize {
        let count = profiles.len();
        self.0.extend(profiles);
        count
    }

    pub fn update(&mut self, id: &str, update: ProfileUpdate) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        if let Some(name) = update.name {
            profile.name = name;
        }
        if let Some(description) = update.description {
            profile.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(group) = update.group {
            profile.group = Some(group).filter(|g| !g.is_empty());
        }
        if let Some(tags) = update.tags {
            profile.tags = Some(tags);
        }
        if let Some(variables) = update.variables {
            profile.variables = variables;
        }
        profile.touch();
        true
    }

    pub fn delete(&mut self, id: &str) -> Option<EnvProfile> {
        let idx = self.0.iter().position(|p| p.id == id)?;
        Some(self.0.remove(idx))
    }

    /// Mark `id` as the single active profile.
    ///
    /// Unknown ids leave every flag untouched.
    pub fn activate(&mut self, id: &str) -> Option<&EnvProfile> {
        let idx = self.0.iter().position(|p| p.id == id)?;
        for profile in &mut self.0 {
            profile.is_active = false;
        }
        self.0[idx].is_active = true;
        Some(&self.0[idx])
    }

    pub fn add_variable(&mut self, id: &str, variable: EnvVariable) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        profile.variables.push(variable);
        profile.touch();
        true
    }

    pub fn update_variable(&mut self, id: &str, index: usize, variable: EnvVariable) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        let Some(slot) = profile.variables.get_mut(index) else {
            return false;
        };
        *slot = variable;
        profile.touch();
        true
    }

    pub fn delete_variable(&mut self, id: &str, index: usize) -> Option<EnvVariable> {
        let profile = self.get_mut(id)?;
        if index >= profile.variables.len() {
            return None;
        }
        let removed = profile.variables.remove(index);
        profile.touch();
        Some(removed)
    }

    /// Replace the first variable with the same key, or append a new one.
    pub fn upsert_variable(&mut self, id: &str, variable: EnvVariable) -> bool {
        let existing = self.get(id).and_then(|p| p.position_of(&variable.key));
        match existing {
            Some(index) => self.update_variable(id, index, variable),
            None => self.add_variable(id, variable),
        }
    }

    pub fn add_tag(&mut self, id: &str, tag: &str) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        if profile.has_tag(tag) {
            return true;
        }
        profile.tags.get_or_insert_with(Vec::new).push(tag.to_string());
        profile.touch();
        true
    }

    pub fn remove_tag(&mut self, id: &str, tag: &str) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        let Some(tags) = profile.tags.as_mut() else {
            return false;
        };
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() == before {
            return false;
        }
        profile.touch();
        true
    }

    /// Drop a deleted tag from every profile. Returns how many were touched.
    pub fn remove_tag_everywhere(&mut self, tag: &str) -> usize {
        let ids: Vec<String> = self
            .0
            .iter()
            .filter(|p| p.has_tag(tag))
            .map(|p| p.id.clone())
            .collect();
        ids.iter().filter(|id| self.remove_tag(id, tag)).count()
    }

    pub fn set_group(&mut self, id: &str, group: Option<&str>) -> bool {
        let Some(profile) = self.get_mut(id) else {
            return false;
        };
        profile.group = group.filter(|g| !g.is_empty()).map(str::to_string);
        profile.touch();
        true
    }

    /// Distinct group names, sorted.
    pub fn groups(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|p| p.group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Profiles in `group` (if given) carrying any of `tags` (if non-empty).
    pub fn filtered<'a>(&'a self, group: Option<&str>, tags: &[String]) -> Vec<&'a EnvProfile> {
        self.0
            .iter()
            .filter(|p| group.is_none_or(|g| p.group.as_deref() == Some(g)))
            .filter(|p| tags.is_empty() || tags.iter().any(|t| p.has_tag(t)))
            .collect()
    }
}
