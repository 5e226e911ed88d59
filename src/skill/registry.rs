//! Static skill registry resolved once at startup.
//!
//! The registry maps a skill name to its descriptor and handler.
//! Registration order is preserved so `tools/list` output is stable.
//! Lookups return `Option` — an unknown name is an explicit not-found
//! result for the dispatcher to surface, never a panic.

use indexmap::IndexMap;

use crate::error::RegistryError;
use crate::skill::{ResourceDescriptor, Skill};

/// Ordered mapping of skill name → handler.
#[derive(Default)]
pub struct SkillRegistry {
    skills: IndexMap<String, Box<dyn Skill>>,
}

impl SkillRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a skill.
    ///
    /// # Errors
    ///
    /// Returns an error if a skill with the same name is already
    /// registered, or if any of the skill's resource URIs collides with
    /// a URI declared by a previously registered skill.
    pub fn register(&mut self, skill: Box<dyn Skill>) -> Result<(), RegistryError> {
        let descriptor = skill.descriptor();
        let name = descriptor.name.clone();

        if self.skills.contains_key(&name) {
            return Err(RegistryError::DuplicateSkill { name });
        }

        for resource in &descriptor.resources {
            if self.resource_owner(&resource.uri).is_some() {
                return Err(RegistryError::DuplicateResourceUri {
                    uri: resource.uri.clone(),
                });
            }
        }

        self.skills.insert(name, skill);
        Ok(())
    }

    /// Looks up a skill by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Skill> {
        self.skills.get(name).map(AsRef::as_ref)
    }

    /// Iterates over registered skills in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Skill> {
        self.skills.values().map(AsRef::as_ref)
    }

    /// Returns the skill declaring `uri`, if any.
    ///
    /// A URI declared by no registered skill resolves to `None`; the
    /// dispatcher converts that into a not-found error.
    #[must_use]
    pub fn resource_owner(&self, uri: &str) -> Option<&dyn Skill> {
        self.iter()
            .find(|skill| skill.descriptor().resources.iter().any(|r| r.uri == uri))
    }

    /// Collects resource descriptors across all skills, in registration
    /// order.
    #[must_use]
    pub fn resource_descriptors(&self) -> Vec<&ResourceDescriptor> {
        self.iter()
            .flat_map(|skill| skill.descriptor().resources.iter())
            .collect()
    }

    /// Returns the number of registered skills.
    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
