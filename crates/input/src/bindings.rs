use crate::action::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("empty key name")]
    EmptyKey,
    #[error("key {0} cannot be bound to a look action")]
    LookNotBindable(String),
}

/// Key name to action map.
///
/// Key names follow the physical key codes of the window layer: `"KeyW"`,
/// `"Space"`, `"F5"`, `"Escape"`, `"ArrowUp"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Action>", into = "BTreeMap<String, Action>")]
pub struct KeyBindings {
    map: BTreeMap<String, Action>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let map = [
            ("KeyW", Action::MoveForward),
            ("KeyS", Action::MoveBack),
            ("KeyA", Action::StrafeLeft),
            ("KeyD", Action::StrafeRight),
            ("ArrowUp", Action::MoveForward),
            ("ArrowDown", Action::MoveBack),
            ("ArrowLeft", Action::StrafeLeft),
            ("ArrowRight", Action::StrafeRight),
            ("Space", Action::Jump),
            ("KeyE", Action::Interact),
            ("F5", Action::Save),
            ("F9", Action::Load),
            ("F1", Action::ToggleHud),
            ("Escape", Action::Pause),
        ]
        .into_iter()
        .map(|(k, a)| (k.to_string(), a))
        .collect();
        Self { map }
    }
}

impl TryFrom<BTreeMap<String, Action>> for KeyBindings {
    type Error = BindingError;

    fn try_from(map: BTreeMap<String, Action>) -> Result<Self, Self::Error> {
        let mut bindings = Self::empty();
        for (key, action) in map {
            bindings.bind(key, action)?;
        }
        Ok(bindings)
    }
}

impl From<KeyBindings> for BTreeMap<String, Action> {
    fn from(bindings: KeyBindings) -> Self {
        bindings.map
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Bind `key`, replacing any previous binding. Returns the old action.
    pub fn bind(
        &mut self,
        key: impl Into<String>,
        action: Action,
    ) -> Result<Option<Action>, BindingError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(BindingError::EmptyKey);
        }
        if matches!(action, Action::Look(_)) {
            return Err(BindingError::LookNotBindable(key));
        }
        let old = self.map.insert(key, action);
        if let Some(prev) = old {
            tracing::debug!(?prev, ?action, "key rebound");
        }
        Ok(old)
    }

    pub fn unbind(&mut self, key: &str) -> Option<Action> {
        self.map.remove(key)
    }

    pub fn action_for(&self, key: &str) -> Option<Action> {
        self.map.get(key).copied()
    }

    /// Keys bound to `action`, in name order.
    pub fn keys_for(&self, action: Action) -> impl Iterator<Item = &str> {
        self.map
            .iter()
            .filter(move |(_, a)| **a == action)
            .map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Action)> {
        self.map.iter().map(|(k, a)| (k.as_str(), *a))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn defaults_cover_wasd_and_commands() {
        let b = KeyBindings::default();
        assert_eq!(b.action_for("KeyW"), Some(Action::MoveForward));
        assert_eq!(b.action_for("KeyA"), Some(Action::StrafeLeft));
        assert_eq!(b.action_for("Space"), Some(Action::Jump));
        assert_eq!(b.action_for("KeyE"), Some(Action::Interact));
        assert_eq!(b.action_for("F5"), Some(Action::Save));
        assert_eq!(b.action_for("F9"), Some(Action::Load));
        assert_eq!(b.action_for("F1"), Some(Action::ToggleHud));
        assert_eq!(b.action_for("Escape"), Some(Action::Pause));
        assert_eq!(b.action_for("KeyQ"), None);
    }

    #[test]
    fn rebinding_replaces() {
        let mut b = KeyBindings::default();
        let old = b.bind("KeyW", Action::Jump).unwrap();
        assert_eq!(old, Some(Action::MoveForward));
        assert_eq!(b.action_for("KeyW"), Some(Action::Jump));
        let forward: Vec<&str> = b.keys_for(Action::MoveForward).collect();
        assert_eq!(forward, vec!["ArrowUp"]);
    }

    #[test]
    fn look_and_empty_keys_rejected() {
        let mut b = KeyBindings::empty();
        assert_eq!(b.bind("  ", Action::Jump), Err(BindingError::EmptyKey));
        assert!(matches!(
            b.bind("KeyL", Action::Look(Vec2::ONE)),
            Err(BindingError::LookNotBindable(_))
        ));
        assert!(b.is_empty());
    }

    #[test]
    fn loads_from_yaml_map() {
        let b: KeyBindings = serde_yaml::from_str("KeyZ: move_forward\nKeyQ: strafe_left\n").unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.action_for("KeyZ"), Some(Action::MoveForward));
    }

    #[test]
    fn round_trips_through_yaml() {
        let b = KeyBindings::default();
        let text = serde_yaml::to_string(&b).unwrap();
        let back: KeyBindings = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, b);
    }
}
