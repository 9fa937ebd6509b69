//! Touch hitboxes per scene
//!
//! Each scene owns an ordered list of rectangles bound to an
//! [`Action`]. Lookup is a linear scan in registration order and the
//! first match wins, so overlapping boxes resolve by file order.
//! The table is read-only once loaded.
//!
//! File layout:
//!
//! ```json
//! { "camera": { "hitboxes": [
//!     { "id": "settings_btn", "x": 400, "y": 20, "w": 64, "h": 64,
//!       "action": "go_to_settings" } ] } }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::board::{Action, UnknownAction};
use crate::scenes::SceneId;
use crate::ui::Region;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hitbox {
    pub id: String,
    pub region: Region,
    pub action: Action,
}

impl Hitbox {
    pub fn new(id: impl Into<String>, region: Region, action: Action) -> Self {
        Self {
            id: id.into(),
            region,
            action,
        }
    }

    #[inline]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.region.contains(x, y)
    }
}

/// Result of a successful hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit<'a> {
    pub id: &'a str,
    pub action: Action,
}

#[derive(Debug, thiserror::Error)]
pub enum HitboxError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing hitboxes: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown scene `{0}`")]
    UnknownScene(String),
    #[error("hitbox `{id}` in `{scene}`: {source}")]
    Action {
        scene: String,
        id: String,
        #[source]
        source: UnknownAction,
    },
}

#[derive(Deserialize)]
struct SceneEntry {
    #[serde(default)]
    hitboxes: Vec<RawHitbox>,
}

#[derive(Deserialize)]
struct RawHitbox {
    id: String,
    x: u16,
    y: u16,
    w: u16,
    h: u16,
    action: String,
}

#[derive(Debug, Default, Clone)]
pub struct HitboxEngine {
    sets: HashMap<SceneId, Vec<Hitbox>>,
}

impl HitboxEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to a scene's list; later boxes lose ties to earlier ones.
    pub fn register(&mut self, scene: SceneId, hitbox: Hitbox) {
        self.sets.entry(scene).or_default().push(hitbox);
    }

    pub fn hitboxes(&self, scene: SceneId) -> &[Hitbox] {
        self.sets.get(&scene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn hit_test(&self, scene: SceneId, x: u16, y: u16) -> Option<Hit<'_>> {
        self.hitboxes(scene)
            .iter()
            .find(|hb| hb.contains(x, y))
            .map(|hb| Hit {
                id: &hb.id,
                action: hb.action,
            })
    }

    pub fn len(&self) -> usize {
        self.sets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_json(data: &str) -> Result<Self, HitboxError> {
        // only the order inside each scene's array is significant
        let raw: HashMap<String, SceneEntry> = serde_json::from_str(data)?;
        let mut engine = Self::new();

        for (scene_name, entry) in raw {
            let scene = SceneId::from_name(&scene_name)
                .ok_or_else(|| HitboxError::UnknownScene(scene_name.clone()))?;
            for hb in entry.hitboxes {
                let action = hb.action.parse::<Action>().map_err(|source| HitboxError::Action {
                    scene: scene_name.clone(),
                    id: hb.id.clone(),
                    source,
                })?;
                engine.register(scene, Hitbox::new(hb.id, Region::new(hb.x, hb.y, hb.w, hb.h), action));
            }
        }

        Ok(engine)
    }

    /// Missing file is not fatal: the UI still works from keys and the encoder.
    pub fn load(path: &Path) -> Result<Self, HitboxError> {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("hitbox: {} not found, touch targets disabled", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(HitboxError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };

        let engine = Self::from_json(&data)?;
        log::info!("hitbox: loaded {} from {}", engine.len(), path.display());
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(boxes: &[(&str, Region, Action)]) -> HitboxEngine {
        let mut e = HitboxEngine::new();
        for (id, r, a) in boxes {
            e.register(SceneId::Camera, Hitbox::new(*id, *r, *a));
        }
        e
    }

    #[test]
    fn bounds_are_half_open() {
        let e = engine_with(&[("btn", Region::new(100, 200, 50, 40), Action::Capture)]);
        assert!(e.hit_test(SceneId::Camera, 100, 200).is_some());
        assert!(e.hit_test(SceneId::Camera, 149, 239).is_some());
        assert!(e.hit_test(SceneId::Camera, 150, 200).is_none());
        assert!(e.hit_test(SceneId::Camera, 100, 240).is_none());
    }

    #[test]
    fn first_registered_wins_on_overlap() {
        let e = engine_with(&[
            ("a", Region::new(0, 0, 100, 100), Action::GoToSettings),
            ("b", Region::new(50, 50, 100, 100), Action::GoToGallery),
        ]);
        let hit = e.hit_test(SceneId::Camera, 75, 75).unwrap();
        assert_eq!(hit.id, "a");
        assert_eq!(hit.action, Action::GoToSettings);
        assert_eq!(e.hit_test(SceneId::Camera, 120, 120).unwrap().id, "b");
    }

    #[test]
    fn unknown_scene_has_no_hits() {
        let e = engine_with(&[("a", Region::new(0, 0, 480, 800), Action::Capture)]);
        assert!(e.hit_test(SceneId::Gallery, 10, 10).is_none());
        assert!(e.hitboxes(SceneId::Settings).is_empty());
    }

    #[test]
    fn parses_file_layout_and_main_alias() {
        let json = r#"{
            "main": {"hitboxes": [
                {"id": "gear", "x": 400, "y": 10, "w": 70, "h": 70, "action": "go_to_settings"},
                {"id": "thumb", "x": 10, "y": 700, "w": 90, "h": 90, "action": "go_to_gallery"}
            ]},
            "gallery": {"hitboxes": [
                {"id": "trash", "x": 380, "y": 700, "w": 90, "h": 90, "action": "delete_photo"}
            ]},
            "boot": {}
        }"#;
        let e = HitboxEngine::from_json(json).unwrap();
        assert_eq!(e.len(), 3);
        let ids: Vec<&str> = e.hitboxes(SceneId::Camera).iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["gear", "thumb"]);
        assert_eq!(
            e.hit_test(SceneId::Gallery, 400, 750).map(|h| h.action),
            Some(Action::DeletePhoto)
        );
    }

    #[test]
    fn unknown_action_fails_the_load() {
        let json = r#"{"camera": {"hitboxes": [
            {"id": "x", "x": 0, "y": 0, "w": 1, "h": 1, "action": "self_destruct"}
        ]}}"#;
        match HitboxEngine::from_json(json) {
            Err(HitboxError::Action { id, .. }) => assert_eq!(id, "x"),
            other => panic!("expected action error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_scene_name_fails_the_load() {
        let json = r#"{"darkroom": {"hitboxes": []}}"#;
        assert!(matches!(
            HitboxEngine::from_json(json),
            Err(HitboxError::UnknownScene(s)) if s == "darkroom"
        ));
    }

    #[test]
    fn missing_file_yields_empty_engine() {
        let dir = tempfile::tempdir().unwrap();
        let e = HitboxEngine::load(&dir.path().join("nope.json")).unwrap();
        assert!(e.is_empty());
    }
}
