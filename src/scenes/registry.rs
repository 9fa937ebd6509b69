// Scene registry and safe dispatch
//
// Owns every scene and the current id. Each call into a scene runs
// inside a fault boundary that catches returned errors and panics
// alike. The first fault swaps in the fallback scene for the rest of
// the process lifetime; there is no automatic retry.
//
// Navigation only follows the app's flow:
//   boot -> camera, camera -> settings | gallery, settings | gallery -> camera

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use super::fallback::FallbackScene;
use super::{Scene, SceneContext, SceneError, SceneEvent, SceneId, Transition};
use crate::display::Framebuffer;

const MAX_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEvent {
    pub from: SceneId,
    pub to: SceneId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Enter,
    Exit,
}

/// One completed `on_enter` or `on_exit`, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCall {
    pub scene: SceneId,
    pub hook: Hook,
}

impl core::fmt::Display for HookCall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let hook = match self.hook {
            Hook::Enter => "enter",
            Hook::Exit => "exit",
        };
        write!(f, "{}.{}", self.scene, hook)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub scene: SceneId,
    pub method: &'static str,
    pub detail: String,
}

pub const fn transition_allowed(from: SceneId, to: SceneId) -> bool {
    matches!(
        (from, to),
        (SceneId::Boot, SceneId::Camera)
            | (SceneId::Camera, SceneId::Settings)
            | (SceneId::Camera, SceneId::Gallery)
            | (SceneId::Settings, SceneId::Camera)
            | (SceneId::Gallery, SceneId::Camera)
    )
}

pub struct SceneRegistry {
    scenes: HashMap<SceneId, Box<dyn Scene>>,
    fallback: FallbackScene,
    current: SceneId,
    fault: Option<Fault>,
    history: Vec<NavEvent>,
    hooks: Vec<HookCall>,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self {
            scenes: HashMap::new(),
            fallback: FallbackScene::new(),
            current: SceneId::Boot,
            fault: None,
            history: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Initializes and stores `scene`. A scene that fails to initialize
    /// is dropped; navigating to it later lands on the fallback.
    pub fn register(&mut self, mut scene: Box<dyn Scene>, ctx: &mut SceneContext<'_>) {
        let id = scene.id();
        match guarded(id, "initialize", || scene.initialize(ctx)) {
            Ok(()) => {
                self.scenes.insert(id, scene);
            }
            Err(f) => log::error!("scene: {} not registered: {}", id, f.detail),
        }
    }

    pub fn is_registered(&self, id: SceneId) -> bool {
        self.scenes.contains_key(&id)
    }

    /// Enters the first scene without an exit.
    pub fn start(&mut self, id: SceneId, ctx: &mut SceneContext<'_>) {
        self.current = id;
        log::info!("scene: starting in {}", id);
        self.enter(id, ctx);
    }

    /// The scene being shown; Fallback once faulted.
    pub fn current(&self) -> SceneId {
        if self.fault.is_some() {
            SceneId::Fallback
        } else {
            self.current
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn history(&self) -> &[NavEvent] {
        &self.history
    }

    /// Last completed scene hooks, oldest first.
    pub fn hooks(&self) -> &[HookCall] {
        &self.hooks
    }

    fn record(&mut self, scene: SceneId, hook: Hook) {
        if self.hooks.len() == MAX_HISTORY {
            self.hooks.remove(0);
        }
        self.hooks.push(HookCall { scene, hook });
    }

    /// Returns true if the switch happened.
    pub fn goto(&mut self, to: SceneId, ctx: &mut SceneContext<'_>) -> bool {
        if self.fault.is_some() {
            return false;
        }
        let from = self.current;
        if from == to {
            return false;
        }
        if !transition_allowed(from, to) {
            log::warn!("scene: {} -> {} not allowed, ignored", from, to);
            return false;
        }

        if let Some(old) = self.scenes.get_mut(&from) {
            match guarded(from, "on_exit", || old.on_exit(ctx)) {
                Ok(()) => self.record(from, Hook::Exit),
                Err(f) => log::error!("scene: {}.on_exit failed: {}, continuing", from, f.detail),
            }
        }

        self.current = to;
        self.enter(to, ctx);
        if self.fault.is_none() {
            log::info!("scene: {} -> {}", from, to);
            if self.history.len() == MAX_HISTORY {
                self.history.remove(0);
            }
            self.history.push(NavEvent { from, to });
        }
        true
    }

    pub fn handle_event(&mut self, event: SceneEvent, ctx: &mut SceneContext<'_>) {
        if self.fault.is_some() {
            let _ = self.fallback.handle_event(event, ctx);
            return;
        }
        let id = self.current;
        let result = match self.scenes.get_mut(&id) {
            Some(s) => guarded(id, "handle_event", || s.handle_event(event, ctx)),
            None => Err(missing(id)),
        };
        self.follow(result, ctx);
    }

    pub fn update(&mut self, dt: Duration, ctx: &mut SceneContext<'_>) {
        if self.fault.is_some() {
            let _ = self.fallback.update(dt, ctx);
            return;
        }
        let id = self.current;
        let result = match self.scenes.get_mut(&id) {
            Some(s) => guarded(id, "update", || s.update(dt, ctx)),
            None => Err(missing(id)),
        };
        self.follow(result, ctx);
    }

    pub fn render(&mut self, fb: &mut Framebuffer, ctx: &mut SceneContext<'_>) {
        if self.fault.is_none() {
            let id = self.current;
            let result = match self.scenes.get_mut(&id) {
                Some(s) => guarded(id, "render", || s.render(fb, ctx)),
                None => Err(missing(id)),
            };
            match result {
                Ok(()) => return,
                Err(f) => self.trip(f, ctx),
            }
        }
        if let Err(e) = self.fallback.render(fb, ctx) {
            log::error!("scene: fallback render: {}", e);
        }
    }

    fn follow(&mut self, result: Result<Transition, Fault>, ctx: &mut SceneContext<'_>) {
        match result {
            Ok(Transition::None) => {}
            Ok(Transition::Goto(to)) => {
                self.goto(to, ctx);
            }
            Err(f) => self.trip(f, ctx),
        }
    }

    fn enter(&mut self, id: SceneId, ctx: &mut SceneContext<'_>) {
        let result = match self.scenes.get_mut(&id) {
            Some(s) => guarded(id, "on_enter", || s.on_enter(ctx)),
            None => Err(missing(id)),
        };
        match result {
            Ok(()) => self.record(id, Hook::Enter),
            Err(f) => self.trip(f, ctx),
        }
    }

    fn trip(&mut self, fault: Fault, ctx: &mut SceneContext<'_>) {
        log::error!(
            "scene: {}.{} failed: {}; switching to fallback",
            fault.scene,
            fault.method,
            fault.detail
        );
        // let the broken scene release what it can (camera preview)
        if fault.method != "on_exit"
            && let Some(s) = self.scenes.get_mut(&fault.scene)
        {
            let _ = guarded(fault.scene, "on_exit", || s.on_exit(ctx));
        }
        self.fallback.set_fault(&fault);
        let _ = self.fallback.on_enter(ctx);
        self.fault = Some(fault);
    }
}

fn missing(id: SceneId) -> Fault {
    Fault {
        scene: id,
        method: "lookup",
        detail: "scene not registered".into(),
    }
}

fn guarded<T>(
    scene: SceneId,
    method: &'static str,
    f: impl FnOnce() -> Result<T, SceneError>,
) -> Result<T, Fault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(Fault {
            scene,
            method,
            detail: e.to_string(),
        }),
        Err(payload) => Err(Fault {
            scene,
            method,
            detail: format!("panic: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown".into()
    }
}
