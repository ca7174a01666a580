//! Long-lived services shared by every level, built once by the composition root.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::audio::AudioService;
use crate::dialogue::DialogueEngine;
use crate::scene::SceneBackend;

pub type SharedScene = Rc<RefCell<dyn SceneBackend>>;
pub type SharedAudio = Rc<RefCell<dyn AudioService>>;
pub type SharedDialogue = Rc<RefCell<DialogueEngine>>;

#[derive(Clone)]
pub struct Services {
    pub scene: SharedScene,
    pub audio: SharedAudio,
    pub dialogue: SharedDialogue,
}

impl Services {
    pub fn new(scene: SharedScene, audio: SharedAudio) -> Self {
        Self { scene, audio, dialogue: Rc::new(RefCell::new(DialogueEngine::new())) }
    }

    pub fn with_dialogue(mut self, dialogue: SharedDialogue) -> Self {
        self.dialogue = dialogue;
        self
    }
}

/// Flag checked after every asset await. Once set, freshly loaded bundles are torn down
/// instead of attached.
#[derive(Debug, Clone, Default)]
pub struct LoadCancel(Rc<Cell<bool>>);

impl LoadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}
