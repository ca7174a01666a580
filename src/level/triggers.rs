use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use super::runtime::Level;
use crate::dialogue::DialogueEvent;
use crate::events::LevelEvent;
use crate::level::document::{EntitySpawn, Trigger, TriggerAction};

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerState {
    pub trigger: Trigger,
    pub triggered: bool,
    inside: bool,
}

/// Proximity bookkeeping: which NPCs the player is currently visiting, and the armed
/// state of every declared trigger.
#[derive(Debug, Default)]
pub struct TriggerBook {
    visits: BTreeSet<usize>,
    declared: Vec<TriggerState>,
}

impl TriggerBook {
    /// Reset to the document's triggers, all unfired.
    pub fn arm(&mut self, triggers: &[Trigger]) {
        self.visits.clear();
        self.declared =
            triggers.iter().map(|trigger| TriggerState { trigger: trigger.clone(), triggered: false, inside: false }).collect();
    }

    /// Swap definitions while keeping the fired state of ids that survive.
    pub fn replace(&mut self, triggers: &[Trigger]) {
        let previous = std::mem::take(&mut self.declared);
        self.declared = triggers
            .iter()
            .map(|trigger| {
                let kept = previous.iter().find(|state| state.trigger.id == trigger.id);
                TriggerState {
                    trigger: trigger.clone(),
                    triggered: kept.map_or(false, |state| state.triggered),
                    inside: kept.map_or(false, |state| state.inside),
                }
            })
            .collect();
    }

    pub fn states(&self) -> &[TriggerState] {
        &self.declared
    }

    pub fn is_triggered(&self, id: &str) -> bool {
        self.declared.iter().any(|state| state.trigger.id == id && state.triggered)
    }

    /// Whether the NPC at `index` has fired during the player's current visit.
    pub fn is_visiting(&self, index: usize) -> bool {
        self.visits.contains(&index)
    }

    pub(super) fn forget_visit(&mut self, index: usize) {
        self.visits.remove(&index);
    }

    pub(super) fn shift_visits(&mut self, from: usize, delta: isize) {
        let moved = self.visits.split_off(&from);
        self.visits.extend(moved.into_iter().filter_map(|index| index.checked_add_signed(delta)));
    }
}

impl Level {
    /// Start at most one NPC conversation per tick. An NPC fires once per visit and is
    /// re-armed when the player steps out of range.
    pub(super) fn check_npc_proximity(&mut self) {
        if self.services.dialogue.borrow().is_active() {
            return;
        }
        let radius = self.config.interaction_radius;
        let player = self.player.position;
        let mut hit = None;
        {
            let scene = self.services.scene.borrow();
            for (index, npc) in self.registry.npcs() {
                let Some(transform) = scene.transform(npc.root()) else {
                    continue;
                };
                if transform.position.distance(player) > radius {
                    self.triggers.forget_visit(index);
                    continue;
                }
                if hit.is_none() && self.triggers.visits.insert(index) {
                    hit = Some(index);
                }
            }
        }
        if let Some(index) = hit {
            self.dispatch_npc(index);
        }
    }

    fn dispatch_npc(&mut self, index: usize) {
        let Some(EntitySpawn::Npc(spawn)) = self.doc.entities.get(index).cloned() else {
            return;
        };
        let Some(name) = self.registry.npc(index).map(|npc| npc.name().to_string()) else {
            return;
        };
        info!(level = %self.doc.id, index, npc = %name, "npc interaction");
        self.events.push(LevelEvent::NpcInteraction { index, name: name.clone() });
        if let Some(npc) = self.registry.npc_mut(index) {
            npc.play_interact(&mut *self.services.scene.borrow_mut());
        }

        let talking = {
            let mut dialogue = self.services.dialogue.borrow_mut();
            let quest_ran = spawn
                .quest
                .as_ref()
                .filter(|quest| !quest.is_empty())
                .map_or(false, |quest| dialogue.run_quest(quest, Some(&name)));
            if quest_ran {
                debug!(npc = %name, "npc quest ran; requirements fallback skipped");
            } else if dialogue.vars().has_items(&spawn.requirements) {
                for reward in &spawn.rewards {
                    dialogue.vars_mut().add_item(reward, 1);
                    info!(npc = %name, item = %reward, "npc reward granted");
                    self.events.push(LevelEvent::Dialogue(DialogueEvent::Reward { item: reward.clone(), amount: 1 }));
                }
                dialogue.play_lines(format!("npc:{name}"), Some(&name), &spawn.success_dialogue);
            } else {
                debug!(npc = %name, requirements = ?spawn.requirements, "npc requirements not met");
                dialogue.play_lines(format!("npc:{name}"), Some(&name), &spawn.fail_dialogue);
            }
            dialogue.is_active()
        };

        if talking {
            self.talking_npc = Some(index);
        } else if let Some(npc) = self.registry.npc_mut(index) {
            npc.play_idle(&mut *self.services.scene.borrow_mut());
        }
    }

    /// Fire declared triggers whose target NPC is within range. `once` triggers fire a
    /// single time per load; the others fire on every entry into the radius.
    pub(super) fn run_triggers(&mut self) {
        let player = self.player.position;
        let mut fired = Vec::new();
        {
            let scene = self.services.scene.borrow();
            for (slot, state) in self.triggers.declared.iter_mut().enumerate() {
                if state.triggered && state.trigger.once {
                    continue;
                }
                let Some(npc) = self.registry.npc_by_name(&state.trigger.target) else {
                    trace!(trigger = %state.trigger.id, target = %state.trigger.target, "trigger target not spawned");
                    continue;
                };
                let Some(transform) = scene.transform(npc.root()) else {
                    continue;
                };
                let inside = transform.position.distance(player) <= state.trigger.radius;
                let entered = inside && !state.inside;
                state.inside = inside;
                if entered {
                    state.triggered = true;
                    fired.push(slot);
                }
            }
        }
        for slot in fired {
            let trigger = self.triggers.declared[slot].trigger.clone();
            info!(level = %self.doc.id, trigger = %trigger.id, "trigger fired");
            self.events.push(LevelEvent::TriggerFired { id: trigger.id.clone() });
            for action in &trigger.actions {
                self.run_action(action);
            }
        }
    }

    fn run_action(&mut self, action: &TriggerAction) {
        match action {
            TriggerAction::Dialogue { id } => {
                self.services.dialogue.borrow_mut().play(id);
            }
            TriggerAction::Sound { key, volume } => {
                self.services.audio.borrow_mut().play(key, false, *volume);
            }
            TriggerAction::Light { intensity } => self.player.spotlight_intensity = *intensity,
        }
    }
}
