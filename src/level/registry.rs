use std::collections::{BTreeMap, HashMap};

use crate::entity::{Npc, Portal, Prop};
use crate::level::document::EntityKind;
use crate::scene::{NodeId, SceneBackend};

/// Editor bookkeeping for a live root node, kept beside the scene rather than on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMeta {
    pub index: usize,
    pub kind: EntityKind,
}

/// A wrapper taken out of the registry, still owning its scene objects.
pub enum LiveEntity {
    Npc(Npc),
    Portal(Portal),
    Prop(Prop),
}

impl LiveEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            LiveEntity::Npc(_) => EntityKind::Npc,
            LiveEntity::Portal(_) => EntityKind::Portal,
            LiveEntity::Prop(_) => EntityKind::Prop,
        }
    }

    pub fn root(&self) -> NodeId {
        match self {
            LiveEntity::Npc(npc) => npc.root(),
            LiveEntity::Portal(portal) => portal.root(),
            LiveEntity::Prop(prop) => prop.root(),
        }
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        match self {
            LiveEntity::Npc(npc) => npc.dispose(scene),
            LiveEntity::Portal(portal) => portal.dispose(scene),
            LiveEntity::Prop(prop) => prop.dispose(scene),
        }
    }
}

/// Index-addressed live entities. `objects`, `meta` and `npc_names` are derived from the
/// three wrapper maps and rebuilt after every structural change.
#[derive(Default)]
pub struct EntityRegistry {
    npcs: BTreeMap<usize, Npc>,
    portals: BTreeMap<usize, Portal>,
    props: BTreeMap<usize, Prop>,
    objects: BTreeMap<usize, NodeId>,
    npc_names: HashMap<String, usize>,
    meta: HashMap<NodeId, EntityMeta>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.npcs.len() + self.portals.len() + self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.objects.contains_key(&index)
    }

    pub fn kind_at(&self, index: usize) -> Option<EntityKind> {
        self.objects.get(&index).and_then(|node| self.meta.get(node)).map(|meta| meta.kind)
    }

    /// Occupied indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.objects.keys().copied().collect()
    }

    pub fn object(&self, index: usize) -> Option<NodeId> {
        self.objects.get(&index).copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn meta(&self, node: NodeId) -> Option<EntityMeta> {
        self.meta.get(&node).copied()
    }

    pub fn npc(&self, index: usize) -> Option<&Npc> {
        self.npcs.get(&index)
    }

    pub fn npc_mut(&mut self, index: usize) -> Option<&mut Npc> {
        self.npcs.get_mut(&index)
    }

    pub fn portal(&self, index: usize) -> Option<&Portal> {
        self.portals.get(&index)
    }

    pub fn portal_mut(&mut self, index: usize) -> Option<&mut Portal> {
        self.portals.get_mut(&index)
    }

    pub fn prop(&self, index: usize) -> Option<&Prop> {
        self.props.get(&index)
    }

    pub fn prop_mut(&mut self, index: usize) -> Option<&mut Prop> {
        self.props.get_mut(&index)
    }

    pub fn npcs(&self) -> impl Iterator<Item = (usize, &Npc)> {
        self.npcs.iter().map(|(&index, npc)| (index, npc))
    }

    pub fn portals_mut(&mut self) -> impl Iterator<Item = (usize, &mut Portal)> {
        self.portals.iter_mut().map(|(&index, portal)| (index, portal))
    }

    pub fn props_mut(&mut self) -> impl Iterator<Item = (usize, &mut Prop)> {
        self.props.iter_mut().map(|(&index, prop)| (index, prop))
    }

    pub fn npc_index(&self, name: &str) -> Option<usize> {
        self.npc_names.get(name).copied()
    }

    pub fn npc_by_name(&self, name: &str) -> Option<&Npc> {
        self.npc_index(name).and_then(|index| self.npcs.get(&index))
    }

    pub fn insert(&mut self, index: usize, entity: LiveEntity) -> Option<LiveEntity> {
        let displaced = self.take_raw(index);
        match entity {
            LiveEntity::Npc(npc) => {
                self.npcs.insert(index, npc);
            }
            LiveEntity::Portal(portal) => {
                self.portals.insert(index, portal);
            }
            LiveEntity::Prop(prop) => {
                self.props.insert(index, prop);
            }
        }
        self.rebuild_index();
        displaced
    }

    /// Remove whatever lives at `index` without disposing it.
    pub fn take(&mut self, index: usize) -> Option<LiveEntity> {
        let taken = self.take_raw(index);
        if taken.is_some() {
            self.rebuild_index();
        }
        taken
    }

    fn take_raw(&mut self, index: usize) -> Option<LiveEntity> {
        if let Some(npc) = self.npcs.remove(&index) {
            return Some(LiveEntity::Npc(npc));
        }
        if let Some(portal) = self.portals.remove(&index) {
            return Some(LiveEntity::Portal(portal));
        }
        self.props.remove(&index).map(LiveEntity::Prop)
    }

    /// Move every entity at `from` or above by `delta`. Callers vacate the slots the move
    /// lands on first, so keys never collide.
    pub fn shift_indices(&mut self, from: usize, delta: isize) {
        shift_map(&mut self.npcs, from, delta);
        shift_map(&mut self.portals, from, delta);
        shift_map(&mut self.props, from, delta);
        self.rebuild_index();
    }

    /// Bring NPC display names in line with `names` (index, name). Unnamed NPCs default to
    /// `npc_<index>`, so their names move with every shift.
    pub fn sync_npc_names(&mut self, names: impl IntoIterator<Item = (usize, String)>) {
        for (index, name) in names {
            if let Some(npc) = self.npcs.get_mut(&index).filter(|npc| npc.name() != name) {
                npc.set_name(name);
            }
        }
        self.rebuild_index();
    }

    /// Pick resolution: walk up from the hit node until a registered root is found.
    pub fn resolve_pick(&self, scene: &dyn SceneBackend, picked: NodeId) -> Option<EntityMeta> {
        let mut cursor = Some(picked);
        while let Some(node) = cursor {
            if let Some(meta) = self.meta.get(&node) {
                return Some(*meta);
            }
            cursor = scene.parent_of(node);
        }
        None
    }

    pub fn dispose_all(&mut self, scene: &mut dyn SceneBackend) {
        for npc in self.npcs.values_mut() {
            npc.dispose(scene);
        }
        for portal in self.portals.values_mut() {
            portal.dispose(scene);
        }
        for prop in self.props.values_mut() {
            prop.dispose(scene);
        }
        self.npcs.clear();
        self.portals.clear();
        self.props.clear();
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.objects.clear();
        self.meta.clear();
        self.npc_names.clear();
        for (&index, npc) in &self.npcs {
            self.objects.insert(index, npc.root());
            self.meta.insert(npc.root(), EntityMeta { index, kind: EntityKind::Npc });
            self.npc_names.entry(npc.name().to_string()).or_insert(index);
        }
        for (&index, portal) in &self.portals {
            self.objects.insert(index, portal.root());
            self.meta.insert(portal.root(), EntityMeta { index, kind: EntityKind::Portal });
        }
        for (&index, prop) in &self.props {
            self.objects.insert(index, prop.root());
            self.meta.insert(prop.root(), EntityMeta { index, kind: EntityKind::Prop });
        }
    }
}

fn shift_map<T>(map: &mut BTreeMap<usize, T>, from: usize, delta: isize) {
    let moved = map.split_off(&from);
    for (index, value) in moved {
        let target = index.checked_add_signed(delta).unwrap_or(0);
        map.insert(target, value);
    }
}
