//! Deferred scene operations.
//!
//! Chunk logic never touches the ECS. It talks to a `SceneGraph`, which
//! records the logical state of every terrain object and queues the
//! matching operations. Once per frame `apply_scene_ops` replays the queue
//! against Bevy: mesh uploads first, then entity changes in call order.
use std::collections::HashMap;

use bevy::prelude::*;

use crate::generation::MeshData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Logical view of one terrain object.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub position: Vec3,
    pub parent: Option<Entity>,
    pub active: bool,
    pub mesh: Option<MeshId>,
    pub collider: Option<MeshId>,
    pub material: Handle<StandardMaterial>,
}

#[derive(Debug)]
pub enum SceneOp {
    Spawn(SceneObjectId),
    SetActive(SceneObjectId, bool),
    SetMesh(SceneObjectId, MeshId),
    SetCollider(SceneObjectId, MeshId),
    Despawn(SceneObjectId),
    ReleaseMesh(MeshId),
}

/// How many times each operation was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneCounters {
    pub spawned: usize,
    pub despawned: usize,
    pub active_changes: usize,
    pub mesh_sets: usize,
    pub collider_sets: usize,
    pub meshes_created: usize,
    pub meshes_released: usize,
}

/// Collision shape attached to a terrain entity.
#[derive(Component, Debug, Clone)]
pub struct TerrainCollider(pub Handle<Mesh>);

#[derive(Default)]
pub struct SceneGraph {
    objects: HashMap<SceneObjectId, SceneObject>,
    // Spawn ops need the object description after it may have been despawned.
    pending_spawns: HashMap<SceneObjectId, SceneObject>,
    uploads: Vec<(MeshId, Mesh)>,
    ops: Vec<SceneOp>,
    next_object: u32,
    next_mesh: u32,
    counters: SceneCounters,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inactive object under `parent`.
    pub fn spawn_object(
        &mut self,
        name: impl Into<String>,
        position: Vec3,
        parent: Option<Entity>,
        material: Handle<StandardMaterial>,
    ) -> SceneObjectId {
        let id = SceneObjectId(self.next_object);
        self.next_object += 1;
        let object = SceneObject {
            name: name.into(),
            position,
            parent,
            active: false,
            mesh: None,
            collider: None,
            material,
        };
        self.pending_spawns.insert(id, object.clone());
        self.objects.insert(id, object);
        self.ops.push(SceneOp::Spawn(id));
        self.counters.spawned += 1;
        id
    }

    pub fn set_active(&mut self, id: SceneObjectId, active: bool) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.active = active;
            self.ops.push(SceneOp::SetActive(id, active));
            self.counters.active_changes += 1;
        }
    }

    pub fn set_mesh(&mut self, id: SceneObjectId, mesh: MeshId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.mesh = Some(mesh);
            self.ops.push(SceneOp::SetMesh(id, mesh));
            self.counters.mesh_sets += 1;
        }
    }

    pub fn set_collider(&mut self, id: SceneObjectId, mesh: MeshId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.collider = Some(mesh);
            self.ops.push(SceneOp::SetCollider(id, mesh));
            self.counters.collider_sets += 1;
        }
    }

    pub fn despawn(&mut self, id: SceneObjectId) {
        if self.objects.remove(&id).is_some() {
            self.ops.push(SceneOp::Despawn(id));
            self.counters.despawned += 1;
        }
    }

    /// Build the Bevy mesh for `data` and queue its upload.
    pub fn create_mesh(&mut self, data: MeshData) -> MeshId {
        let id = MeshId(self.next_mesh);
        self.next_mesh += 1;
        self.uploads.push((id, data.into_mesh()));
        self.counters.meshes_created += 1;
        id
    }

    pub fn release_mesh(&mut self, id: MeshId) {
        self.ops.push(SceneOp::ReleaseMesh(id));
        self.counters.meshes_released += 1;
    }

    #[must_use]
    pub fn object(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn counters(&self) -> SceneCounters {
        self.counters
    }

    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.ops.len() + self.uploads.len()
    }
}

/// Scene ids resolved to live Bevy entities and mesh handles.
#[derive(Resource, Default)]
pub struct SceneBindings {
    pub entities: HashMap<SceneObjectId, Entity>,
    pub meshes: HashMap<MeshId, Handle<Mesh>>,
}

/// Replay the queued scene operations against the ECS.
pub fn apply_scene_ops(
    scene: &mut SceneGraph,
    bindings: &mut SceneBindings,
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
) {
    for (id, mesh) in scene.uploads.drain(..) {
        bindings.meshes.insert(id, meshes.add(mesh));
    }

    for op in std::mem::take(&mut scene.ops) {
        match op {
            SceneOp::Spawn(id) => {
                let Some(desc) = scene.pending_spawns.remove(&id) else { continue };
                let entity = commands
                    .spawn((
                        SpatialBundle {
                            transform: Transform::from_translation(desc.position),
                            visibility: Visibility::Hidden,
                            ..default()
                        },
                        desc.material,
                        Name::new(desc.name),
                    ))
                    .id();
                if let Some(parent) = desc.parent {
                    commands.entity(parent).add_child(entity);
                }
                bindings.entities.insert(id, entity);
            }
            SceneOp::SetActive(id, active) => {
                if let Some(mut e) = bindings.entities.get(&id).and_then(|e| commands.get_entity(*e)) {
                    e.insert(if active { Visibility::Inherited } else { Visibility::Hidden });
                }
            }
            SceneOp::SetMesh(id, mesh) => {
                let handle = bindings.meshes.get(&mesh).cloned();
                if let (Some(handle), Some(mut e)) =
                    (handle, bindings.entities.get(&id).and_then(|e| commands.get_entity(*e)))
                {
                    e.insert(handle);
                }
            }
            SceneOp::SetCollider(id, mesh) => {
                let handle = bindings.meshes.get(&mesh).cloned();
                if let (Some(handle), Some(mut e)) =
                    (handle, bindings.entities.get(&id).and_then(|e| commands.get_entity(*e)))
                {
                    e.insert(TerrainCollider(handle));
                }
            }
            SceneOp::Despawn(id) => {
                if let Some(entity) = bindings.entities.remove(&id)
                    && let Some(e) = commands.get_entity(entity)
                {
                    e.despawn_recursive();
                }
            }
            SceneOp::ReleaseMesh(id) => {
                if let Some(handle) = bindings.meshes.remove(&id) {
                    meshes.remove(&handle);
                }
            }
        }
    }
}
