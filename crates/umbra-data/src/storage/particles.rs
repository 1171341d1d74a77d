// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Particles store with a CPU simulation model.
//!
//! The model tracks how many particles are alive, not where each one is. Emission
//! ramps up over the first lifetime according to the explosiveness ratio, stays at
//! `amount` while emitting, and the system goes inactive one lifetime after
//! emission stops.

use crate::handle::HandleTable;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use umbra_core::backend::{BackendBufferId, INSTANCE_FLOATS};
use umbra_core::math::{Aabb, Mat4, Vec3};
use umbra_core::{ResourceKind, Rid, ServerError};

/// Smallest accepted lifetime, in seconds.
pub const MIN_LIFETIME: f32 = 0.001;

/// Maximum number of draw passes.
pub const MAX_DRAW_PASSES: usize = 4;

/// A particle system.
#[derive(Debug, Clone)]
pub struct Particles {
    /// Whether new particles are emitted.
    pub emitting: bool,
    /// Particles alive at full emission.
    pub amount: u32,
    /// Seconds a particle lives.
    pub lifetime: f32,
    /// Stop emitting after one lifetime.
    pub one_shot: bool,
    /// Simulated seconds applied on (re)start.
    pub pre_process_time: f32,
    /// 0 emits gradually, 1 emits everything at once.
    pub explosiveness: f32,
    /// Per-particle size jitter, 0 to 1.
    pub randomness: f32,
    /// Simulation speed multiplier.
    pub speed_scale: f32,
    /// Bounds overriding the default visibility box.
    pub custom_aabb: Option<Aabb>,
    /// Process material, or [`Rid::INVALID`].
    pub process_material: Rid,
    /// Meshes drawn per particle, one per pass.
    pub draw_passes: Vec<Rid>,
    /// Seconds since emission (re)started.
    pub time: f32,
    /// Clock value at which emission stopped.
    pub stopped_at: Option<f32>,
    /// Particles alive.
    pub active_count: u32,
    /// The system finished and is not simulated any more.
    pub inactive: bool,
    /// Simulation was requested for the next tick.
    pub pending_process: bool,
    /// Instance data seed.
    pub seed: u64,
    /// The realized instance buffer.
    pub backend: Option<BackendBufferId>,
}

impl Particles {
    /// Visibility box used without a custom AABB.
    pub const DEFAULT_AABB: Aabb = Aabb {
        min: Vec3::splat(-4.0),
        max: Vec3::splat(4.0),
    };

    fn new(seed: u64) -> Self {
        Self {
            emitting: false,
            amount: 8,
            lifetime: 1.0,
            one_shot: false,
            pre_process_time: 0.0,
            explosiveness: 0.0,
            randomness: 0.0,
            speed_scale: 1.0,
            custom_aabb: None,
            process_material: Rid::INVALID,
            draw_passes: vec![Rid::INVALID],
            time: 0.0,
            stopped_at: None,
            active_count: 0,
            inactive: true,
            pending_process: false,
            seed,
            backend: None,
        }
    }

    /// Bounds of the emitted particles.
    pub fn aabb(&self) -> Aabb {
        self.custom_aabb.unwrap_or(Self::DEFAULT_AABB)
    }

    /// Starts a new emission cycle with the pre-process time already simulated.
    pub fn restart(&mut self) {
        self.time = 0.0;
        self.stopped_at = None;
        self.inactive = false;
        self.emitting = true;
        self.active_count = 0;
        self.advance(self.pre_process_time);
    }

    /// Advances the simulation by `delta` seconds of wall time.
    pub fn process(&mut self, delta: f32) {
        self.pending_process = false;
        if self.inactive {
            return;
        }
        self.advance(delta * self.speed_scale);
    }

    fn advance(&mut self, dt: f32) {
        self.time += dt.max(0.0);
        if self.emitting {
            self.active_count = self.emitted_at(self.time);
            if !(self.one_shot && self.time >= self.lifetime) {
                return;
            }
            self.emitting = false;
            self.stopped_at = Some(self.lifetime);
        }
        match self.stopped_at {
            Some(stop) if self.time - stop >= self.lifetime => {
                self.active_count = 0;
                self.inactive = true;
            }
            Some(_) => {}
            None => {
                self.active_count = 0;
                self.inactive = true;
            }
        }
    }

    fn emitted_at(&self, t: f32) -> u32 {
        if t >= self.lifetime {
            return self.amount;
        }
        let e = self.explosiveness;
        let fraction = e + (1.0 - e) * t / self.lifetime;
        ((self.amount as f32 * fraction).ceil() as u32).min(self.amount)
    }

    /// One instance per active particle in the backend layout, scattered inside the
    /// visibility box.
    pub fn instance_data(&self) -> Vec<f32> {
        let aabb = self.aabb();
        let extent = aabb.max - aabb.min;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = Vec::with_capacity(self.active_count as usize * INSTANCE_FLOATS);
        for _ in 0..self.active_count {
            let position = Vec3::new(
                aabb.min.x + extent.x * rng.random_range(0.0..1.0),
                aabb.min.y + extent.y * rng.random_range(0.0..1.0),
                aabb.min.z + extent.z * rng.random_range(0.0..1.0),
            );
            let scale = 1.0 - self.randomness * rng.random_range(0.0..1.0f32);
            let transform = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(scale));
            out.extend_from_slice(&transform.to_rows_3x4());
            out.extend_from_slice(&[1.0, 1.0, 1.0, 1.0]);
        }
        out
    }
}

/// Storage for every particle system.
#[derive(Debug)]
pub struct ParticlesStore {
    particles: HandleTable<Particles>,
}

impl Default for ParticlesStore {
    fn default() -> Self {
        Self {
            particles: HandleTable::new(ResourceKind::Particles),
        }
    }
}

store_access!(ParticlesStore, Particles, particles);

impl ParticlesStore {
    /// Creates a stopped particle system.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.particles.insert(rid, Particles::new(rid.to_u64()))
    }

    /// Starts or stops emission. Starting an inactive system restarts it.
    pub fn set_emitting(&mut self, rid: Rid, emitting: bool) -> Result<(), ServerError> {
        let p = self.particles.lookup_mut(rid)?;
        if emitting == p.emitting {
            return Ok(());
        }
        if emitting {
            if p.inactive {
                p.restart();
            } else {
                p.emitting = true;
                p.stopped_at = None;
            }
        } else {
            p.emitting = false;
            p.stopped_at = Some(p.time);
        }
        Ok(())
    }

    /// Whether the system emits; false for unknown handles.
    pub fn is_emitting(&self, rid: Rid) -> bool {
        self.particles.get(rid).is_some_and(|p| p.emitting)
    }

    /// Sets the particle count at full emission, at least 1.
    pub fn set_amount(&mut self, rid: Rid, amount: u32) -> Result<(), ServerError> {
        let p = self.particles.lookup_mut(rid)?;
        p.amount = amount.max(1);
        p.active_count = p.active_count.min(p.amount);
        Ok(())
    }

    /// Sets the particle lifetime in seconds.
    pub fn set_lifetime(&mut self, rid: Rid, lifetime: f32) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.lifetime = lifetime.max(MIN_LIFETIME);
        Ok(())
    }

    /// Enables one-shot emission.
    pub fn set_one_shot(&mut self, rid: Rid, one_shot: bool) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.one_shot = one_shot;
        Ok(())
    }

    /// Sets the time simulated on (re)start.
    pub fn set_pre_process_time(&mut self, rid: Rid, time: f32) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.pre_process_time = time.max(0.0);
        Ok(())
    }

    /// Sets the explosiveness ratio, clamped to `0..=1`.
    pub fn set_explosiveness_ratio(&mut self, rid: Rid, ratio: f32) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.explosiveness = ratio.clamp(0.0, 1.0);
        Ok(())
    }

    /// Sets the randomness ratio, clamped to `0..=1`.
    pub fn set_randomness_ratio(&mut self, rid: Rid, ratio: f32) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.randomness = ratio.clamp(0.0, 1.0);
        Ok(())
    }

    /// Sets the simulation speed multiplier.
    pub fn set_speed_scale(&mut self, rid: Rid, scale: f32) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.speed_scale = scale.max(0.0);
        Ok(())
    }

    /// Overrides the visibility box. An invalid box restores the default.
    pub fn set_custom_aabb(&mut self, rid: Rid, aabb: Aabb) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.custom_aabb = aabb.is_valid().then_some(aabb);
        Ok(())
    }

    /// Sets the process material.
    pub fn set_process_material(&mut self, rid: Rid, material: Rid) -> Result<(), ServerError> {
        if material.is_valid() {
            ServerError::check_kind(material, ResourceKind::Material)?;
        }
        self.particles.lookup_mut(rid)?.process_material = material;
        Ok(())
    }

    /// Resizes the draw pass list; new passes draw nothing.
    pub fn set_draw_passes(&mut self, rid: Rid, count: usize) -> Result<(), ServerError> {
        if count > MAX_DRAW_PASSES {
            return Err(ServerError::MalformedData(format!(
                "{count} draw passes exceeds the maximum of {MAX_DRAW_PASSES}"
            )));
        }
        self.particles
            .lookup_mut(rid)?
            .draw_passes
            .resize(count, Rid::INVALID);
        Ok(())
    }

    /// Sets the mesh of one draw pass.
    pub fn set_draw_pass_mesh(&mut self, rid: Rid, pass: usize, mesh: Rid) -> Result<(), ServerError> {
        if mesh.is_valid() {
            ServerError::check_kind(mesh, ResourceKind::Mesh)?;
        }
        let p = self.particles.lookup_mut(rid)?;
        let count = p.draw_passes.len();
        let slot = p.draw_passes.get_mut(pass).ok_or_else(|| {
            ServerError::MalformedData(format!("draw pass {pass} out of range for {count}"))
        })?;
        *slot = mesh;
        Ok(())
    }

    /// Marks the system for simulation on the next tick.
    pub fn request_process(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.pending_process = true;
        Ok(())
    }

    /// Restarts emission from time zero.
    pub fn restart(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.particles.lookup_mut(rid)?.restart();
        Ok(())
    }

    /// Whether the system finished; true for unknown handles.
    pub fn is_inactive(&self, rid: Rid) -> bool {
        self.particles.get(rid).map_or(true, |p| p.inactive)
    }

    /// Particles alive; 0 for unknown handles.
    pub fn active_count(&self, rid: Rid) -> u32 {
        self.particles.get(rid).map_or(0, |p| p.active_count)
    }

    /// Simulates every system with a pending request.
    ///
    /// ## Returns
    /// The handles that were processed.
    pub fn process_pending(&mut self, delta: f32) -> Vec<Rid> {
        let mut processed = Vec::new();
        for (rid, p) in self.particles.iter_mut() {
            if p.pending_process {
                p.process(delta);
                processed.push(rid);
            }
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(store: &mut ParticlesStore) -> Rid {
        let rid = Rid::from_parts(0, 1, ResourceKind::Particles);
        store.create(rid).unwrap();
        store.set_amount(rid, 10).unwrap();
        store.set_lifetime(rid, 2.0).unwrap();
        rid
    }

    #[test]
    fn gradual_emission_ramps_up() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_emitting(rid, true).unwrap();
        assert_eq!(store.active_count(rid), 0);

        store.request_process(rid).unwrap();
        store.process_pending(0.5);
        assert_eq!(store.active_count(rid), 3);

        store.request_process(rid).unwrap();
        store.process_pending(2.0);
        assert_eq!(store.active_count(rid), 10);
        assert!(!store.is_inactive(rid));
    }

    #[test]
    fn explosive_emission_starts_full() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_explosiveness_ratio(rid, 4.0).unwrap();
        assert_eq!(store.get(rid).unwrap().explosiveness, 1.0);
        store.set_emitting(rid, true).unwrap();
        store.request_process(rid).unwrap();
        store.process_pending(0.01);
        assert_eq!(store.active_count(rid), 10);
    }

    #[test]
    fn one_shot_stops_then_goes_inactive() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_one_shot(rid, true).unwrap();
        store.set_emitting(rid, true).unwrap();

        store.get_mut(rid).unwrap().process(2.5);
        assert!(!store.is_emitting(rid));
        assert!(!store.is_inactive(rid));

        store.get_mut(rid).unwrap().process(1.5);
        assert!(store.is_inactive(rid));
        assert_eq!(store.active_count(rid), 0);
    }

    #[test]
    fn pre_process_and_speed_scale() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_pre_process_time(rid, 1.0).unwrap();
        store.restart(rid).unwrap();
        assert_eq!(store.active_count(rid), 5);

        store.set_speed_scale(rid, 2.0).unwrap();
        store.get_mut(rid).unwrap().process(0.25);
        assert_eq!(store.active_count(rid), 8);
    }

    #[test]
    fn unrequested_systems_are_not_processed() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_emitting(rid, true).unwrap();
        assert!(store.process_pending(1.0).is_empty());
        assert_eq!(store.active_count(rid), 0);
    }

    #[test]
    fn instance_data_stays_in_bounds() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_explosiveness_ratio(rid, 1.0).unwrap();
        store.restart(rid).unwrap();
        let p = store.get(rid).unwrap();
        let data = p.instance_data();
        assert_eq!(data.len(), 10 * INSTANCE_FLOATS);
        for instance in data.chunks_exact(INSTANCE_FLOATS) {
            let origin = Vec3::new(instance[3], instance[7], instance[11]);
            assert!(Particles::DEFAULT_AABB.contains_point(origin));
        }
        assert_eq!(data, p.instance_data());
    }

    #[test]
    fn draw_pass_bounds() {
        let mut store = ParticlesStore::default();
        let rid = system(&mut store);
        store.set_draw_passes(rid, 2).unwrap();
        let mesh = Rid::from_parts(9, 1, ResourceKind::Mesh);
        store.set_draw_pass_mesh(rid, 1, mesh).unwrap();
        assert!(store.set_draw_pass_mesh(rid, 2, mesh).is_err());
        assert!(store.set_draw_passes(rid, 5).is_err());
    }
}
