use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::runtime::PlayerState;
use crate::level::document::Effect;

/// Continuous atmosphere effects, advanced by engine-reported frame time.
pub struct EffectStack {
    effects: Vec<Effect>,
    elapsed: f32,
    rng: StdRng,
}

impl EffectStack {
    pub fn new(effects: Vec<Effect>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { effects, elapsed: 0.0, rng }
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Swap the effect list, keeping the time base so waves do not jump.
    pub fn replace(&mut self, effects: Vec<Effect>) {
        self.effects = effects;
    }

    pub fn apply(&mut self, dt: f32, player: &mut PlayerState) {
        self.elapsed += dt.max(0.0);
        player.camera_jitter = Vec3::ZERO;
        for effect in &self.effects {
            match *effect {
                Effect::Flicker { low, high, chance } => {
                    let range = if self.rng.gen::<f32>() < chance { low } else { high };
                    player.spotlight_intensity = sample(&mut self.rng, range);
                }
                Effect::Heartbeat { base, amplitude, rate } => {
                    player.vignette_weight = base + amplitude * heartbeat_wave(self.elapsed * rate);
                }
                Effect::Shake { intensity } => {
                    let magnitude = intensity.abs();
                    if magnitude > 0.0 {
                        player.camera_jitter = Vec3::new(
                            self.rng.gen_range(-magnitude..=magnitude),
                            self.rng.gen_range(-magnitude..=magnitude),
                            self.rng.gen_range(-magnitude..=magnitude),
                        );
                    }
                }
                Effect::Spotlight { intensity } => player.spotlight_intensity = intensity,
            }
        }
    }
}

fn sample(rng: &mut StdRng, range: [f32; 2]) -> f32 {
    let (lo, hi) = if range[0] <= range[1] { (range[0], range[1]) } else { (range[1], range[0]) };
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

/// Three phase-shifted sines normalized into [-1, 1]: a main beat with two overtones.
pub fn heartbeat_wave(t: f32) -> f32 {
    let beat = (t * TAU).sin() + 0.5 * (t * TAU * 2.0 + 0.6).sin() + 0.25 * (t * TAU * 3.0 + 1.2).sin();
    beat / 1.75
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_flicker_stays_inside_ranges() {
        let effects = vec![Effect::Flicker { low: [0.1, 0.4], high: [1.2, 0.9], chance: 0.5 }];
        let mut stack = EffectStack::new(effects, Some(11));
        let mut player = PlayerState::default();
        for _ in 0..64 {
            stack.apply(0.016, &mut player);
            let value = player.spotlight_intensity;
            assert!((0.1..=0.4).contains(&value) || (0.9..=1.2).contains(&value), "{value}");
        }
    }

    #[test]
    fn heartbeat_tracks_elapsed_time() {
        let mut stack = EffectStack::new(vec![Effect::Heartbeat { base: 1.5, amplitude: 0.6, rate: 1.0 }], Some(1));
        let mut player = PlayerState::default();
        stack.apply(0.0, &mut player);
        assert!((player.vignette_weight - (1.5 + 0.6 * heartbeat_wave(0.0))).abs() < 1e-5);
        stack.apply(0.25, &mut player);
        assert!((stack.elapsed() - 0.25).abs() < 1e-6);
        assert!(player.vignette_weight <= 2.1 && player.vignette_weight >= 0.9);
    }
}
