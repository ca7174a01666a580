/// Scene-relative clock fed by engine-reported frame deltas. Pausing or scaling time here
/// pauses or scales everything derived from it.
#[derive(Debug, Clone)]
pub struct SceneClock {
    elapsed: f32,
    delta: f32,
    scale: f32,
    paused: bool,
}

impl Default for SceneClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneClock {
    pub fn new() -> Self {
        Self { elapsed: 0.0, delta: 0.0, scale: 1.0, paused: false }
    }

    /// Advance by the engine's raw delta in seconds. Negative or non-finite deltas count as 0.
    pub fn tick(&mut self, raw_delta: f32) -> f32 {
        let raw = if raw_delta.is_finite() { raw_delta.max(0.0) } else { 0.0 };
        self.delta = if self.paused { 0.0 } else { raw * self.scale };
        self.elapsed += self.delta;
        self.delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.max(0.0);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.delta = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_and_scaled_ticks() {
        let mut clock = SceneClock::new();
        clock.tick(0.5);
        clock.set_scale(2.0);
        assert_eq!(clock.tick(0.25), 0.5);
        clock.set_paused(true);
        assert_eq!(clock.tick(1.0), 0.0);
        assert_eq!(clock.elapsed_seconds(), 1.0);
        clock.tick(f32::NAN);
        assert_eq!(clock.elapsed_seconds(), 1.0);
    }
}
