//! Noise sampling for terrain generation.
//!
//! Steps see noise only through [`NoiseProvider`], a pure function of position
//! and seed. [`FractalNoise`] is the stock provider: multi-octave Perlin noise.

use dashmap::DashMap;
use noise::{NoiseFn, Perlin};

/// Source of deterministic scalar noise.
///
/// Implementations must be pure: the same `(x, y, z, seed)` always yields the
/// same value, with no side effects visible to callers.
pub trait NoiseProvider: Send + Sync {
    /// Sample noise at a world-space position for the given seed.
    ///
    /// Returns a value in `[-1.0, 1.0]`.
    fn sample(&self, x: f64, y: f64, z: f64, seed: i32) -> f64;
}

impl<F> NoiseProvider for F
where
    F: Fn(f64, f64, f64, i32) -> f64 + Send + Sync,
{
    fn sample(&self, x: f64, y: f64, z: f64, seed: i32) -> f64 {
        self(x, y, z, seed)
    }
}

/// Configuration for multi-octave noise generation.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseConfig {
    /// Number of octaves (layers of detail)
    pub octaves: u32,
    /// Frequency multiplier between octaves
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves (persistence)
    pub persistence: f64,
    /// Base frequency (scale)
    pub frequency: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 1.0,
        }
    }
}

impl NoiseConfig {
    /// Unscaled fractal noise; callers pick the frequency through coordinates.
    pub fn unscaled(octaves: u32) -> Self {
        Self {
            octaves,
            ..Self::default()
        }
    }

    /// Config for rolling terrain (medium features).
    pub fn terrain() -> Self {
        Self {
            octaves: 5,
            lacunarity: 2.1,
            persistence: 0.5,
            frequency: 0.01,
        }
    }
}

/// Fractal Perlin noise with permutation tables cached per seed.
pub struct FractalNoise {
    config: NoiseConfig,
    tables: DashMap<i32, Perlin>,
}

impl FractalNoise {
    /// Create a new noise provider with the given configuration.
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            config,
            tables: DashMap::new(),
        }
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    fn perlin(&self, seed: i32) -> Perlin {
        if let Some(perlin) = self.tables.get(&seed) {
            return perlin.clone();
        }
        self.tables
            .entry(seed)
            .or_insert_with(|| Perlin::new(seed as u32))
            .clone()
    }
}

impl Default for FractalNoise {
    fn default() -> Self {
        Self::new(NoiseConfig::default())
    }
}

impl NoiseProvider for FractalNoise {
    fn sample(&self, x: f64, y: f64, z: f64, seed: i32) -> f64 {
        let perlin = self.perlin(seed);
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += perlin.get([x * frequency, y * frequency, z * frequency]) * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        if max_value == 0.0 {
            return 0.0;
        }
        // Normalize to [-1.0, 1.0]
        (value / max_value).clamp(-1.0, 1.0)
    }
}

/// Map a `[-1, 1]` sample onto `[min, max]`.
pub fn remap(sample: f64, min: f64, max: f64) -> f64 {
    (sample + 1.0) * 0.5 * (max - min) + min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_deterministic() {
        let noise = FractalNoise::new(NoiseConfig::terrain());
        let a = noise.sample(100.5, 12.0, 200.5, 12345);
        let b = noise.sample(100.5, 12.0, 200.5, 12345);
        assert_eq!(a, b);
    }

    #[test]
    fn test_noise_range() {
        let noise = FractalNoise::new(NoiseConfig::terrain());
        for x in 0..40 {
            for z in 0..40 {
                let value = noise.sample(x as f64 * 3.7, 64.0, z as f64 * 5.3, 7);
                assert!((-1.0..=1.0).contains(&value), "out of range: {}", value);
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let noise = FractalNoise::new(NoiseConfig::terrain());
        let differs = (0..32).any(|i| {
            let x = i as f64 * 13.3;
            noise.sample(x, 0.5, x * 0.7, 1) != noise.sample(x, 0.5, x * 0.7, 2)
        });
        assert!(differs);
    }

    #[test]
    fn test_closure_provider() {
        let flat = |_x: f64, _y: f64, _z: f64, _seed: i32| 0.25;
        assert_eq!(flat.sample(1.0, 2.0, 3.0, 4), 0.25);
    }

    #[test]
    fn test_remap() {
        assert_eq!(remap(-1.0, 10.0, 20.0), 10.0);
        assert_eq!(remap(1.0, 10.0, 20.0), 20.0);
        assert_eq!(remap(0.0, 10.0, 20.0), 15.0);
    }
}
