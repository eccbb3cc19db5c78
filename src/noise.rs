//! Gradient (Perlin) noise and the terrain heightmap built from it.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PERM_SIZE: usize = 256;
const PERM_MASK: i32 = 255;

/// Upper bound of the divisor used when randomising the base frequency.
const FREQUENCY_DIVISOR_MAX: u32 = 32_767;
/// Column and row offsets into the noise plane are drawn below this.
const OFFSET_RANGE: u32 = 1200;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Vec2 {
    x: f32,
    y: f32,
}

impl Vec2 {
    const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }
}

const GRADIENTS: [Vec2; 4] = [
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, 1.0),
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
];

fn gradient(value: u8) -> Vec2 {
    GRADIENTS[(value & 3) as usize]
}

fn fade(t: f32) -> f32 {
    ((6.0 * t - 15.0) * t + 10.0) * t * t * t
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

/// 2D gradient noise over a shuffled 256-entry permutation table.
#[derive(Clone)]
pub struct PerlinNoise {
    // Duplicated so corner lookups never need to wrap.
    perm: [u8; PERM_SIZE * 2],
}

impl PerlinNoise {
    pub fn new(seed: u64) -> Self {
        Self::from_rng(&mut StdRng::seed_from_u64(seed))
    }

    pub fn from_rng<R: Rng>(rng: &mut R) -> Self {
        let mut table = [0u8; PERM_SIZE];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        for i in (1..PERM_SIZE).rev() {
            let j = rng.random_range(0..=i);
            table.swap(i, j);
        }

        let mut perm = [0u8; PERM_SIZE * 2];
        perm[..PERM_SIZE].copy_from_slice(&table);
        perm[PERM_SIZE..].copy_from_slice(&table);
        Self { perm }
    }

    /// The 256-entry permutation.
    pub fn permutation(&self) -> &[u8] {
        &self.perm[..PERM_SIZE]
    }

    fn hash(&self, x: usize, y: usize) -> u8 {
        self.perm[self.perm[x] as usize + y]
    }

    /// Noise at `(x, y)`, roughly in `[-1, 1]`. Zero on every lattice point.
    pub fn noise2d(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        let cx = (fx as i32 & PERM_MASK) as usize;
        let cy = (fy as i32 & PERM_MASK) as usize;
        let xf = x - fx;
        let yf = y - fy;

        let top_right = Vec2::new(xf - 1.0, yf - 1.0).dot(gradient(self.hash(cx + 1, cy + 1)));
        let top_left = Vec2::new(xf, yf - 1.0).dot(gradient(self.hash(cx, cy + 1)));
        let bottom_right = Vec2::new(xf - 1.0, yf).dot(gradient(self.hash(cx + 1, cy)));
        let bottom_left = Vec2::new(xf, yf).dot(gradient(self.hash(cx, cy)));

        let u = fade(xf);
        let v = fade(yf);
        lerp(
            u,
            lerp(v, bottom_left, top_left),
            lerp(v, bottom_right, top_right),
        )
    }

    /// Surface row for each of `width` columns.
    ///
    /// Sums `params.octaves` octaves along one row of the noise plane, halving
    /// the amplitude and doubling the frequency each octave, then maps the
    /// normalised sum `n` to `base - n * amplitude`.
    pub fn generate_heightmap(&self, width: usize, params: &HeightmapParams) -> Vec<i32> {
        let row = (params.ref_y + params.y_offset) as f32;
        let heights: Vec<i32> = (0..width)
            .map(|column| {
                let x = (column as u32 + params.x_offset) as f32;
                let mut n = 0.0f32;
                let mut amplitude = 1.0f32;
                let mut frequency = params.frequency;
                for _ in 0..params.octaves {
                    n += amplitude * self.noise2d(x * frequency, row * frequency);
                    amplitude *= 0.5;
                    frequency *= 2.0;
                }
                let n = (n + 1.0) * 0.5;
                (params.base - n * params.amplitude) as i32
            })
            .collect();

        if let (Some(min), Some(max)) = (heights.iter().min(), heights.iter().max()) {
            info!(
                "heightmap: {} columns, frequency {:.6}, surface rows {}..={}",
                width, params.frequency, min, max
            );
        }
        heights
    }
}

/// Inputs to [`PerlinNoise::generate_heightmap`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightmapParams {
    /// Frequency of the first octave.
    pub frequency: f32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub ref_y: u32,
    pub octaves: u32,
    pub base: f32,
    pub amplitude: f32,
}

impl HeightmapParams {
    pub fn new() -> Self {
        Self {
            frequency: 0.00075,
            x_offset: 0,
            y_offset: 0,
            ref_y: 0,
            octaves: 8,
            base: 1550.0,
            amplitude: 1000.0,
        }
    }

    /// Fresh frequency and plane offsets for a new map.
    pub fn randomize<R: Rng>(mut self, rng: &mut R) -> Self {
        self.frequency = random_frequency(rng);
        self.x_offset = rng.random_range(0..OFFSET_RANGE);
        self.y_offset = rng.random_range(0..OFFSET_RANGE);
        self.ref_y = rng.random_range(0..OFFSET_RANGE);
        self
    }
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Base frequency for a new map, `0.00075 + 0.003 / r` for a random `r >= 1`.
pub fn random_frequency<R: Rng>(rng: &mut R) -> f32 {
    0.00075 + 0.003 / rng.random_range(1..=FREQUENCY_DIVISOR_MAX) as f32
}
