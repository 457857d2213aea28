use barrow_core::glam::DVec3;

/// 32-bit FNV-1a. Stable across platforms and releases, unlike the std and `ahash` hashers.
pub fn stable_hash(s: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    s.bytes()
        .fold(OFFSET, |h, b| (h ^ u32::from(b)).wrapping_mul(PRIME))
}

/// Hash of an integer lattice point, mapped to `[0, 1)`.
#[inline]
fn lattice_value(seed: u32, x: i32, y: i32, z: i32) -> f64 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    // Murmur3 finalizer.
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    f64::from(h) / 4_294_967_296.0
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Deterministic value noise in `[-1, 1]`: hashed lattice values blended trilinearly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValueNoise {
    seed: u32,
}

impl ValueNoise {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn sample(&self, p: DVec3) -> f64 {
        let cell = p.floor();
        let f = p - cell;
        let (x0, y0, z0) = (cell.x as i32, cell.y as i32, cell.z as i32);

        let v = |dx: i32, dy: i32, dz: i32| lattice_value(self.seed, x0 + dx, y0 + dy, z0 + dz);

        let x00 = lerp(v(0, 0, 0), v(1, 0, 0), f.x);
        let x10 = lerp(v(0, 1, 0), v(1, 1, 0), f.x);
        let x01 = lerp(v(0, 0, 1), v(1, 0, 1), f.x);
        let x11 = lerp(v(0, 1, 1), v(1, 1, 1), f.x);
        let y0 = lerp(x00, x10, f.y);
        let y1 = lerp(x01, x11, f.y);

        lerp(y0, y1, f.z) * 2.0 - 1.0
    }

    /// Two octaves: a broad base and a finer, decorrelated detail layer. Still within `[-1, 1]`.
    pub fn two_octaves(&self, p: DVec3) -> f64 {
        let detail = Self::new(self.seed.wrapping_add(0x9e37_79b9));
        0.65 * self.sample(p * 1.7) + 0.35 * detail.sample(p * 4.3 + DVec3::splat(17.0))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use barrow_core::approx::assert_relative_eq;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(stable_hash(""), 0x811c_9dc5);
        assert_eq!(stable_hash("a"), 0xe40c_292c);
        assert_ne!(stable_hash("cave-1"), stable_hash("cave-2"));
    }

    #[test]
    fn noise_is_bounded_and_repeatable() {
        let noise = ValueNoise::new(stable_hash("grotto"));
        for i in 0..500 {
            let p = DVec3::new(i as f64 * 0.37, i as f64 * -0.11, (i % 17) as f64 * 0.53);
            let n = noise.two_octaves(p);
            assert!((-1.0..=1.0).contains(&n), "{}", n);
            assert_eq!(n.to_bits(), noise.two_octaves(p).to_bits());
        }
    }

    #[test]
    fn noise_interpolates_lattice_values() {
        let noise = ValueNoise::new(7);
        let corner = noise.sample(DVec3::new(2.0, 3.0, 4.0));
        assert_relative_eq!(corner, lattice_value(7, 2, 3, 4) * 2.0 - 1.0);

        let mid = noise.sample(DVec3::new(2.5, 3.0, 4.0));
        let expected = (lattice_value(7, 2, 3, 4) + lattice_value(7, 3, 3, 4)) - 1.0;
        assert_relative_eq!(mid, expected, epsilon = 1e-12);
    }

    #[test]
    fn seeds_decorrelate() {
        let a = ValueNoise::new(1);
        let b = ValueNoise::new(2);
        let p = DVec3::new(0.3, 0.6, 0.9);
        assert_ne!(a.sample(p).to_bits(), b.sample(p).to_bits());
    }
}
