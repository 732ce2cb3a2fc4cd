//! Square spiral walk around a center cell
//!
//! Cells come out ring by ring (Chebyshev distance 0, 1, 2, ...), bounded to
//! offsets in `(-distance/2, distance/2]` on both axes.

/// Iterator over `(dx, dz)` offsets of a bounded square spiral
#[derive(Clone, Debug)]
pub struct Spiral {
    distance: i64,
    steps_left: u64,
    x: i32,
    z: i32,
    dx: i32,
    dz: i32,
}

impl Spiral {
    /// Spiral covering a `distance` x `distance` square
    pub fn new(distance: u32) -> Self {
        Self {
            distance: distance as i64,
            steps_left: distance as u64 * distance as u64,
            x: 0,
            z: 0,
            dx: 0,
            dz: -1,
        }
    }

    fn in_bounds(&self, v: i32) -> bool {
        let doubled = 2 * v as i64;
        -self.distance < doubled && doubled <= self.distance
    }

    fn step(&mut self) {
        let (x, z) = (self.x, self.z);
        if x == z || (x < 0 && x == -z) || (x > 0 && x == 1 - z) {
            let dx = self.dx;
            self.dx = -self.dz;
            self.dz = dx;
        }
        self.x += self.dx;
        self.z += self.dz;
    }
}

impl Iterator for Spiral {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.steps_left > 0 {
            self.steps_left -= 1;
            let cell = (self.x, self.z);
            let visible = self.in_bounds(cell.0) && self.in_bounds(cell.1);
            self.step();
            if visible {
                return Some(cell);
            }
        }
        None
    }
}

/// Walk the spiral, calling `load` per cell until `max` calls returned true.
///
/// Returns how many calls returned true.
pub fn load_spiral(distance: u32, max: u32, mut load: impl FnMut(i32, i32) -> bool) -> u32 {
    let mut count = 0;
    if max == 0 {
        return 0;
    }
    for (dx, dz) in Spiral::new(distance) {
        if load(dx, dz) {
            count += 1;
            if count >= max {
                break;
            }
        }
    }
    count
}
