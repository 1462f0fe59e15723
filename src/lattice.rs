//! Dense 3D sample lattices, x varying fastest.
//!
//! [`GridShape`] also speaks `fast_surface_nets::ndshape::Shape<3>` so the
//! lattices can be handed to `ndshape`-based code unchanged.

use fast_surface_nets::ndshape::Shape;

/// Sample counts along each axis of a dense lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl GridShape {
    pub const fn new(nx: u32, ny: u32, nz: u32) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of samples, computed in `usize` so large lattices cannot overflow.
    pub const fn len(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice offset of sample `[x, y, z]`.
    #[inline]
    pub const fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (z as usize * self.ny as usize + y as usize) * self.nx as usize + x as usize
    }

    /// Inverse of [`index`](Self::index).
    #[inline]
    pub const fn coords(&self, index: usize) -> [u32; 3] {
        let row = self.nx as usize;
        let layer = row * self.ny as usize;
        [(index % row) as u32, ((index % layer) / row) as u32, (index / layer) as u32]
    }

    /// Offsets of the (up to six) face-adjacent samples of `index`.
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> {
        let [x, y, z] = self.coords(index);
        let row = self.nx as usize;
        let layer = row * self.ny as usize;
        [
            (x > 0).then(|| index - 1),
            (x + 1 < self.nx).then(|| index + 1),
            (y > 0).then(|| index - row),
            (y + 1 < self.ny).then(|| index + row),
            (z > 0).then(|| index - layer),
            (z + 1 < self.nz).then(|| index + layer),
        ]
        .into_iter()
        .flatten()
    }
}

impl Shape<3> for GridShape {
    type Coord = u32;

    #[inline]
    fn as_array(&self) -> [u32; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn size(&self) -> u32 {
        self.len() as u32
    }

    fn usize(&self) -> usize {
        self.len()
    }

    #[inline]
    fn linearize(&self, [x, y, z]: [u32; 3]) -> u32 {
        self.index(x, y, z) as u32
    }

    #[inline]
    fn delinearize(&self, i: u32) -> [u32; 3] {
        self.coords(i as usize)
    }
}
