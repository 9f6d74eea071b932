//! Uniform-grid neighbor search.
//!
//! [`NeighborGrid`] bins particles into cubic cells with a counting sort
//! (compressed-row layout: one offset array, one member array). It is rebuilt
//! from scratch every step and then only read. [`NeighborList`] walks the
//! 3x3x3 block of cells around each particle and stores what it finds in a
//! fixed-capacity buffer that the force passes iterate.

use crate::parallel::Dispatch;

/// Largest number of cells a grid may allocate.
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// Particles binned into cubic cells over a fixed box.
///
/// The cell edge must be at least the search radius, so every neighbor of a
/// particle lies in its own cell or one of the 26 around it.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    cell_size: f32,
    origin: [f32; 3],
    dims: [usize; 3],
    /// Members of cell `c` are `members[starts[c]..starts[c + 1]]`.
    starts: Vec<u32>,
    /// Particle indices grouped by cell, ascending within a cell.
    members: Vec<u32>,
    /// Flat cell of each particle.
    particle_cell: Vec<u32>,
    /// Scatter cursors, one per cell.
    cursor: Vec<u32>,
}

impl NeighborGrid {
    /// Cells per axis needed to cover `[min, max]` with cubes of `cell_size`.
    ///
    /// Every axis gets at least one cell. Non-finite or huge ratios saturate,
    /// so callers compare the product against [`MAX_GRID_CELLS`].
    pub fn dims_for(cell_size: f32, min: [f32; 3], max: [f32; 3]) -> [usize; 3] {
        let mut dims = [1usize; 3];
        for k in 0..3 {
            let cells = ((max[k] as f64 - min[k] as f64) / cell_size as f64).ceil();
            dims[k] = cells.max(1.0) as usize;
        }
        dims
    }

    /// Total cells for `dims`, or `None` on overflow.
    pub fn cell_count(dims: [usize; 3]) -> Option<usize> {
        dims[0].checked_mul(dims[1])?.checked_mul(dims[2])
    }

    /// Grid over `[domain_min, domain_max]` with cubic cells of `cell_size`.
    pub fn new(cell_size: f32, domain_min: [f32; 3], domain_max: [f32; 3]) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        let dims = Self::dims_for(cell_size, domain_min, domain_max);
        let cells = Self::cell_count(dims).unwrap_or(usize::MAX);
        assert!(cells <= MAX_GRID_CELLS, "neighbor grid exceeds MAX_GRID_CELLS");
        Self {
            cell_size,
            origin: domain_min,
            dims,
            starts: vec![0; cells + 1],
            members: Vec::new(),
            particle_cell: Vec::new(),
            cursor: vec![0; cells],
        }
    }

    /// Cell edge length (m).
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of cells along each axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of cells.
    pub fn total_cells(&self) -> usize {
        self.starts.len() - 1
    }

    /// Cell coordinates of a point, clamped into the grid.
    ///
    /// Rounds with `floor`, so points just below the origin stay in the first
    /// cell instead of truncating toward zero. NaN lands in cell 0.
    #[inline]
    pub fn cell_of(&self, p: [f32; 3]) -> [usize; 3] {
        let mut cell = [0usize; 3];
        for k in 0..3 {
            let top = (self.dims[k] - 1) as f32;
            cell[k] = ((p[k] - self.origin[k]) / self.cell_size)
                .floor()
                .max(0.0)
                .min(top) as usize;
        }
        cell
    }

    #[inline]
    fn flat(&self, [cx, cy, cz]: [usize; 3]) -> usize {
        cx + self.dims[0] * (cy + self.dims[1] * cz)
    }

    /// Particle indices binned in cell `cell`.
    #[inline]
    pub fn members(&self, cell: usize) -> &[u32] {
        &self.members[self.starts[cell] as usize..self.starts[cell + 1] as usize]
    }

    /// Flat indices of the 3x3x3 block around `home`, clipped to the grid.
    /// Ordered z, then y, then x, so cell visits are deterministic.
    pub fn adjacent_cells(&self, home: [usize; 3]) -> impl Iterator<Item = usize> + '_ {
        let [nx, ny, nz] = self.dims;
        let span = |c: usize, n: usize| c.saturating_sub(1)..=(c + 1).min(n - 1);
        let (xs, ys, zs) = (span(home[0], nx), span(home[1], ny), span(home[2], nz));
        zs.flat_map(move |z| {
            let xs = xs.clone();
            ys.clone()
                .flat_map(move |y| xs.clone().map(move |x| x + nx * (y + ny * z)))
        })
    }

    /// Re-bin all particles. The three slices hold one entry per particle.
    pub fn update(&mut self, x: &[f32], y: &[f32], z: &[f32]) {
        let n = x.len();
        debug_assert!(y.len() == n && z.len() == n);

        let mut particle_cell = std::mem::take(&mut self.particle_cell);
        particle_cell.clear();
        particle_cell.extend((0..n).map(|i| self.flat(self.cell_of([x[i], y[i], z[i]])) as u32));

        // Histogram shifted by one, then an inclusive scan gives the starts.
        self.starts.fill(0);
        for &c in &particle_cell {
            self.starts[c as usize + 1] += 1;
        }
        for c in 1..self.starts.len() {
            self.starts[c] += self.starts[c - 1];
        }

        self.cursor.copy_from_slice(&self.starts[..self.starts.len() - 1]);
        self.members.resize(n, 0);
        for (i, &c) in particle_cell.iter().enumerate() {
            let slot = &mut self.cursor[c as usize];
            self.members[*slot as usize] = i as u32;
            *slot += 1;
        }
        self.particle_cell = particle_cell;
    }
}

/// Per-step neighbor lists with a fixed capacity per particle.
///
/// Storage is one flat buffer of `capacity` slots per particle, reused every
/// step. When a particle has more neighbors than fit, the extra ones are
/// dropped (the list saturates) and the true count is kept so the solver can
/// report the overflow. Lists exclude the particle itself.
#[derive(Debug, Clone)]
pub struct NeighborList {
    capacity: usize,
    indices: Vec<u32>,
    counts: Vec<u32>,
}

impl NeighborList {
    /// Create an empty list set holding up to `capacity` neighbors per particle.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "neighbor capacity must be positive");
        Self {
            capacity,
            indices: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Per-particle slot capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of particles the lists were last built for.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// `true` if the lists were built for zero particles (or never built).
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Rebuild every particle's list from a freshly updated grid.
    ///
    /// A neighbor is any other particle strictly closer than `radius`.
    pub fn build(
        &mut self,
        grid: &NeighborGrid,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        radius: f32,
        dispatch: Dispatch,
    ) {
        let n = x.len();
        let cap = self.capacity;
        let radius_sq = radius * radius;
        self.indices.resize(n * cap, 0);
        self.counts.resize(n, 0);

        dispatch.for_each_slot(&mut self.indices, cap, &mut self.counts, |i, slot, count| {
            let p = [x[i], y[i], z[i]];
            let mut found = 0usize;
            for cell in grid.adjacent_cells(grid.cell_of(p)) {
                for &j in grid.members(cell) {
                    let ju = j as usize;
                    if ju == i {
                        continue;
                    }
                    let dx = p[0] - x[ju];
                    let dy = p[1] - y[ju];
                    let dz = p[2] - z[ju];
                    // NaN distances never pass
                    if dx * dx + dy * dy + dz * dz < radius_sq {
                        if found < cap {
                            slot[found] = j;
                        }
                        found += 1;
                    }
                }
            }
            *count = found as u32;
        });
    }

    /// Stored neighbors of particle `i` (at most `capacity`).
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[u32] {
        let stored = (self.counts[i] as usize).min(self.capacity);
        let start = i * self.capacity;
        &self.indices[start..start + stored]
    }

    /// Number of neighbors actually found for particle `i`, including any
    /// that did not fit in the buffer.
    #[inline]
    pub fn found(&self, i: usize) -> usize {
        self.counts[i] as usize
    }

    /// Number of particles whose list saturated.
    pub fn saturated_count(&self) -> usize {
        self.counts
            .iter()
            .filter(|&&c| c as usize > self.capacity)
            .count()
    }

    /// Largest neighbor count found this step.
    pub fn max_found(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(cell: f32, min: f32, x: &[f32], y: &[f32], z: &[f32], r: f32) -> NeighborList {
        let mut grid = NeighborGrid::new(cell, [min; 3], [1.0; 3]);
        grid.update(x, y, z);
        let mut list = NeighborList::new(64);
        list.build(&grid, x, y, z, r, Dispatch::Serial);
        list
    }

    #[test]
    fn empty_grid() {
        let grid = NeighborGrid::new(0.1, [0.0; 3], [1.0; 3]);
        assert_eq!(grid.total_cells(), 10 * 10 * 10);
        assert_eq!(grid.dims(), [10, 10, 10]);
    }

    #[test]
    fn dims_saturate_instead_of_wrapping() {
        let dims = NeighborGrid::dims_for(1.0e-6, [0.0; 3], [1.0e6; 3]);
        assert!(NeighborGrid::cell_count(dims).map_or(true, |c| c > MAX_GRID_CELLS));
        assert_eq!(NeighborGrid::dims_for(0.2, [0.0; 3], [0.0; 3]), [1, 1, 1]);
    }

    #[test]
    fn cells_bin_every_particle_once() {
        let mut grid = NeighborGrid::new(0.25, [0.0; 3], [1.0; 3]);
        let x = [0.1, 0.9, 0.12, 0.6];
        let y = [0.1, 0.9, 0.1, 0.4];
        let z = [0.1, 0.9, 0.1, 0.4];
        grid.update(&x, &y, &z);
        let total: usize = (0..grid.total_cells()).map(|c| grid.members(c).len()).sum();
        assert_eq!(total, 4);
        assert_eq!(grid.members(0), &[0, 2]);
    }

    #[test]
    fn adjacent_cells_clip_at_faces() {
        let grid = NeighborGrid::new(0.25, [0.0; 3], [1.0; 3]);
        assert_eq!(grid.adjacent_cells([0, 0, 0]).count(), 8);
        assert_eq!(grid.adjacent_cells([1, 1, 1]).count(), 27);
        assert_eq!(grid.adjacent_cells([3, 1, 0]).count(), 12);
        let cells: Vec<usize> = grid.adjacent_cells([1, 1, 1]).collect();
        assert!(cells.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_particle_no_neighbors() {
        let list = lists(0.2, 0.0, &[0.5], &[0.5], &[0.5], 0.2);
        assert!(list.neighbors(0).is_empty());
    }

    #[test]
    fn two_close_particles() {
        let list = lists(0.2, 0.0, &[0.5, 0.51], &[0.5, 0.5], &[0.5, 0.5], 0.2);
        assert_eq!(list.neighbors(0), &[1]);
        assert_eq!(list.neighbors(1), &[0]);
    }

    #[test]
    fn two_far_particles() {
        let list = lists(0.2, 0.0, &[0.1, 0.9], &[0.1, 0.9], &[0.1, 0.9], 0.2);
        assert!(list.neighbors(0).is_empty());
    }

    #[test]
    fn particles_across_cell_boundary() {
        // Either side of the face at x = 0.2
        let list = lists(0.2, 0.0, &[0.19, 0.21], &[0.5, 0.5], &[0.5, 0.5], 0.2);
        assert_eq!(list.neighbors(0), &[1]);
    }

    #[test]
    fn radius_is_exclusive() {
        let list = lists(0.5, 0.0, &[0.25, 0.5], &[0.5, 0.5], &[0.5, 0.5], 0.25);
        assert!(list.neighbors(0).is_empty());
    }

    #[test]
    fn negative_coordinates_use_floor() {
        let grid = NeighborGrid::new(0.5, [-1.0; 3], [1.0; 3]);
        // -0.01 and 0.01 straddle the cell boundary at the origin
        assert_eq!(grid.cell_of([-0.01; 3]), [1, 1, 1]);
        assert_eq!(grid.cell_of([0.01; 3]), [2, 2, 2]);
        let list = lists(0.5, -1.0, &[-0.01, 0.01], &[-0.01, 0.01], &[-0.01, 0.01], 0.5);
        assert_eq!(list.neighbors(0), &[1]);
    }

    #[test]
    fn non_finite_positions_do_not_panic() {
        let grid = NeighborGrid::new(0.2, [0.0; 3], [1.0; 3]);
        assert_eq!(grid.cell_of([f32::NAN, 0.5, 0.5])[0], 0);
        let x = [f32::NAN, 0.5, f32::INFINITY];
        let y = [0.5, 0.5, f32::NEG_INFINITY];
        let z = [0.5, 0.5, 0.5];
        let list = lists(0.2, 0.0, &x, &y, &z, 0.2);
        assert!(list.neighbors(1).is_empty());
    }

    #[test]
    fn many_particles_in_cluster() {
        let n = 10;
        let x: Vec<f32> = (0..n).map(|i| 0.5 + (i as f32) * 0.01).collect();
        let list = lists(0.2, 0.0, &x, &vec![0.5; n], &vec![0.5; n], 0.2);
        assert_eq!(list.neighbors(0).len(), n - 1);
    }

    #[test]
    fn list_saturates_and_reports() {
        let mut grid = NeighborGrid::new(0.2, [0.0; 3], [1.0; 3]);
        let n = 10;
        let x: Vec<f32> = (0..n).map(|i| 0.5 + (i as f32) * 0.001).collect();
        let y = vec![0.5; n];
        let z = vec![0.5; n];
        grid.update(&x, &y, &z);

        let mut list = NeighborList::new(4);
        list.build(&grid, &x, &y, &z, 0.2, Dispatch::Serial);
        assert_eq!(list.len(), n);
        for i in 0..n {
            assert_eq!(list.neighbors(i).len(), 4);
            assert_eq!(list.found(i), n - 1);
        }
        assert_eq!(list.saturated_count(), n);
        assert_eq!(list.max_found(), n - 1);
    }

    #[test]
    fn serial_and_parallel_lists_agree() {
        let mut grid = NeighborGrid::new(0.2, [0.0; 3], [1.0; 3]);
        let x = [0.1, 0.15, 0.3, 0.8, 0.22];
        let y = [0.1, 0.1, 0.1, 0.8, 0.18];
        let z = [0.1, 0.1, 0.1, 0.8, 0.05];
        grid.update(&x, &y, &z);
        let mut serial = NeighborList::new(8);
        serial.build(&grid, &x, &y, &z, 0.2, Dispatch::Serial);
        let mut parallel = NeighborList::new(8);
        parallel.build(&grid, &x, &y, &z, 0.2, Dispatch::Parallel);
        for i in 0..x.len() {
            assert_eq!(serial.neighbors(i), parallel.neighbors(i));
        }
        assert_eq!(serial.neighbors(3), &[] as &[u32]);
        assert_eq!(serial.saturated_count(), 0);
    }
}
