//! CPU scaling test -- serial vs rayon dispatch at growing particle counts.
//!
//! Run with: cargo bench -p sph_kernel --bench scaling

use std::time::Instant;

use sph_kernel::{Aabb, Dispatch, ParticleArrays, Solver, SolverParams};

fn create_particle_cube(target_count: usize) -> (ParticleArrays, SolverParams) {
    let block_size = 0.3_f32;
    let n_per_axis = (target_count as f32).cbrt().ceil() as usize;
    let spacing = block_size / n_per_axis as f32;
    let h = 1.2 * spacing;
    let params = SolverParams {
        smoothing_length: h,
        cell_size: 2.0 * h,
        domain: Aabb::new([0.0; 3], [0.5; 3]),
        track_concentration: true,
        ..SolverParams::default()
    };
    let mass = params.rest_density * spacing * spacing * spacing;

    let mut particles = ParticleArrays::with_capacity(n_per_axis.pow(3));
    for iy in 0..n_per_axis {
        for iz in 0..n_per_axis {
            for ix in 0..n_per_axis {
                let x = (ix as f32 + 0.5) * spacing;
                let y = (iy as f32 + 0.5) * spacing;
                let z = (iz as f32 + 0.5) * spacing;
                particles.push_particle(x, y, z, mass, params.rest_density);
            }
        }
    }
    for i in 0..particles.len() / 4 {
        particles.mark_waste(i);
    }
    (particles, params)
}

fn time_steps(particles: &ParticleArrays, params: SolverParams, steps: usize) -> f64 {
    let mut solver = Solver::with_initializer(params, particles).expect("valid setup");
    // Warmup
    solver.step().expect("stable warmup step");
    let start = Instant::now();
    for _ in 0..steps {
        solver.step().expect("stable step");
    }
    start.elapsed().as_secs_f64()
}

fn main() {
    println!("=== CPU Scaling Test ===\n");
    println!("rayon threads: {}\n", rayon::current_num_threads());

    // (target particles, steps) -- fewer steps at larger counts
    let configs = [(8_000, 20), (27_000, 10), (64_000, 5), (125_000, 3)];

    println!(
        "{:>10} {:>10} {:>14} {:>14} {:>10}",
        "Particles", "Steps", "serial ms/st", "parallel ms/st", "speedup"
    );

    for &(n, steps) in &configs {
        let (particles, params) = create_particle_cube(n);

        let serial = time_steps(
            &particles,
            SolverParams {
                dispatch: Dispatch::Serial,
                ..params.clone()
            },
            steps,
        );
        let parallel = time_steps(
            &particles,
            SolverParams {
                dispatch: Dispatch::Parallel,
                ..params
            },
            steps,
        );

        println!(
            "{:>10} {:>10} {:>14.2} {:>14.2} {:>10.2}",
            particles.len(),
            steps,
            serial * 1000.0 / steps as f64,
            parallel * 1000.0 / steps as f64,
            serial / parallel,
        );
    }
}
