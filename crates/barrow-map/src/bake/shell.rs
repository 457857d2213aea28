use crate::grid::{visit_face_neighbors, GridSize};
use crate::voxel::VoxelType;

use ndshape::{RuntimeShape, Shape};
use std::collections::VecDeque;

/// Distance value of cells the transform never reached: outside cells, and inside cells deeper than the cap.
pub const UNREACHED: u32 = 0;

/// Multi-source BFS over the 6-connected `inside` cells.
///
/// Every inside cell with an outside (or off-grid) face neighbor is seeded at distance 1. The front expands inward one
/// step per layer and stops expanding from cells at distance `cap`, so the result only ranges over `[1, cap]` plus
/// [`UNREACHED`].
pub fn distance_transform(inside: &[bool], size: GridSize, cap: u32) -> Vec<u32> {
    debug_assert_eq!(inside.len(), size.volume());

    let shape = RuntimeShape::<u32, 3>::new(size.to_array());
    let mut distance = vec![UNREACHED; inside.len()];
    let mut queue = VecDeque::new();

    if cap == 0 {
        return distance;
    }

    for (i, &is_inside) in inside.iter().enumerate() {
        if !is_inside {
            continue;
        }
        let p = shape.delinearize(i as u32);
        let mut on_boundary = false;
        visit_face_neighbors(&shape, size, p, |n| {
            on_boundary |= n.map_or(true, |n| !inside[n]);
        });
        if on_boundary {
            distance[i] = 1;
            queue.push_back(i);
        }
    }

    while let Some(i) = queue.pop_front() {
        let d = distance[i];
        if d >= cap {
            continue;
        }
        let p = shape.delinearize(i as u32);
        visit_face_neighbors(&shape, size, p, |n| {
            if let Some(n) = n {
                if inside[n] && distance[n] == UNREACHED {
                    distance[n] = d + 1;
                    queue.push_back(n);
                }
            }
        });
    }

    distance
}

/// Classifies an inside/outside bitmap into a shell of thickness `wall_thickness`.
///
/// Outside is `Uninstantiated`, inside within `wall_thickness` of the boundary is `Wall`, and deeper inside is `Empty`.
pub fn extract_shell(inside: &[bool], size: GridSize, wall_thickness: u32) -> Vec<VoxelType> {
    let distance = distance_transform(inside, size, wall_thickness);
    inside
        .iter()
        .zip(distance.iter())
        .map(|(&is_inside, &d)| match (is_inside, d) {
            (false, _) => VoxelType::Uninstantiated,
            (true, UNREACHED) => VoxelType::Empty,
            (true, _) => VoxelType::Wall,
        })
        .collect()
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
