// src/sim.rs
//! Host-side mirror of the culling kernel.
//!
//! Same plane test, same depth-extent test, same ascending-index truncation
//! as the WGSL in `light_culling`, written against the same frustum math in
//! `frustum`. The GPU allocates index ranges with an atomic cursor and the
//! mirror allocates them sequentially, which is one legal schedule of the
//! same algorithm; per-tile contents are identical either way.

use glam::{Mat4, Vec3, Vec4Swizzles};

use crate::frustum::{sphere_inside, Frustum};
use crate::lights::GpuLight;
use crate::MAX_LIGHTS_PER_TILE;

/// View-space z reconstructed from an NDC depth value, matching the culling
/// kernel's two-row shortcut for points on the view axis. A depth texture
/// cleared to 1.0 maps to `-zfar`.
pub fn view_depth(inv_proj: &Mat4, ndc_depth: f32) -> f32 {
    let c2 = inv_proj.col(2);
    let c3 = inv_proj.col(3);
    (c2.z * ndc_depth + c3.z) / (c2.w * ndc_depth + c3.w)
}

/// `(offset, count)` into the flat index list, one per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub offset: u32,
    pub count: u32,
}

/// Cull every light against one tile. Indices come out ascending; a full
/// tile keeps the lowest-indexed lights.
pub fn cull_tile(
    frustum: &Frustum,
    lights: &[GpuLight],
    view: &Mat4,
    depth_extent: (f32, f32),
) -> Vec<u32> {
    let (min_dist, max_dist) = depth_extent;
    let mut out = Vec::new();
    for (i, light) in lights.iter().enumerate() {
        if out.len() >= MAX_LIGHTS_PER_TILE as usize {
            break;
        }
        let world = Vec3::from_slice(&light.begin_pos[..3]);
        let radius = light.radius();
        let view_pos = (*view * world.extend(1.0)).xyz();

        if !sphere_inside(frustum, view_pos, radius) {
            continue;
        }
        let dist = -view_pos.z;
        if dist - radius > max_dist || dist + radius < min_dist {
            continue;
        }
        out.push(i as u32);
    }
    out
}

/// Cull the whole grid, packing per-tile results into a flat index list the
/// way the GPU does.
pub fn cull_grid(
    frustums: &[Frustum],
    lights: &[GpuLight],
    view: &Mat4,
    depth_extent: (f32, f32),
) -> (Vec<u32>, Vec<GridCell>) {
    let mut index_list = Vec::new();
    let mut grid = Vec::with_capacity(frustums.len());
    for frustum in frustums {
        let indices = cull_tile(frustum, lights, view, depth_extent);
        grid.push(GridCell {
            offset: index_list.len() as u32,
            count: indices.len() as u32,
        });
        index_list.extend(indices);
    }
    (index_list, grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frustum::{grid_on_host, tiles_for, unproject, pixel_to_ndc};
    use crate::TILE_SIZE;
    use glam::Vec2;

    const SCREEN: Vec2 = Vec2::new(1280.0, 720.0);
    const FULL_EXTENT: (f32, f32) = (0.0, f32::MAX);

    fn test_proj() -> Mat4 {
        Mat4::perspective_rh(45f32.to_radians(), SCREEN.x / SCREEN.y, 50.0, 3000.0)
    }

    fn light_at(world: Vec3, radius: f32) -> GpuLight {
        GpuLight::new(world, 0.005, world, radius, Vec3::ONE, 0.0)
    }

    /// World position whose projection lands at the center of tile (tx, ty),
    /// `depth` units down the view ray. Identity view, so world == view space.
    fn world_at_tile(inv_proj: &Mat4, tx: u32, ty: u32, depth: f32) -> Vec3 {
        let center = Vec2::new(
            (tx as f32 + 0.5) * TILE_SIZE as f32,
            (ty as f32 + 0.5) * TILE_SIZE as f32,
        );
        unproject(inv_proj, pixel_to_ndc(center, SCREEN)).normalize() * depth
    }

    #[test]
    fn light_lands_in_its_own_tile_and_not_across_the_screen() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustums = grid_on_host(&inv_proj, SCREEN);
        let tiles_x = tiles_for(SCREEN.x as u32);

        let (tx, ty) = (12, 20);
        let lights = vec![light_at(world_at_tile(&inv_proj, tx, ty, 400.0), 1.0)];
        let view = Mat4::IDENTITY;

        let own = &frustums[(tx + ty * tiles_x) as usize];
        assert_eq!(cull_tile(own, &lights, &view, FULL_EXTENT), vec![0]);

        let far = &frustums[(60 + 5 * tiles_x) as usize];
        assert!(cull_tile(far, &lights, &view, FULL_EXTENT).is_empty());
    }

    #[test]
    fn large_radius_spills_into_neighbor_tiles() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustums = grid_on_host(&inv_proj, SCREEN);
        let tiles_x = tiles_for(SCREEN.x as u32);

        let (tx, ty) = (30, 15);
        let lights = vec![light_at(world_at_tile(&inv_proj, tx, ty, 300.0), 60.0)];
        let view = Mat4::IDENTITY;

        let neighbor = &frustums[((tx + 1) + ty * tiles_x) as usize];
        assert_eq!(cull_tile(neighbor, &lights, &view, FULL_EXTENT), vec![0]);
    }

    #[test]
    fn overflow_truncates_to_lowest_indices() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustum = crate::frustum::tile_frustum(&inv_proj, 10, 10, SCREEN);

        // 100 coincident lights, all visible to the tile.
        let world = world_at_tile(&inv_proj, 10, 10, 500.0);
        let lights: Vec<_> = (0..100).map(|_| light_at(world, 50.0)).collect();

        let culled = cull_tile(&frustum, &lights, &Mat4::IDENTITY, FULL_EXTENT);
        assert_eq!(culled.len(), MAX_LIGHTS_PER_TILE as usize);
        let expected: Vec<u32> = (0..MAX_LIGHTS_PER_TILE).collect();
        assert_eq!(culled, expected);
    }

    #[test]
    fn depth_extent_rejects_occluded_lights() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustum = crate::frustum::tile_frustum(&inv_proj, 10, 10, SCREEN);
        let world = world_at_tile(&inv_proj, 10, 10, 1000.0);
        let lights = vec![light_at(world, 20.0)];

        // Tile geometry sits at 100..200 units, the light at ~1000.
        assert!(cull_tile(&frustum, &lights, &Mat4::IDENTITY, (100.0, 200.0)).is_empty());
        // With the extent reaching the light it survives.
        assert_eq!(
            cull_tile(&frustum, &lights, &Mat4::IDENTITY, (100.0, 1100.0)),
            vec![0]
        );
    }

    #[test]
    fn cleared_depth_keeps_only_lights_reaching_the_far_plane() {
        // Empty scene: depth cleared to 1.0 everywhere, so every tile's
        // extent collapses onto the far plane.
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustums = grid_on_host(&inv_proj, SCREEN);

        let far = -view_depth(&inv_proj, 1.0);
        assert!((far - 3000.0).abs() < 1.0, "cleared depth maps to zfar, got {far}");
        let extent = (far, far);

        // An origin light whose sphere reaches the far plane sits on all
        // four planes of every tile frustum, so each tile lists exactly it.
        let big = vec![light_at(Vec3::ZERO, far + 10.0)];
        let (index_list, grid) = cull_grid(&frustums, &big, &Mat4::IDENTITY, extent);
        assert_eq!(index_list.len(), frustums.len());
        assert!(grid.iter().all(|c| c.count == 1));

        // A small mid-scene light passes every plane test in its own tile
        // but falls short of the far-plane extent, so no tile keeps it.
        let small = vec![light_at(world_at_tile(&inv_proj, 10, 10, 500.0), 10.0)];
        let (index_list, _) = cull_grid(&frustums, &small, &Mat4::IDENTITY, extent);
        assert!(index_list.is_empty());
    }

    #[test]
    fn grid_is_consistent_with_per_tile_culling() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustums = grid_on_host(&inv_proj, SCREEN);

        let mut lights = Vec::new();
        for i in 0..50u32 {
            let tx = (i * 7) % tiles_for(SCREEN.x as u32);
            let ty = (i * 13) % tiles_for(SCREEN.y as u32);
            lights.push(light_at(world_at_tile(&inv_proj, tx, ty, 200.0 + i as f32 * 20.0), 30.0));
        }

        let view = Mat4::IDENTITY;
        let (index_list, grid) = cull_grid(&frustums, &lights, &view, FULL_EXTENT);

        let total: u32 = grid.iter().map(|c| c.count).sum();
        assert_eq!(total as usize, index_list.len());

        for (frustum, cell) in frustums.iter().zip(&grid) {
            let range = cell.offset as usize..(cell.offset + cell.count) as usize;
            assert!(range.end <= index_list.len());
            assert_eq!(
                index_list[range],
                cull_tile(frustum, &lights, &view, FULL_EXTENT)[..]
            );
        }
    }

    #[test]
    fn every_placed_light_is_found_by_some_tile() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let frustums = grid_on_host(&inv_proj, SCREEN);

        let lights: Vec<_> = (0..20u32)
            .map(|i| {
                let tx = 5 + (i * 3) % 60;
                let ty = 3 + (i * 5) % 35;
                light_at(world_at_tile(&inv_proj, tx, ty, 500.0), 10.0)
            })
            .collect();

        let (index_list, _) = cull_grid(&frustums, &lights, &Mat4::IDENTITY, FULL_EXTENT);
        for i in 0..lights.len() as u32 {
            assert!(index_list.contains(&i), "light {i} missing from every tile");
        }
    }
}
