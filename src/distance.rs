//! Weighted distance transform: Dijkstra on the pixel grid.
//!
//! Seeds enter the queue at distance 0; relaxation walks the 4-neighbourhood
//! through the mask with a caller-supplied, non-negative cost for entering a
//! pixel from a given step direction. Pixels never relaxed keep `+inf`. The
//! binary heap is caller-owned so its backing storage survives across frames.

use crate::image::Image;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Pending queue entry: tentative distance to a pixel.
#[derive(Clone, Copy, Debug)]
pub struct QueueItem {
    pub index: usize,
    pub distance: f32,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, Dijkstra wants the smallest
        // tentative distance first. Distances are finite and non-negative.
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

const STEPS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Compute shortest-path distances from the seed set.
///
/// - `seed(i)`: source pixels, settled at distance 0.
/// - `mask(i)`: traversable pixels; anything else is never relaxed and keeps
///   `+inf` in the output.
/// - `cost(i, step)`: non-negative cost of entering pixel `i` from the
///   neighbour at offset `-step`.
/// - `limit`: tentative distances above this are not relaxed.
///
/// The queue is drained on entry; its allocation is reused by the caller.
pub fn weighted_distance_transform<S, M, C>(
    out: &mut Image<f32>,
    seed: S,
    mask: M,
    cost: C,
    queue: &mut BinaryHeap<QueueItem>,
    limit: f32,
) where
    S: Fn(usize) -> bool,
    M: Fn(usize) -> bool,
    C: Fn(usize, (i32, i32)) -> f32,
{
    let (w, h) = out.shape();

    queue.clear();
    for i in 0..out.len() {
        if seed(i) {
            out[i] = 0.0;
            queue.push(QueueItem {
                index: i,
                distance: 0.0,
            });
        } else {
            out[i] = f32::INFINITY;
        }
    }

    while let Some(item) = queue.pop() {
        if item.distance > out[item.index] {
            continue; // stale entry, already settled cheaper
        }

        let x = (item.index % w) as i32;
        let y = (item.index / w) as i32;

        for step in STEPS {
            let nx = x + step.0;
            let ny = y + step.1;
            if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                continue;
            }

            let j = ny as usize * w + nx as usize;
            if !mask(j) {
                continue;
            }

            let next = item.distance + cost(j, step);
            if next > limit || next >= out[j] {
                continue;
            }

            out[j] = next;
            queue.push(QueueItem {
                index: j,
                distance: next,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        w: usize,
        h: usize,
        seeds: &[(usize, usize)],
        limit: f32,
    ) -> Image<f32> {
        let mut out = Image::new(w, h);
        let mut queue = BinaryHeap::new();
        let seed_idx: Vec<usize> = seeds.iter().map(|&(x, y)| y * w + x).collect();
        weighted_distance_transform(
            &mut out,
            |i| seed_idx.contains(&i),
            |_| true,
            |_, _| 1.0,
            &mut queue,
            limit,
        );
        out
    }

    #[test]
    fn seeds_have_distance_zero() {
        let out = run(5, 5, &[(2, 2)], 100.0);
        assert_eq!(out[(2, 2)], 0.0);
    }

    #[test]
    fn uniform_cost_gives_manhattan_distance() {
        let out = run(5, 5, &[(0, 0)], 100.0);
        assert_eq!(out[(3, 0)], 3.0);
        assert_eq!(out[(2, 2)], 4.0);
        assert_eq!(out[(4, 4)], 8.0);
    }

    #[test]
    fn two_seeds_meet_at_the_nearer_one() {
        // Equidistant midpoint between (3, 3) and (7, 3) on a uniform grid.
        let out = run(11, 11, &[(3, 3), (7, 3)], 100.0);
        assert_eq!(out[(5, 3)], 2.0);
        assert_eq!(out[(4, 3)], 1.0);
        assert_eq!(out[(8, 3)], 1.0);
    }

    #[test]
    fn limit_cuts_off_relaxation() {
        let out = run(9, 1, &[(0, 0)], 3.0);
        assert_eq!(out[(3, 0)], 3.0);
        assert!(out[(4, 0)].is_infinite());
    }

    #[test]
    fn masked_pixels_keep_infinity_and_block_paths() {
        let mut out = Image::new(5, 1);
        let mut queue = BinaryHeap::new();
        weighted_distance_transform(
            &mut out,
            |i| i == 0,
            |i| i != 2,
            |_, _| 1.0,
            &mut queue,
            100.0,
        );
        assert_eq!(out[(1, 0)], 1.0);
        assert!(out[(2, 0)].is_infinite());
        assert!(out[(3, 0)].is_infinite());
    }

    #[test]
    fn relaxed_pixels_satisfy_the_triangle_inequality() {
        // Spatially varying cost; every settled pixel must obey
        // d[p] <= d[q] + cost(p, p - q) against all finite neighbours.
        let w = 7;
        let h = 7;
        let cost_at = |i: usize| 0.5 + ((i * 31) % 7) as f32 / 7.0;

        let mut out = Image::new(w, h);
        let mut queue = BinaryHeap::new();
        weighted_distance_transform(
            &mut out,
            |i| i == 3 * w + 3,
            |_| true,
            |i, _| cost_at(i),
            &mut queue,
            100.0,
        );

        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let p = y as usize * w + x as usize;
                if out[p].is_infinite() {
                    continue;
                }
                for step in STEPS {
                    let qx = x - step.0;
                    let qy = y - step.1;
                    if qx < 0 || qy < 0 || qx >= w as i32 || qy >= h as i32 {
                        continue;
                    }
                    let q = qy as usize * w + qx as usize;
                    if out[q].is_finite() {
                        assert!(out[p] <= out[q] + cost_at(p) + 1e-5);
                    }
                }
            }
        }
    }
}
