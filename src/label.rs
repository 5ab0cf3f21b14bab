//! Connected-component labelling via two-pass union-find.
//!
//! Foreground is every pixel whose value exceeds the threshold. The first
//! pass assigns provisional labels from the already-visited neighbours and
//! records equivalences; the second pass resolves each pixel to its canonical
//! label, renumbered into a contiguous `1..=num_labels` range. Background
//! stays 0.

use crate::image::Image;

struct UnionFind {
    parent: Vec<u16>,
}

impl UnionFind {
    fn new() -> Self {
        // Entry 0 is the background sentinel and never merged.
        Self { parent: vec![0] }
    }

    fn make_set(&mut self) -> u16 {
        let label = self.parent.len() as u16;
        self.parent.push(label);
        label
    }

    fn find(&mut self, mut x: u16) -> u16 {
        while self.parent[x as usize] != x {
            // Path halving keeps the trees flat without recursion.
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    fn union(&mut self, a: u16, b: u16) -> u16 {
        let ra = self.find(a);
        let rb = self.find(b);
        let (lo, hi) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi as usize] = lo;
        lo
    }
}

/// Label connected components of `input > threshold` into `out`.
///
/// `CONN` selects the neighbourhood (4 or 8). Returns the number of labels;
/// label values are contiguous in `[1, num_labels]`, background is 0.
pub fn label<const CONN: usize>(out: &mut Image<u16>, input: &Image<f32>, threshold: f32) -> u16 {
    assert!(CONN == 4 || CONN == 8, "connectivity must be 4 or 8");
    assert_eq!(out.shape(), input.shape(), "label shape mismatch");

    let (w, h) = input.shape();
    let mut uf = UnionFind::new();

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if input[i] <= threshold {
                out[i] = 0;
                continue;
            }

            let mut current = 0u16;
            let merge = |uf: &mut UnionFind, current: u16, neighbour: u16| -> u16 {
                if neighbour == 0 {
                    current
                } else if current == 0 {
                    neighbour
                } else {
                    uf.union(current, neighbour)
                }
            };

            if x > 0 {
                current = merge(&mut uf, current, out[i - 1]);
            }
            if y > 0 {
                current = merge(&mut uf, current, out[i - w]);
                if CONN == 8 {
                    if x > 0 {
                        current = merge(&mut uf, current, out[i - w - 1]);
                    }
                    if x + 1 < w {
                        current = merge(&mut uf, current, out[i - w + 1]);
                    }
                }
            }

            out[i] = if current == 0 { uf.make_set() } else { current };
        }
    }

    // Resolve to canonical labels and renumber them contiguously in scan
    // order.
    let mut remap = vec![0u16; uf.parent.len()];
    let mut num_labels = 0u16;
    for i in 0..out.len() {
        let provisional = out[i];
        if provisional == 0 {
            continue;
        }
        let root = uf.find(provisional);
        if remap[root as usize] == 0 {
            num_labels += 1;
            remap[root as usize] = num_labels;
        }
        out[i] = remap[root as usize];
    }

    num_labels
}
