//! 8-connected component labeling of a binary mask using union-find.

use common::Buffer2;

/// Per-pixel component labels. `0` is background, components are numbered
/// `1..=count` in raster order of their first pixel.
#[derive(Debug)]
pub(crate) struct LabelMap {
    pub labels: Buffer2<u32>,
    pub count: usize,
}

/// Already visited neighbours in a raster scan: W, NW, N, NE.
const PREVIOUS_NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (-1, -1), (0, -1), (1, -1)];

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        // index 0 is the background label
        Self { parent: vec![0] }
    }

    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) -> u32 {
        let ra = self.find(a);
        let rb = self.find(b);
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi as usize] = lo;
        lo
    }
}

/// Label connected foreground regions of `mask` with 8-connectivity.
pub(crate) fn label_components(mask: &Buffer2<bool>) -> LabelMap {
    let (width, height) = mask.dimensions();
    let mut labels = Buffer2::new_filled(width, height, 0u32);
    let mut uf = UnionFind::new();

    for y in 0..height {
        for x in 0..width {
            if !mask[(x, y)] {
                continue;
            }

            let mut current = 0u32;
            for (dx, dy) in PREVIOUS_NEIGHBOURS {
                if let Some(&l) = labels.get_checked(x as isize + dx, y as isize + dy)
                    && l != 0
                {
                    current = if current == 0 { l } else { uf.union(current, l) };
                }
            }

            labels[(x, y)] = if current == 0 {
                uf.make_set()
            } else {
                current
            };
        }
    }

    // resolve provisional labels to compact raster-ordered ids
    let mut compact = vec![0u32; uf.parent.len()];
    let mut count = 0u32;
    for label in labels.pixels_mut() {
        if *label == 0 {
            continue;
        }
        let root = uf.find(*label) as usize;
        if compact[root] == 0 {
            count += 1;
            compact[root] = count;
        }
        *label = compact[root];
    }

    LabelMap {
        labels,
        count: count as usize,
    }
}
