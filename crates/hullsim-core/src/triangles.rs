//! Triangle store: mesh faces over the springs.
//!
//! Points are stored clockwise (y up). Sub-springs are the three edges in
//! `[ab, bc, ca]` order; covered springs are every spring the face hides,
//! sub-springs included.

use crate::types::ElementIndex;

pub struct Triangles {
    pub(crate) is_deleted: Vec<bool>,
    pub(crate) endpoints: Vec<[ElementIndex; 3]>,
    pub(crate) sub_springs: Vec<[ElementIndex; 3]>,
    pub(crate) covered_springs: Vec<Vec<ElementIndex>>,
}

impl Triangles {
    pub fn new() -> Self {
        Self {
            is_deleted: Vec::new(),
            endpoints: Vec::new(),
            sub_springs: Vec::new(),
            covered_springs: Vec::new(),
        }
    }

    pub fn add(
        &mut self,
        endpoints: [ElementIndex; 3],
        sub_springs: [ElementIndex; 3],
        covered_springs: Vec<ElementIndex>,
    ) -> ElementIndex {
        debug_assert!(sub_springs.iter().all(|s| covered_springs.contains(s)));
        let t = self.is_deleted.len();
        self.is_deleted.push(false);
        self.endpoints.push(endpoints);
        self.sub_springs.push(sub_springs);
        self.covered_springs.push(covered_springs);
        t
    }

    pub fn element_count(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_deleted(&self, t: ElementIndex) -> bool {
        self.is_deleted[t]
    }

    pub(crate) fn set_deleted(&mut self, t: ElementIndex, is_deleted: bool) {
        debug_assert_ne!(self.is_deleted[t], is_deleted);
        self.is_deleted[t] = is_deleted;
    }

    pub fn endpoints(&self, t: ElementIndex) -> [ElementIndex; 3] {
        self.endpoints[t]
    }

    /// The first endpoint owns the triangle.
    pub fn point_a(&self, t: ElementIndex) -> ElementIndex {
        self.endpoints[t][0]
    }

    pub fn sub_springs(&self, t: ElementIndex) -> [ElementIndex; 3] {
        self.sub_springs[t]
    }

    pub fn covered_springs(&self, t: ElementIndex) -> &[ElementIndex] {
        &self.covered_springs[t]
    }

    pub fn contains_point(&self, t: ElementIndex, p: ElementIndex) -> bool {
        self.endpoints[t].contains(&p)
    }

    /// Vertex following `p` in the triangle's winding.
    pub fn next_vertex(&self, t: ElementIndex, p: ElementIndex) -> Option<ElementIndex> {
        let [a, b, c] = self.endpoints[t];
        match p {
            _ if p == a => Some(b),
            _ if p == b => Some(c),
            _ if p == c => Some(a),
            _ => None,
        }
    }

    pub fn live_count(&self) -> usize {
        self.is_deleted.iter().filter(|d| !**d).count()
    }
}

impl Default for Triangles {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winding_navigation() {
        let mut triangles = Triangles::new();
        let t = triangles.add([4, 7, 9], [0, 1, 2], vec![0, 1, 2, 3]);
        assert_eq!(triangles.point_a(t), 4);
        assert_eq!(triangles.next_vertex(t, 4), Some(7));
        assert_eq!(triangles.next_vertex(t, 9), Some(4));
        assert_eq!(triangles.next_vertex(t, 5), None);
        assert!(triangles.contains_point(t, 9));
        assert_eq!(triangles.covered_springs(t).len(), 4);

        triangles.set_deleted(t, true);
        assert_eq!(triangles.live_count(), 0);
    }
}
