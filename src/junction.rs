use crate::math::Point2d;
use crate::{EdgeId, JunctionId};

/// A node of the road network, where edges meet.
#[derive(Clone, Debug)]
pub struct Junction {
    id: JunctionId,
    /// The location of the junction in world space.
    pos: Point2d,
    edges_in: Vec<EdgeId>,
    edges_out: Vec<EdgeId>,
}

impl Junction {
    pub(crate) fn new(id: JunctionId, pos: Point2d) -> Self {
        Self {
            id,
            pos,
            edges_in: vec![],
            edges_out: vec![],
        }
    }

    pub fn id(&self) -> JunctionId {
        self.id
    }

    /// The location of the junction in world space.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The edges that end at this junction.
    pub fn incoming_edges(&self) -> &[EdgeId] {
        &self.edges_in
    }

    /// The edges that start at this junction.
    pub fn outgoing_edges(&self) -> &[EdgeId] {
        &self.edges_out
    }

    pub(crate) fn add_edge_in(&mut self, edge: EdgeId) {
        self.edges_in.push(edge);
    }

    pub(crate) fn add_edge_out(&mut self, edge: EdgeId) {
        self.edges_out.push(edge);
    }
}
