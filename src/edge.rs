use crate::{EdgeId, JunctionId, LaneId};

/// A directed road segment between two junctions, made up of parallel lanes.
#[derive(Clone, Debug)]
pub struct Edge {
    id: EdgeId,
    start: JunctionId,
    end: JunctionId,
    /// The lanes of the edge, ordered by index from the right.
    lanes: Vec<LaneId>,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, start: JunctionId, end: JunctionId) -> Self {
        Self {
            id,
            start,
            end,
            lanes: vec![],
        }
    }

    /// Gets the edge ID.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The junction the edge leaves from.
    pub fn start(&self) -> JunctionId {
        self.start
    }

    /// The junction the edge leads to.
    pub fn end(&self) -> JunctionId {
        self.end
    }

    /// The lanes of the edge, ordered by index.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// Gets the lane with the given index.
    pub fn lane(&self, index: usize) -> Option<LaneId> {
        self.lanes.get(index).copied()
    }

    /// Appends a lane, returning the index it was given.
    pub(crate) fn push_lane(&mut self, lane: LaneId) -> usize {
        self.lanes.push(lane);
        self.lanes.len() - 1
    }
}
