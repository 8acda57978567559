use crate::detection::domain::observation::Observation;

/// Per-object tracking slot: the object's last known state plus whether
/// this is the last frame it will be tracked.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingRequest {
    pub id: u64,
    pub target: Observation,
    pub is_last_frame: bool,
}

/// Ordered set of live tracking requests, in detection order.
///
/// Each request is created from exactly one detection and ids are never
/// reused for the lifetime of the set, even across [`ActiveTrackSet::clear`].
#[derive(Debug)]
pub struct ActiveTrackSet {
    requests: Vec<TrackingRequest>,
    next_id: u64,
}

impl Default for ActiveTrackSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTrackSet {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            next_id: 1,
        }
    }

    /// Starts tracking `target` and returns the new request's id.
    pub fn insert(&mut self, target: Observation) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.requests.push(TrackingRequest {
            id,
            target,
            is_last_frame: false,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&TrackingRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut TrackingRequest> {
        self.requests.iter_mut().find(|r| r.id == id)
    }

    pub fn requests(&self) -> &[TrackingRequest] {
        &self.requests
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackingRequest> {
        self.requests.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackingRequest> {
        self.requests.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Removes every request marked last-frame, returning them in order.
    pub fn prune_finished(&mut self) -> Vec<TrackingRequest> {
        let (finished, live): (Vec<_>, Vec<_>) = self
            .requests
            .drain(..)
            .partition(|r| r.is_last_frame);
        self.requests = live;
        finished
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::observation::FaceObservation;
    use crate::shared::geometry::NormalizedRect;

    fn face(x: f64) -> Observation {
        Observation::Face(FaceObservation::new(NormalizedRect::new(x, 0.1, 0.2, 0.2), 0.9))
    }

    #[test]
    fn test_insert_assigns_unique_increasing_ids() {
        let mut set = ActiveTrackSet::new();
        let a = set.insert(face(0.1));
        let b = set.insert(face(0.5));
        assert!(b > a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_preserves_insertion_order() {
        let mut set = ActiveTrackSet::new();
        let ids: Vec<u64> = (0..4).map(|i| set.insert(face(i as f64 * 0.2))).collect();
        let seen: Vec<u64> = set.iter().map(|r| r.id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn test_new_requests_are_not_last_frame() {
        let mut set = ActiveTrackSet::new();
        let id = set.insert(face(0.1));
        assert!(!set.get(id).unwrap().is_last_frame);
    }

    #[test]
    fn test_prune_finished_removes_only_marked() {
        let mut set = ActiveTrackSet::new();
        let a = set.insert(face(0.1));
        let b = set.insert(face(0.4));
        let c = set.insert(face(0.7));
        set.get_mut(b).unwrap().is_last_frame = true;

        let pruned = set.prune_finished();

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].id, b);
        let remaining: Vec<u64> = set.iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![a, c]);
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let mut set = ActiveTrackSet::new();
        let a = set.insert(face(0.1));
        set.clear();
        assert!(set.is_empty());
        let b = set.insert(face(0.1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_unknown_id() {
        let set = ActiveTrackSet::new();
        assert!(set.get(42).is_none());
    }
}
