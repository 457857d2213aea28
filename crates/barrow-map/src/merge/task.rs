use super::{plan_merge, MergeError, MergeObserver, MergeOptions, MergePlan};
use crate::space::Space;

use barrow_core::glam::DVec3;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What a background merge reports while it runs.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeEvent {
    ParticipantBox { id: String, corners: [DVec3; 8] },
    Progress { done: usize, total: usize },
    Sample { world: DVec3, occupied: bool },
    Layer { y: u32, occupied: usize },
}

/// Shared flag that asks a running merge to stop at its next chunk boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A merge planned on its own thread from a snapshot of the document's spaces.
///
/// The document isn't touched until the caller passes the finished plan to
/// [`Barrow::apply_merge`](crate::Barrow::apply_merge), so readers never see partial results.
pub struct MergeTask {
    events: Receiver<MergeEvent>,
    cancel: CancelToken,
    handle: JoinHandle<Result<Option<MergePlan>, MergeError>>,
}

impl MergeTask {
    pub fn spawn(spaces: Vec<Space>, seed_id: impl Into<String>, options: MergeOptions) -> Self {
        Self::spawn_with_token(spaces, seed_id, options, CancelToken::new())
    }

    pub fn spawn_with_token(
        spaces: Vec<Space>,
        seed_id: impl Into<String>,
        options: MergeOptions,
        cancel: CancelToken,
    ) -> Self {
        let seed_id = seed_id.into();
        let (sender, events) = channel::unbounded();
        let mut observer = ChannelObserver {
            sender,
            cancel: cancel.clone(),
        };
        let handle = thread::spawn(move || plan_merge(&spaces, &seed_id, &options, &mut observer));

        Self {
            events,
            cancel,
            handle,
        }
    }

    pub fn events(&self) -> &Receiver<MergeEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the plan is ready.
    pub fn join(self) -> Result<Option<MergePlan>, MergeError> {
        self.handle.join().map_err(|_| MergeError::TaskPanicked)?
    }
}

struct ChannelObserver {
    sender: Sender<MergeEvent>,
    cancel: CancelToken,
}

impl ChannelObserver {
    fn send(&self, event: MergeEvent) {
        // Nobody listening is fine.
        let _ = self.sender.send(event);
    }
}

impl MergeObserver for ChannelObserver {
    fn on_participant_box(&mut self, id: &str, corners: &[DVec3; 8]) {
        self.send(MergeEvent::ParticipantBox {
            id: id.to_owned(),
            corners: *corners,
        });
    }

    fn on_progress(&mut self, done: usize, total: usize) {
        self.send(MergeEvent::Progress { done, total });
    }

    fn on_sample(&mut self, world: DVec3, occupied: bool) {
        self.send(MergeEvent::Sample { world, occupied });
    }

    fn on_layer(&mut self, y: u32, occupied: usize) {
        self.send(MergeEvent::Layer { y, occupied });
    }

    fn should_cancel(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn yield_now(&mut self) {
        thread::yield_now();
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::{GridSize, VoxelGrid};
    use crate::merge::NoopObserver;
    use crate::space::SpaceType;
    use crate::voxel::VoxelType;
    use crate::Barrow;

    fn spaces() -> Vec<Space> {
        ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let vox = VoxelGrid::new(GridSize::splat(6), 0.5, VoxelType::Rock).unwrap();
                Space::new(*id, SpaceType::Tunnel, DVec3::new(i as f64 * 2.0, 0.0, 0.0), GridSize::splat(6), 0.5)
                    .with_vox(vox)
            })
            .collect()
    }

    #[test]
    fn background_plan_matches_sync_plan() {
        let options = MergeOptions {
            chunk_size: 10,
            ..Default::default()
        };
        let sync = plan_merge(&spaces(), "b", &options, &mut NoopObserver).unwrap();

        let task = MergeTask::spawn(spaces(), "b", options);
        let events = task.events().clone();
        let plan = task.join().unwrap();
        assert_eq!(plan, sync);

        let progress: Vec<MergeEvent> = events.try_iter().collect();
        let total = plan.unwrap().grid.size().volume();
        assert!(!progress.is_empty());
        assert_eq!(progress.last(), Some(&MergeEvent::Progress { done: total, total }));
    }

    #[test]
    fn debug_events_are_streamed() {
        let options = MergeOptions {
            debug: true,
            ..Default::default()
        };
        let task = MergeTask::spawn(spaces(), "a", options);
        let events = task.events().clone();
        let plan = task.join().unwrap().unwrap();

        let events: Vec<MergeEvent> = events.try_iter().collect();
        let boxes = events
            .iter()
            .filter(|e| matches!(e, MergeEvent::ParticipantBox { .. }))
            .count();
        let samples = events.iter().filter(|e| matches!(e, MergeEvent::Sample { .. })).count();
        let layers: usize = events
            .iter()
            .filter_map(|e| match e {
                MergeEvent::Layer { occupied, .. } => Some(*occupied),
                _ => None,
            })
            .sum();
        assert_eq!(boxes, 3);
        assert_eq!(samples, plan.grid.size().volume());
        assert_eq!(layers, plan.grid.occupied_count());
    }

    #[test]
    fn cancelled_task_leaves_document_alone() {
        let mut barrow = Barrow::default();
        for space in spaces() {
            barrow.insert(space);
        }
        let before = barrow.clone();

        let token = CancelToken::new();
        token.cancel();
        let task = MergeTask::spawn_with_token(barrow.spaces().to_vec(), "a", MergeOptions::default(), token);
        assert_eq!(task.join(), Err(MergeError::Cancelled));
        assert_eq!(barrow, before);
    }

    #[test]
    fn plan_applies_after_join() {
        let mut barrow = Barrow::default();
        for space in spaces() {
            barrow.insert(space);
        }

        let task = barrow.spawn_merge("c", MergeOptions::default());
        let plan = task.join().unwrap().unwrap();
        assert_eq!(barrow.apply_merge(plan), Ok("c".to_owned()));
        assert_eq!(barrow.len(), 1);
    }
}
