//! Frame Scheduler
//!
//! Decides per tick which work runs: person counting happens every frame,
//! the expensive face pipeline only every N-th frame. The scheduler never
//! queues frames; each tick consumes exactly one latest-frame read.

/// Work plan for one processing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// Processing-side frame number, starting at 1.
    pub frame_seq: u64,
    /// Whether the face pipeline runs on this frame.
    pub run_recognition: bool,
}

/// Per-tick work scheduler.
#[derive(Debug)]
pub struct Scheduler {
    frame_seq: u64,
    recognize_every_n: u64,
}

impl Scheduler {
    /// Creates a scheduler that runs recognition every `recognize_every_n`
    /// frames.
    pub fn new(recognize_every_n: u64) -> Self {
        Self {
            frame_seq: 0,
            recognize_every_n: recognize_every_n.max(1),
        }
    }

    /// Advances to the next frame and returns its work plan.
    pub fn tick(&mut self) -> TickPlan {
        self.frame_seq += 1;
        TickPlan {
            frame_seq: self.frame_seq,
            run_recognition: self.frame_seq % self.recognize_every_n == 0,
        }
    }

    /// Number of frames scheduled so far.
    pub fn frames_scheduled(&self) -> u64 {
        self.frame_seq
    }
}
