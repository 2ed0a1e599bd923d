//! Lookahead playback scheduler
//!
//! Plays the editor sequence back to back, one block ahead of the audio
//! clock. Each iteration:
//!
//! 1. resolves the cursor's index by id in the sequence as it is *now*
//! 2. picks the next index (cyclic, see [`next_index`])
//! 3. schedules that block's source range at the running `next_time`
//! 4. arms the block-start effect (video seek + highlight) for that moment
//! 5. advances `next_time` by the block's duration
//! 6. sleeps until `safety_margin` before `next_time`
//!
//! ```text
//!  clock ───────────────────────────────────────────────────────────►
//!        |──── block A ────|──── block B ────|──── block C ────|
//!                     ^ wake: schedule B
//!                                       ^ wake: schedule C
//! ```
//!
//! Because the sequence is re-read on every wake, reordering while playing
//! takes effect at the next boundary without restarting anything. A wake
//! that finds the sequence empty ends playback once the last scheduled
//! block has played out.
//!
//! The scheduler never sleeps itself. The runner asks for
//! [`Scheduler::next_deadline`], waits, and calls [`Scheduler::poll`].

use super::deferred::DeferredTask;
use super::mixer::VideoFilter;
use super::output::{AudioOutput, ScheduledRange};
use crate::sequence::next_index;
use crate::types::{BlockId, EditorBlock};

/// Default lead time before a block boundary at which the next block is
/// scheduled
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.05;

/// Receives the side effects of playback
///
/// Implemented by whatever drives the video and the highlight display.
pub trait PlaybackObserver {
    /// A block began sounding at audio-clock time `at`
    ///
    /// The video should seek to `block.start()` and resume.
    fn block_started(&mut self, block: &EditorBlock, at: f64);

    /// Playback stopped; the video should pause
    fn stopped(&mut self);

    /// Knob values changed; the video filter should follow
    fn filter_changed(&mut self, _filter: &VideoFilter) {}
}

/// Coarse scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not playing
    Idle,
    /// The lookahead loop is running
    Playing,
}

/// The playback state machine
#[derive(Debug)]
pub struct Scheduler {
    playing: bool,
    /// Wrap to the start after the last block
    looping: bool,
    safety_margin: f64,
    /// Block most recently scheduled
    cursor: Option<BlockId>,
    /// Audio-clock time at which the next block should start
    next_time: f64,
    /// When the loop wants to run again
    wake_at: Option<f64>,
    /// Block-start side effect
    effect: DeferredTask<EditorBlock>,
    /// End of the final block when not looping
    finish_at: Option<f64>,
    /// Cached output gain, applied on play
    gain: f32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_MARGIN)
    }
}

impl Scheduler {
    pub fn new(safety_margin: f64) -> Self {
        Self {
            playing: false,
            looping: true,
            safety_margin: safety_margin.max(0.0),
            cursor: None,
            next_time: 0.0,
            wake_at: None,
            effect: DeferredTask::new(),
            finish_at: None,
            gain: 1.0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.playing {
            SchedulerState::Playing
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Id of the block most recently scheduled
    pub fn cursor(&self) -> Option<BlockId> {
        self.cursor
    }

    /// Move the cursor; the block after it plays next
    pub fn set_cursor(&mut self, id: Option<BlockId>) {
        self.cursor = id;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Cache the gain and push it to the output while playing
    pub fn set_gain(&mut self, gain: f32, output: &mut dyn AudioOutput) {
        self.gain = gain;
        if self.playing {
            output.set_gain(gain);
        }
    }

    /// Start playback from the top of the sequence
    ///
    /// Returns `false` (and does nothing) when already playing or when the
    /// sequence is empty.
    pub fn play(&mut self, blocks: &[EditorBlock], output: &mut dyn AudioOutput) -> bool {
        if self.playing || blocks.is_empty() {
            return false;
        }
        self.playing = true;
        // No cursor resolves like the last element: the first pass begins at
        // index 0
        self.cursor = None;
        // A block still playing out after a finish is not cut off
        let now = output.now();
        self.next_time = self.finish_at.take().map_or(now, |end| end.max(now));
        output.set_gain(self.gain);

        log::debug!("scheduler: play ({} blocks)", blocks.len());
        self.step(blocks, output);
        true
    }

    /// Stop playback immediately
    ///
    /// Returns `false` when not playing.
    pub fn pause(&mut self, output: &mut dyn AudioOutput, observer: &mut dyn PlaybackObserver) -> bool {
        if !self.playing {
            return false;
        }
        self.halt(output);
        observer.stopped();
        log::debug!("scheduler: pause");
        true
    }

    /// Earliest audio-clock time at which [`Scheduler::poll`] has work
    pub fn next_deadline(&self) -> Option<f64> {
        [self.wake_at, self.effect.deadline(), self.finish_at]
            .into_iter()
            .flatten()
            .reduce(f64::min)
    }

    /// Perform everything due at the output's current time
    ///
    /// Fires the pending block-start effect, then runs as many loop
    /// iterations as are due. Iterations per poll are bounded by the sequence
    /// length so a run of zero-length blocks cannot spin here.
    pub fn poll(
        &mut self,
        blocks: &[EditorBlock],
        output: &mut dyn AudioOutput,
        observer: &mut dyn PlaybackObserver,
    ) {
        let now = output.now();

        if let Some(fired) = self.effect.take_due(now) {
            observer.block_started(&fired.payload, fired.due);
        }

        for _ in 0..=blocks.len() {
            match self.wake_at {
                Some(at) if at <= now && self.playing => self.step(blocks, output),
                _ => break,
            }
        }

        if matches!(self.finish_at, Some(at) if at <= now) {
            self.finish_at = None;
            log::debug!("scheduler: reached end of sequence");
            observer.stopped();
        }
    }

    /// One iteration of the lookahead loop
    fn step(&mut self, blocks: &[EditorBlock], output: &mut dyn AudioOutput) {
        if !self.playing {
            return;
        }
        if blocks.is_empty() {
            log::debug!("scheduler: sequence empty, stopping");
            self.finish();
            return;
        }

        if !self.looping {
            let at_end = match self.cursor {
                Some(id) => blocks.last().is_some_and(|b| b.id == id),
                None => false,
            };
            if at_end {
                self.finish();
                return;
            }
        }

        let Some(index) = next_index(blocks, self.cursor) else {
            return;
        };
        let block = &blocks[index];

        let start_at = self.next_time.max(output.now());
        output.schedule(ScheduledRange {
            start_at,
            offset: block.start(),
            duration: block.duration(),
        });
        self.effect.schedule(start_at, block.clone());

        self.next_time = start_at + block.duration();
        self.wake_at = Some(self.next_time - self.safety_margin);
        self.cursor = Some(block.id);

        log::trace!(
            "scheduler: block {} [{:.3}, {:.3}) at {:.3}",
            block.id,
            block.start(),
            block.end(),
            start_at
        );
    }

    /// Stop after the block already scheduled has played out
    fn finish(&mut self) {
        self.playing = false;
        self.wake_at = None;
        self.finish_at = Some(self.next_time);
    }

    fn halt(&mut self, output: &mut dyn AudioOutput) {
        self.playing = false;
        self.wake_at = None;
        self.finish_at = None;
        self.effect.cancel();
        output.set_gain(0.0);
        output.stop_all();
    }
}
