//! Per-client session state
//!
//! A [`Session`] owns everything one client knows: the transcript of the
//! loaded video, the editor sequence, the mixer knobs, the scheduler and the
//! audio output. Every state change goes through [`Session::apply`], tagged
//! with its [`Origin`]:
//!
//! - `Local` changes are applied and then broadcast through the outbox
//! - `Remote` changes are applied identically and never re-sent
//!
//! That single rule is what keeps two clients from echoing a change back
//! and forth through the relay.
//!
//! Media I/O stays outside: a video load returns [`Followup::Fetch`], and
//! the runner feeds the decoded result back as [`Command::MediaReady`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::message::SyncMessage;
use crate::engine::{AudioOutput, Knobs, PlaybackObserver, Scheduler, SchedulerState};
use crate::media::LoadedMedia;
use crate::sequence::{DragSource, EditorSequence, FilterKind};
use crate::types::{BlockId, EditorBlock, Origin, Role, TranscriptBlock};

/// Edits to the editor sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Reset,
    Clear,
    Shuffle,
    Sort,
    Filter(FilterKind),
    Move {
        source: DragSource,
        destination: Option<usize>,
    },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::Reset => "reset",
            Mutation::Clear => "clear",
            Mutation::Shuffle => "shuffle",
            Mutation::Sort => "sort",
            Mutation::Filter(FilterKind::RemoveWords) => "remove-words",
            Mutation::Filter(FilterKind::RemoveSpaces) => "remove-spaces",
            Mutation::Filter(FilterKind::Forget) => "forget",
            Mutation::Move { .. } => "move",
        }
    }
}

/// Everything that can change a session
#[derive(Debug)]
pub enum Command {
    /// Start loading a video (or unload with `None`)
    LoadVideo(Option<String>),
    /// Media for a pending load finished decoding
    MediaReady(LoadedMedia),
    /// Media for a pending load could not be fetched or decoded
    MediaFailed { url: String },
    /// Replace the whole editor sequence
    ReplaceBlocks(Vec<EditorBlock>),
    Mutate(Mutation),
    Play,
    Pause,
    Toggle,
    SetLooping(bool),
    /// Transport reconciliation from a peer
    Transport {
        playing: bool,
        looping: bool,
        cursor: Option<BlockId>,
    },
    SetKnobs(Knobs),
    SetKnob { index: usize, value: f32 },
}

impl From<SyncMessage> for Command {
    fn from(message: SyncMessage) -> Self {
        match message {
            SyncMessage::Video { url } => Command::LoadVideo(url),
            SyncMessage::Blocks { blocks } => Command::ReplaceBlocks(blocks),
            SyncMessage::Playback {
                playing,
                looping,
                id,
            } => Command::Transport {
                playing,
                looping,
                cursor: id,
            },
            SyncMessage::Parameters { knobs } => Command::SetKnobs(knobs),
        }
    }
}

/// Work the runner has to do on the session's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    /// Fetch and decode `{url}.mp4` and `{url}.json`, then send
    /// [`Command::MediaReady`] or [`Command::MediaFailed`]
    Fetch { url: String },
}

/// Rejected commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{action} is not available in the {role} role")]
    NotPermitted { action: &'static str, role: Role },

    #[error("No video loaded")]
    NoMedia,

    #[error("Knob index {0} out of range")]
    KnobIndex(usize),
}

pub type SessionResult = Result<Option<Followup>, SessionError>;

#[derive(Debug, Clone, PartialEq)]
enum MediaState {
    Empty,
    Loading {
        url: String,
        origin: Origin,
        /// A play that arrived mid-load, with the origin of that play
        play_requested: Option<Origin>,
    },
    Ready {
        url: String,
    },
}

/// One client's state
pub struct Session {
    role: Role,
    transcript: Vec<TranscriptBlock>,
    sequence: EditorSequence,
    knobs: Knobs,
    scheduler: Scheduler,
    media: MediaState,
    output: Box<dyn AudioOutput>,
    observer: Box<dyn PlaybackObserver>,
    outbox: UnboundedSender<SyncMessage>,
    rng: StdRng,
}

impl Session {
    pub fn new(
        role: Role,
        scheduler: Scheduler,
        output: Box<dyn AudioOutput>,
        observer: Box<dyn PlaybackObserver>,
        outbox: UnboundedSender<SyncMessage>,
    ) -> Self {
        Self {
            role,
            transcript: Vec::new(),
            sequence: EditorSequence::new(),
            knobs: Knobs::default(),
            scheduler,
            media: MediaState::Empty,
            output,
            observer,
            outbox,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source (seeded sessions in tests)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Initial knob values, applied without broadcasting
    pub fn with_knobs(mut self, knobs: Knobs) -> Self {
        let knobs = Knobs::clamped(knobs.0);
        self.knobs = knobs;
        self.scheduler.set_gain(knobs.gain(), self.output.as_mut());
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn blocks(&self) -> &[EditorBlock] {
        self.sequence.blocks()
    }

    pub fn transcript(&self) -> &[TranscriptBlock] {
        &self.transcript
    }

    pub fn knobs(&self) -> Knobs {
        self.knobs
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.scheduler.is_looping()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn cursor(&self) -> Option<BlockId> {
        self.scheduler.cursor()
    }

    /// URL of the installed video
    pub fn video_url(&self) -> Option<&str> {
        match &self.media {
            MediaState::Ready { url } => Some(url),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.media, MediaState::Loading { .. })
    }

    /// Audio-clock time of the next scheduler deadline
    pub fn next_deadline(&self) -> Option<f64> {
        self.scheduler.next_deadline()
    }

    /// Current audio-clock time
    pub fn now(&self) -> f64 {
        self.output.now()
    }

    /// Run whatever the scheduler has due
    pub fn poll(&mut self) {
        self.scheduler.poll(
            self.sequence.blocks(),
            self.output.as_mut(),
            self.observer.as_mut(),
        );
    }

    /// Apply a state change
    pub fn apply(&mut self, command: Command, origin: Origin) -> SessionResult {
        match command {
            Command::LoadVideo(url) => return Ok(self.load_video(url, origin)),
            Command::MediaReady(media) => self.install_media(media),
            Command::MediaFailed { url } => self.media_failed(&url),
            Command::ReplaceBlocks(blocks) => {
                self.require_edit("replace", origin)?;
                let was_empty = self.sequence.is_empty();
                self.sequence.replace(blocks);
                self.sequence_changed(was_empty, origin);
            }
            Command::Mutate(mutation) => {
                self.require_edit(mutation.name(), origin)?;
                let was_empty = self.sequence.is_empty();
                self.mutate(mutation);
                self.sequence_changed(was_empty, origin);
            }
            Command::Play => self.play(origin)?,
            Command::Pause => self.pause(origin),
            Command::Toggle => {
                if self.scheduler.is_playing() {
                    self.pause(origin);
                } else {
                    self.play(origin)?;
                }
            }
            Command::SetLooping(looping) => {
                self.scheduler.set_looping(looping);
                if origin.is_local() {
                    self.broadcast_transport();
                }
            }
            Command::Transport {
                playing,
                looping,
                cursor,
            } => self.reconcile_transport(playing, looping, cursor, origin),
            Command::SetKnobs(knobs) => self.set_knobs(Knobs::clamped(knobs.0), origin),
            Command::SetKnob { index, value } => {
                let mut knobs = self.knobs;
                if !knobs.set(index, value) {
                    return Err(SessionError::KnobIndex(index));
                }
                self.set_knobs(knobs, origin);
            }
        }
        Ok(None)
    }

    fn require_edit(&self, action: &'static str, origin: Origin) -> Result<(), SessionError> {
        if origin.is_local() && !self.role.can_edit() {
            return Err(SessionError::NotPermitted {
                action,
                role: self.role,
            });
        }
        Ok(())
    }

    fn broadcast(&self, message: SyncMessage) {
        if self.outbox.send(message).is_err() {
            log::debug!("broadcast: outbox closed, message dropped");
        }
    }

    fn broadcast_transport(&self) {
        self.broadcast(SyncMessage::Playback {
            playing: self.scheduler.is_playing(),
            looping: self.scheduler.is_looping(),
            id: self.scheduler.cursor(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Media
    // ─────────────────────────────────────────────────────────────────────

    fn load_video(&mut self, url: Option<String>, origin: Origin) -> Option<Followup> {
        if origin.is_local() {
            self.broadcast(SyncMessage::Video { url: url.clone() });
        }

        let Some(url) = url else {
            log::info!("load_video: unloading");
            self.stop_playback();
            self.media = MediaState::Empty;
            self.transcript.clear();
            self.sequence.clear();
            self.sequence_changed(false, origin);
            return None;
        };

        let unchanged = match &self.media {
            MediaState::Ready { url: current } | MediaState::Loading { url: current, .. } => {
                *current == url
            }
            MediaState::Empty => false,
        };
        if unchanged && !origin.is_local() {
            log::debug!("load_video: {} already loaded", url);
            return None;
        }

        log::info!("load_video: loading {} ({:?})", url, origin);
        self.stop_playback();
        // Blocks of the old transcript must not reach the new audio; the
        // initiator broadcasts a fresh sequence once its media is in
        self.sequence.clear();
        self.media = MediaState::Loading {
            url: url.clone(),
            origin,
            play_requested: None,
        };
        Some(Followup::Fetch { url })
    }

    fn install_media(&mut self, media: LoadedMedia) {
        let (origin, play_requested) = match &self.media {
            MediaState::Loading {
                url,
                origin,
                play_requested,
            } if *url == media.url => (*origin, *play_requested),
            _ => {
                log::debug!("install_media: stale media for {} ignored", media.url);
                return;
            }
        };

        log::info!(
            "install_media: {} ({} transcript blocks)",
            media.url,
            media.transcript.len()
        );
        self.output.load_source(media.audio);
        self.transcript = media.transcript;
        self.media = MediaState::Ready { url: media.url };

        // The peer that initiated a load owns the initial sequence
        if origin.is_local() {
            self.sequence.reset(&self.transcript);
            self.broadcast_blocks();
        } else {
            self.drop_dangling_blocks();
        }

        // A pending play decides who announces the start. Otherwise the
        // reset is an empty to non-empty change and starts on its own.
        match play_requested {
            Some(play_origin) => self.start_playback(play_origin),
            None if origin.is_local() => self.auto_start(Origin::Local),
            None => {}
        }
    }

    /// Clear blocks received mid-load that point past the new transcript
    fn drop_dangling_blocks(&mut self) {
        let len = self.transcript.len();
        if self.sequence.blocks().iter().any(|b| b.block.source >= len) {
            log::warn!("install_media: sequence does not match the transcript, cleared");
            self.sequence.clear();
        }
    }

    fn media_failed(&mut self, url: &str) {
        if matches!(&self.media, MediaState::Loading { url: current, .. } if current == url) {
            log::warn!("media_failed: {} could not be loaded", url);
            self.media = MediaState::Empty;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sequence
    // ─────────────────────────────────────────────────────────────────────

    fn mutate(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Reset => self.sequence.reset(&self.transcript),
            Mutation::Clear => self.sequence.clear(),
            Mutation::Shuffle => self.sequence.shuffle(&mut self.rng),
            Mutation::Sort => self.sequence.sort(),
            Mutation::Filter(kind) => self.sequence.filter(kind, &mut self.rng),
            Mutation::Move {
                source,
                destination,
            } => {
                if self
                    .sequence
                    .move_block(source, destination, &self.transcript)
                    .is_none()
                {
                    log::debug!("mutate: move of {:?} to {:?} ignored", source, destination);
                }
            }
        }
    }

    /// Broadcast a local change, then start playback if the sequence just
    /// gained its first block
    fn sequence_changed(&mut self, was_empty: bool, origin: Origin) {
        if origin.is_local() {
            self.broadcast_blocks();
        }
        if was_empty {
            self.auto_start(origin);
        }
    }

    fn broadcast_blocks(&self) {
        self.broadcast(SyncMessage::Blocks {
            blocks: self.sequence.blocks().to_vec(),
        });
    }

    fn auto_start(&mut self, origin: Origin) {
        if self.sequence.is_empty()
            || self.scheduler.is_playing()
            || !matches!(self.media, MediaState::Ready { .. })
        {
            return;
        }
        log::debug!("sequence: first block added, starting playback");
        self.start_playback(origin);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    fn play(&mut self, origin: Origin) -> Result<(), SessionError> {
        if let MediaState::Loading { play_requested, .. } = &mut self.media {
            log::debug!("play: deferred until media is ready");
            *play_requested = Some(origin);
            return Ok(());
        }
        match self.media {
            MediaState::Ready { .. } => {
                self.start_playback(origin);
                Ok(())
            }
            _ if origin.is_local() => Err(SessionError::NoMedia),
            _ => {
                log::warn!("play: remote play ignored, no video loaded");
                Ok(())
            }
        }
    }

    fn start_playback(&mut self, origin: Origin) {
        if self
            .scheduler
            .play(self.sequence.blocks(), self.output.as_mut())
            && origin.is_local()
        {
            self.broadcast_transport();
        }
    }

    fn pause(&mut self, origin: Origin) {
        if let MediaState::Loading { play_requested, .. } = &mut self.media {
            *play_requested = None;
        }
        if self
            .scheduler
            .pause(self.output.as_mut(), self.observer.as_mut())
            && origin.is_local()
        {
            self.broadcast_transport();
        }
    }

    /// Pause without broadcasting (the caller broadcasts its own message)
    fn stop_playback(&mut self) {
        self.scheduler
            .pause(self.output.as_mut(), self.observer.as_mut());
    }

    fn reconcile_transport(
        &mut self,
        playing: bool,
        looping: bool,
        cursor: Option<BlockId>,
        origin: Origin,
    ) {
        self.scheduler.set_looping(looping);

        if playing != self.scheduler.is_playing() {
            if playing {
                if let Err(e) = self.play(origin) {
                    log::warn!("transport: {}", e);
                }
            } else {
                self.pause(origin);
            }
        }

        if let Some(id) = cursor {
            if self.sequence.get(id).is_some() {
                self.scheduler.set_cursor(Some(id));
            } else {
                log::warn!("transport: unknown block id {}, cursor unchanged", id);
            }
        }

        if origin.is_local() {
            self.broadcast_transport();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────────────

    fn set_knobs(&mut self, knobs: Knobs, origin: Origin) {
        self.knobs = knobs;
        self.scheduler.set_gain(knobs.gain(), self.output.as_mut());
        self.observer.filter_changed(&knobs.video_filter());
        if origin.is_local() {
            self.broadcast(SyncMessage::Parameters { knobs });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScheduledRange, VideoFilter};
    use crate::media::DecodedAudio;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    #[derive(Default)]
    struct Probe {
        now: f64,
        gain: f32,
        ranges: Vec<ScheduledRange>,
        sources: usize,
        started: Vec<BlockId>,
        stopped: usize,
        filter: Option<VideoFilter>,
    }

    #[derive(Clone, Default)]
    struct Rig(Rc<RefCell<Probe>>);

    impl AudioOutput for Rig {
        fn now(&self) -> f64 {
            self.0.borrow().now
        }
        fn schedule(&mut self, range: ScheduledRange) {
            self.0.borrow_mut().ranges.push(range);
        }
        fn set_gain(&mut self, gain: f32) {
            self.0.borrow_mut().gain = gain;
        }
        fn stop_all(&mut self) {
            self.0.borrow_mut().ranges.clear();
        }
        fn load_source(&mut self, _audio: DecodedAudio) {
            self.0.borrow_mut().sources += 1;
        }
    }

    impl PlaybackObserver for Rig {
        fn block_started(&mut self, block: &EditorBlock, _at: f64) {
            self.0.borrow_mut().started.push(block.id);
        }
        fn stopped(&mut self) {
            self.0.borrow_mut().stopped += 1;
        }
        fn filter_changed(&mut self, filter: &VideoFilter) {
            self.0.borrow_mut().filter = Some(*filter);
        }
    }

    fn session(role: Role) -> (Session, Rig, UnboundedReceiver<SyncMessage>) {
        let probe = Rig::default();
        let (tx, rx) = unbounded_channel();
        let session = Session::new(
            role,
            Scheduler::new(0.05),
            Box::new(probe.clone()),
            Box::new(probe.clone()),
            tx,
        )
        .with_rng(StdRng::seed_from_u64(3));
        (session, probe, rx)
    }

    fn media(url: &str, n: usize) -> LoadedMedia {
        let transcript = (0..n)
            .map(|i| TranscriptBlock {
                source: i,
                text: format!("w{}", i),
                start: i as f64,
                end: i as f64 + 1.0,
                word: None,
            })
            .collect();
        LoadedMedia {
            url: url.to_string(),
            audio: DecodedAudio::new(vec![0.0; 16], 8_000),
            transcript,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SyncMessage>) -> Vec<SyncMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Session with a locally loaded 4-block video, paused, outbox drained
    fn loaded(role: Role) -> (Session, Rig, UnboundedReceiver<SyncMessage>) {
        let (mut s, probe, mut rx) = session(role);
        s.apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Local)
            .unwrap();
        s.apply(Command::MediaReady(media("/uploads/a", 4)), Origin::Local)
            .unwrap();
        s.apply(Command::Pause, Origin::Local).unwrap();
        drain(&mut rx);
        (s, probe, rx)
    }

    fn ids(s: &Session) -> Vec<BlockId> {
        s.blocks().iter().map(|b| b.id).collect()
    }

    fn playbacks(sent: &[SyncMessage]) -> usize {
        sent.iter()
            .filter(|m| matches!(m, SyncMessage::Playback { .. }))
            .count()
    }

    #[test]
    fn test_local_load_broadcasts_video_blocks_then_playback() {
        let (mut s, probe, mut rx) = session(Role::Both);
        let followup = s
            .apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Local)
            .unwrap();
        assert_eq!(
            followup,
            Some(Followup::Fetch {
                url: "/uploads/a".into()
            })
        );
        assert!(s.is_loading());

        s.apply(Command::MediaReady(media("/uploads/a", 3)), Origin::Local)
            .unwrap();
        assert_eq!(s.video_url(), Some("/uploads/a"));
        assert_eq!(ids(&s), vec![0, 1, 2]);
        assert_eq!(probe.0.borrow().sources, 1);

        // The fresh sequence starts playing on its own
        assert!(s.is_playing());
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[0],
            SyncMessage::Video {
                url: Some("/uploads/a".into())
            }
        );
        assert!(matches!(&sent[1], SyncMessage::Blocks { blocks } if blocks.len() == 3));
        assert!(matches!(&sent[2], SyncMessage::Playback { playing: true, .. }));
    }

    #[test]
    fn test_remote_load_clears_sequence_and_is_silent() {
        let (mut s, probe, mut rx) = loaded(Role::Both);

        let followup = s
            .apply(Command::LoadVideo(Some("/uploads/b".into())), Origin::Remote)
            .unwrap();
        assert!(followup.is_some());
        assert!(s.blocks().is_empty());
        s.apply(Command::MediaReady(media("/uploads/b", 2)), Origin::Local)
            .unwrap();

        assert!(s.blocks().is_empty());
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(probe.0.borrow().sources, 2);
        assert!(!s.is_playing());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_blocks_received_mid_load_must_fit_new_transcript() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        let stale = s.blocks().to_vec();

        s.apply(Command::LoadVideo(Some("/uploads/b".into())), Origin::Remote)
            .unwrap();
        s.apply(Command::ReplaceBlocks(stale), Origin::Remote)
            .unwrap();
        assert!(!s.is_playing());
        s.apply(Command::MediaReady(media("/uploads/b", 2)), Origin::Local)
            .unwrap();

        let len = s.transcript().len();
        assert!(s.blocks().iter().all(|b| b.block.source < len));
        assert!(s.blocks().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_remote_unload_clears_sequence() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        s.apply(Command::LoadVideo(None), Origin::Remote).unwrap();
        assert!(s.blocks().is_empty());
        assert!(s.transcript().is_empty());
        assert_eq!(s.video_url(), None);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_remote_reload_of_same_video_is_skipped() {
        let (mut s, _probe, _rx) = loaded(Role::Both);
        let followup = s
            .apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Remote)
            .unwrap();
        assert_eq!(followup, None);
        assert_eq!(s.video_url(), Some("/uploads/a"));
    }

    #[test]
    fn test_stale_media_is_ignored() {
        let (mut s, probe, _rx) = session(Role::Both);
        s.apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Local)
            .unwrap();
        s.apply(Command::LoadVideo(Some("/uploads/b".into())), Origin::Local)
            .unwrap();
        s.apply(Command::MediaReady(media("/uploads/a", 3)), Origin::Local)
            .unwrap();
        assert!(s.is_loading());
        assert_eq!(probe.0.borrow().sources, 0);
    }

    #[test]
    fn test_local_mutation_broadcasts_blocks() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        s.apply(Command::Mutate(Mutation::Shuffle), Origin::Local)
            .unwrap();
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            SyncMessage::Blocks { blocks } => assert_eq!(blocks.as_slice(), s.blocks()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remote_changes_are_never_echoed() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        let blocks = s.blocks()[..2].to_vec();

        s.apply(Command::ReplaceBlocks(blocks.clone()), Origin::Remote)
            .unwrap();
        s.apply(
            Command::Transport {
                playing: true,
                looping: true,
                cursor: Some(blocks[0].id),
            },
            Origin::Remote,
        )
        .unwrap();
        s.apply(Command::SetKnobs(Knobs([0.5, 0.5, 0.5, 0.5])), Origin::Remote)
            .unwrap();
        s.apply(Command::Mutate(Mutation::Sort), Origin::Remote)
            .unwrap();

        assert_eq!(s.blocks(), blocks.as_slice());
        assert!(s.is_playing());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_local_play_broadcasts_cursor() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        s.apply(Command::Play, Origin::Local).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![SyncMessage::Playback {
                playing: true,
                looping: true,
                id: Some(0)
            }]
        );

        s.apply(Command::Toggle, Origin::Local).unwrap();
        assert!(!s.is_playing());
        assert_eq!(
            drain(&mut rx),
            vec![SyncMessage::Playback {
                playing: false,
                looping: true,
                id: Some(0)
            }]
        );
    }

    #[test]
    fn test_remote_transport_resolves_cursor() {
        let (mut s, _probe, _rx) = loaded(Role::Player);
        s.apply(
            Command::Transport {
                playing: true,
                looping: true,
                cursor: Some(2),
            },
            Origin::Remote,
        )
        .unwrap();
        assert!(s.is_playing());
        assert_eq!(s.cursor(), Some(2));

        // Unknown id leaves the cursor alone
        s.apply(
            Command::Transport {
                playing: true,
                looping: false,
                cursor: Some(99),
            },
            Origin::Remote,
        )
        .unwrap();
        assert_eq!(s.cursor(), Some(2));
        assert!(!s.is_looping());
    }

    #[test]
    fn test_play_while_loading_is_deferred() {
        let (mut s, probe, mut rx) = session(Role::Both);
        s.apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Local)
            .unwrap();
        s.apply(Command::Play, Origin::Local).unwrap();
        assert!(!s.is_playing());

        s.apply(Command::MediaReady(media("/uploads/a", 2)), Origin::Local)
            .unwrap();
        assert!(s.is_playing());
        assert_eq!(probe.0.borrow().ranges.len(), 1);

        let sent = drain(&mut rx);
        assert_eq!(playbacks(&sent), 1);
        assert!(matches!(
            sent.last(),
            Some(SyncMessage::Playback { playing: true, .. })
        ));
    }

    #[test]
    fn test_deferred_remote_play_is_not_announced() {
        let (mut s, _probe, mut rx) = loaded(Role::Both);
        s.apply(Command::LoadVideo(Some("/uploads/b".into())), Origin::Local)
            .unwrap();
        s.apply(
            Command::Transport {
                playing: true,
                looping: true,
                cursor: None,
            },
            Origin::Remote,
        )
        .unwrap();
        s.apply(Command::MediaReady(media("/uploads/b", 3)), Origin::Local)
            .unwrap();

        assert!(s.is_playing());
        let sent = drain(&mut rx);
        assert_eq!(playbacks(&sent), 0);
        assert!(matches!(&sent[1], SyncMessage::Blocks { blocks } if blocks.len() == 3));
    }

    #[test]
    fn test_deferred_local_play_is_announced_after_remote_load() {
        let (mut s, _probe, mut rx) = session(Role::Both);
        s.apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Remote)
            .unwrap();
        let blocks: Vec<EditorBlock> = media("/uploads/a", 2)
            .transcript
            .iter()
            .enumerate()
            .map(|(i, b)| EditorBlock::copy_of(b, i as BlockId))
            .collect();
        s.apply(Command::ReplaceBlocks(blocks), Origin::Remote)
            .unwrap();
        s.apply(Command::Play, Origin::Local).unwrap();
        assert!(!s.is_playing());

        s.apply(Command::MediaReady(media("/uploads/a", 2)), Origin::Local)
            .unwrap();
        assert!(s.is_playing());
        assert_eq!(
            drain(&mut rx),
            vec![SyncMessage::Playback {
                playing: true,
                looping: true,
                id: Some(0)
            }]
        );
    }

    #[test]
    fn test_play_without_media_is_rejected_locally() {
        let (mut s, _probe, _rx) = session(Role::Both);
        assert_eq!(s.apply(Command::Play, Origin::Local), Err(SessionError::NoMedia));
        assert_eq!(s.apply(Command::Play, Origin::Remote), Ok(None));
    }

    #[test]
    fn test_player_role_rejects_local_edits() {
        let (mut s, _probe, mut rx) = loaded(Role::Player);
        let err = s
            .apply(Command::Mutate(Mutation::Clear), Origin::Local)
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::NotPermitted {
                action: "clear",
                role: Role::Player
            }
        );
        assert_eq!(s.blocks().len(), 4);
        assert!(drain(&mut rx).is_empty());

        // Remote edits still apply
        s.apply(Command::Mutate(Mutation::Clear), Origin::Remote)
            .unwrap();
        assert!(s.blocks().is_empty());
    }

    #[test]
    fn test_knobs_clamped_broadcast_and_gain_cached() {
        let (mut s, probe, mut rx) = loaded(Role::Both);
        s.apply(Command::SetKnobs(Knobs([2.0, 0.5, 0.0, 0.5])), Origin::Local)
            .unwrap();
        assert_eq!(s.knobs().0, [1.0, 0.5, 0.0, 0.5]);
        assert_eq!(
            drain(&mut rx),
            vec![SyncMessage::Parameters {
                knobs: Knobs([1.0, 0.5, 0.0, 0.5])
            }]
        );
        assert_eq!(probe.0.borrow().filter.map(|f| f.brightness), Some(250.0));

        // Not playing: gain is cached, not pushed
        s.apply(Command::SetKnob { index: 0, value: 0.0 }, Origin::Local)
            .unwrap();
        assert_eq!(probe.0.borrow().gain, 0.0);
        s.apply(Command::SetKnob { index: 0, value: 1.0 }, Origin::Local)
            .unwrap();
        assert_eq!(probe.0.borrow().gain, 0.0);

        s.apply(Command::Play, Origin::Local).unwrap();
        assert_eq!(probe.0.borrow().gain, 1.0);

        assert_eq!(
            s.apply(Command::SetKnob { index: 9, value: 1.0 }, Origin::Local),
            Err(SessionError::KnobIndex(9))
        );
    }

    #[test]
    fn test_clearing_while_playing_goes_idle() {
        let (mut s, probe, _rx) = loaded(Role::Both);
        s.apply(Command::Play, Origin::Local).unwrap();
        s.apply(Command::Mutate(Mutation::Clear), Origin::Local)
            .unwrap();

        probe.0.borrow_mut().now = 0.96;
        s.poll();
        assert_eq!(s.scheduler_state(), SchedulerState::Idle);

        probe.0.borrow_mut().now = 1.0;
        s.poll();
        assert_eq!(probe.0.borrow().stopped, 2);

        s.apply(Command::Mutate(Mutation::Reset), Origin::Local)
            .unwrap();
        assert_eq!(s.scheduler_state(), SchedulerState::Playing);
    }

    #[test]
    fn test_first_block_into_empty_sequence_starts_playback() {
        let (mut s, _probe, mut rx) = loaded(Role::Editor);
        s.apply(Command::Mutate(Mutation::Clear), Origin::Local)
            .unwrap();
        assert!(!s.is_playing());
        drain(&mut rx);

        s.apply(
            Command::Mutate(Mutation::Move {
                source: DragSource::Transcript(1),
                destination: Some(0),
            }),
            Origin::Local,
        )
        .unwrap();
        assert_eq!(s.scheduler_state(), SchedulerState::Playing);
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], SyncMessage::Blocks { blocks } if blocks.len() == 1));
        assert!(matches!(&sent[1], SyncMessage::Playback { playing: true, .. }));
    }

    #[test]
    fn test_remote_first_blocks_start_silently() {
        let (mut s, _probe, mut rx) = loaded(Role::Player);
        let blocks = s.blocks().to_vec();
        s.apply(Command::Mutate(Mutation::Clear), Origin::Remote)
            .unwrap();
        s.apply(Command::ReplaceBlocks(blocks), Origin::Remote)
            .unwrap();
        assert!(s.is_playing());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_initial_knobs_are_clamped() {
        let (s, probe, _rx) = session(Role::Both);
        let mut s = s.with_knobs(Knobs([3.0, -1.0, 0.5, 0.5]));
        assert_eq!(s.knobs().0, [1.0, 0.0, 0.5, 0.5]);

        s.apply(Command::LoadVideo(Some("/uploads/a".into())), Origin::Local)
            .unwrap();
        s.apply(Command::MediaReady(media("/uploads/a", 2)), Origin::Local)
            .unwrap();
        assert!(s.is_playing());
        assert_eq!(probe.0.borrow().gain, 1.0);
    }

    #[test]
    fn test_drag_from_transcript_inserts_copy() {
        let (mut s, _probe, mut rx) = loaded(Role::Editor);
        s.apply(
            Command::Mutate(Mutation::Move {
                source: DragSource::Transcript(1),
                destination: Some(0),
            }),
            Origin::Local,
        )
        .unwrap();
        assert_eq!(ids(&s), vec![4, 0, 1, 2, 3]);
        assert_eq!(s.blocks()[0].block.source, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_message_to_command() {
        let cmd = Command::from(SyncMessage::Playback {
            playing: false,
            looping: true,
            id: None,
        });
        assert!(matches!(
            cmd,
            Command::Transport {
                playing: false,
                looping: true,
                cursor: None
            }
        ));
    }
}
