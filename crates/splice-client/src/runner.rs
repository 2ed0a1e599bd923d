//! Client event loop
//!
//! Single-threaded: relay messages, console lines, fetch completions and
//! scheduler deadlines are all serialized through one `select!` so the
//! session is never touched concurrently.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use splice_core::audio::CpalOutput;
use splice_core::engine::{AudioOutput, NullOutput, Scheduler};
use splice_core::media::{LoadedMedia, MediaError};
use splice_core::sync::{Command, Followup, Session, SessionResult};
use splice_core::Origin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::config::ClientConfig;
use crate::connection;
use crate::console::{self, ConsoleCommand, HELP};
use crate::fetch::MediaFetcher;
use crate::observer::{describe_highlight, LogObserver, VideoState};

/// Shortest sleep before re-polling a due deadline
const MIN_POLL: Duration = Duration::from_millis(1);

/// Sleep used when nothing is scheduled
const IDLE_POLL: Duration = Duration::from_secs(3600);

/// Results of background HTTP work
enum Event {
    Media {
        url: String,
        result: Result<LoadedMedia, MediaError>,
    },
    Uploaded(Result<String, MediaError>),
}

fn open_output(config: &ClientConfig) -> Box<dyn AudioOutput> {
    let connected = config.role.audio_connected();
    match CpalOutput::open(&config.audio, connected) {
        Ok(output) => {
            log::info!(
                "Audio output: {} Hz, {} frame buffer{}",
                output.sample_rate(),
                output.buffer_size(),
                if connected { "" } else { " (monitor muted)" }
            );
            Box::new(output)
        }
        Err(e) => {
            log::warn!("Audio output unavailable ({}), running in UI-only mode", e);
            Box::new(NullOutput::new())
        }
    }
}

struct Runner {
    session: Session,
    fetcher: MediaFetcher,
    events: UnboundedSender<Event>,
    video: Rc<RefCell<VideoState>>,
}

impl Runner {
    fn apply(&mut self, command: Command, origin: Origin) {
        let result = self.session.apply(command, origin);
        self.handle(result);
    }

    fn handle(&mut self, result: SessionResult) {
        match result {
            Ok(Some(Followup::Fetch { url })) => self.spawn_fetch(url),
            Ok(None) => {}
            Err(e) => log::warn!("{}", e),
        }
    }

    fn spawn_fetch(&self, url: String) {
        let fetcher = self.fetcher.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;
            let _ = events.send(Event::Media { url, result });
        });
    }

    fn spawn_upload(&self, path: PathBuf) {
        let fetcher = self.fetcher.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = fetcher.upload(&path).await;
            let _ = events.send(Event::Uploaded(result));
        });
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Media { url, result } => match result {
                Ok(media) => self.apply(Command::MediaReady(media), Origin::Local),
                Err(e) => {
                    log::error!("Failed to load {}: {}", url, e);
                    self.apply(Command::MediaFailed { url }, Origin::Local);
                }
            },
            Event::Uploaded(Ok(url)) => {
                log::info!("Transcription finished: {}", url);
                self.apply(Command::LoadVideo(Some(url)), Origin::Local);
            }
            Event::Uploaded(Err(e)) => log::error!("Upload failed: {}", e),
        }
    }

    /// Returns `false` when the user asked to quit
    fn on_console(&mut self, command: ConsoleCommand) -> bool {
        let can_edit = self.session.role().can_edit();
        match command {
            ConsoleCommand::Session(command) => self.apply(command, Origin::Local),
            ConsoleCommand::Load(_) | ConsoleCommand::Upload(_) if !can_edit => {
                log::warn!("Loading videos is not available in the {} role", self.session.role());
            }
            ConsoleCommand::Load(url) => self.apply(Command::LoadVideo(Some(url)), Origin::Local),
            ConsoleCommand::Upload(path) => self.spawn_upload(path),
            ConsoleCommand::List => self.print_blocks(),
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    fn print_blocks(&self) {
        let cursor = self.session.cursor();
        for (index, block) in self.session.blocks().iter().enumerate() {
            let marker = if Some(block.id) == cursor { '>' } else { ' ' };
            println!(
                "{} {:3} id={:<4} src={:<4} [{:7.2} - {:7.2}] {:?}",
                marker,
                index,
                block.id,
                block.block.source,
                block.start(),
                block.end(),
                block.text()
            );
        }
        println!("{} blocks", self.session.blocks().len());
    }

    fn print_status(&self) {
        let video = self.video.borrow();
        let position = video.position_at(self.session.now());
        println!("role:      {}", self.session.role());
        println!(
            "video:     {}{}",
            self.session.video_url().unwrap_or("-"),
            if self.session.is_loading() { " (loading)" } else { "" }
        );
        println!(
            "transport: {:?} looping={} cursor={:?}",
            self.session.scheduler_state(),
            self.session.is_looping(),
            self.session.cursor()
        );
        println!("knobs:     {:?}", self.session.knobs().0);
        println!("filter:    {}", video.filter);
        if video.is_playing() {
            let highlight = describe_highlight(self.session.transcript(), position);
            println!(
                "position:  {:.2}s {}",
                position,
                highlight.unwrap_or_default()
            );
        }
    }

    fn next_wait(&self) -> Duration {
        match self.session.next_deadline() {
            Some(deadline) => {
                let wait = (deadline - self.session.now()).max(0.0);
                Duration::from_secs_f64(wait).max(MIN_POLL)
            }
            None => IDLE_POLL,
        }
    }
}

/// Connect to the relay and run until the connection drops or the user quits
pub async fn run(config: ClientConfig, initial_load: Option<String>) -> anyhow::Result<()> {
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let mut link = connection::connect(&config.server_url, outbox_rx).await?;
    let fetcher = MediaFetcher::new(&config.server_url).map_err(anyhow::Error::msg)?;

    let video = Rc::new(RefCell::new(VideoState::default()));
    let session = Session::new(
        config.role,
        Scheduler::new(config.scheduler.safety_margin()),
        open_output(&config),
        Box::new(LogObserver::new(video.clone())),
        outbox_tx,
    )
    .with_knobs(config.knobs);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut runner = Runner {
        session,
        fetcher,
        events: events_tx,
        video,
    };
    log::info!("Session started as {}", config.role);

    if let Some(url) = initial_load {
        runner.on_console(ConsoleCommand::Load(url));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;

    loop {
        let wait = runner.next_wait();
        tokio::select! {
            message = link.next_message() => match message {
                Ok(message) => {
                    log::debug!("relay -> {}", message.kind());
                    runner.apply(message.into(), Origin::Remote);
                }
                Err(e) => {
                    log::error!("Relay connection lost: {}", e);
                    break;
                }
            },
            line = lines.next_line(), if console_open => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Ok(Some(command)) => {
                        if !runner.on_console(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                },
                Ok(None) => {
                    log::info!("Console closed; continuing without it");
                    console_open = false;
                }
                Err(e) => {
                    log::warn!("Console read failed: {}", e);
                    console_open = false;
                }
            },
            Some(event) = events_rx.recv() => runner.on_event(event),
            _ = tokio::time::sleep(wait) => runner.session.poll(),
        }
    }

    Ok(())
}
