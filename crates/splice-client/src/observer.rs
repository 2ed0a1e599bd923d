//! Playback observer that stands in for the video surface
//!
//! Tracks where the (virtual) video is seeked to so `status` can report the
//! word and phone currently sounding.

use std::cell::RefCell;
use std::rc::Rc;

use splice_core::engine::{PlaybackObserver, VideoFilter};
use splice_core::segment::{block_at, phone_at, phone_label};
use splice_core::{EditorBlock, TranscriptBlock};

/// Virtual video position
#[derive(Debug, Default)]
pub struct VideoState {
    /// Media time at `anchor`
    position: f64,
    /// Output-clock time of the last seek, `None` while paused
    anchor: Option<f64>,
    /// Current CSS filter string
    pub filter: String,
}

impl VideoState {
    fn seek(&mut self, position: f64, at: f64) {
        self.position = position;
        self.anchor = Some(at);
    }

    fn pause(&mut self, now: Option<f64>) {
        if let Some(now) = now {
            self.position = self.position_at(now);
        }
        self.anchor = None;
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Media time at output-clock time `now`
    pub fn position_at(&self, now: f64) -> f64 {
        match self.anchor {
            Some(anchor) => self.position + (now - anchor).max(0.0),
            None => self.position,
        }
    }
}

/// Describe the transcript block (and phone, for words) at media time `t`
pub fn describe_highlight(transcript: &[TranscriptBlock], t: f64) -> Option<String> {
    let block = block_at(transcript, t)?;
    let Some(word) = &block.word else {
        return Some(format!("#{} (pause)", block.source));
    };
    let phone = phone_at(word, t)
        .and_then(|idx| word.phones.get(idx))
        .map(|p| phone_label(&p.phone));
    Some(match phone {
        Some(phone) => format!("#{} '{}' /{}/", block.source, block.text, phone),
        None => format!("#{} '{}'", block.source, block.text),
    })
}

/// Logs block changes and keeps [`VideoState`] in step with playback
pub struct LogObserver {
    video: Rc<RefCell<VideoState>>,
    last_block_end: Option<f64>,
}

impl LogObserver {
    pub fn new(video: Rc<RefCell<VideoState>>) -> Self {
        Self {
            video,
            last_block_end: None,
        }
    }
}

impl PlaybackObserver for LogObserver {
    fn block_started(&mut self, block: &EditorBlock, at: f64) {
        self.video.borrow_mut().seek(block.start(), at);
        self.last_block_end = Some(at + block.duration());
        log::info!(
            "block {} [{:.2}-{:.2}] {}",
            block.id,
            block.start(),
            block.end(),
            block.text()
        );
    }

    fn stopped(&mut self) {
        self.video.borrow_mut().pause(self.last_block_end.take());
        log::info!("video paused");
    }

    fn filter_changed(&mut self, filter: &VideoFilter) {
        let css = filter.to_css();
        log::debug!("video filter: {}", css);
        self.video.borrow_mut().filter = css;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::{Phone, Word, WordCase};

    fn word_block() -> TranscriptBlock {
        TranscriptBlock {
            source: 1,
            text: "This".to_string(),
            start: 1.0,
            end: 1.4,
            word: Some(Word {
                case: WordCase::Success,
                word: "This".to_string(),
                aligned_word: "this".to_string(),
                start: 1.0,
                end: 1.4,
                start_offset: 0,
                end_offset: 4,
                phones: vec![
                    Phone {
                        phone: "dh_B".to_string(),
                        duration: 0.1,
                    },
                    Phone {
                        phone: "ih_I".to_string(),
                        duration: 0.3,
                    },
                ],
            }),
        }
    }

    #[test]
    fn test_describe_highlight() {
        let gap = TranscriptBlock {
            source: 0,
            text: "␣".to_string(),
            start: 0.0,
            end: 1.0,
            word: None,
        };
        let transcript = vec![gap, word_block()];
        assert_eq!(describe_highlight(&transcript, 0.5).unwrap(), "#0 (pause)");
        assert_eq!(describe_highlight(&transcript, 1.05).unwrap(), "#1 'This' /dh/");
        assert_eq!(describe_highlight(&transcript, 1.3).unwrap(), "#1 'This' /ih/");
        assert!(describe_highlight(&transcript, 5.0).is_none());
    }

    #[test]
    fn test_observer_tracks_video() {
        let video = Rc::new(RefCell::new(VideoState::default()));
        let mut observer = LogObserver::new(video.clone());
        let block = EditorBlock::copy_of(&word_block(), 3);

        observer.block_started(&block, 10.0);
        assert!(video.borrow().is_playing());
        assert!((video.borrow().position_at(10.2) - 1.2).abs() < 1e-9);

        observer.stopped();
        assert!(!video.borrow().is_playing());
        assert!((video.borrow().position_at(99.0) - 1.4).abs() < 1e-9);

        observer.filter_changed(&VideoFilter::from_knobs(&Default::default()));
        assert!(video.borrow().filter.starts_with("brightness("));
    }
}
