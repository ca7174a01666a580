use std::collections::{BTreeSet, VecDeque};

use tracing::trace;

pub trait AudioService {
    fn play(&mut self, key: &str, looped: bool, volume: Option<f32>);
    fn stop(&mut self, key: &str);
    fn stop_all(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Play { key: String, looped: bool, volume: Option<f32> },
    Stop { key: String },
    StopAll,
}

/// Audio sink that only records what it was asked to do. Used by the headless runner and
/// anywhere a real mixer is not attached.
pub struct AudioLog {
    enabled: bool,
    capacity: usize,
    commands: VecDeque<AudioCommand>,
    playing: BTreeSet<String>,
}

impl AudioLog {
    pub fn new(capacity: usize) -> Self {
        Self { enabled: true, capacity: capacity.max(1), commands: VecDeque::new(), playing: BTreeSet::new() }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn recent_commands(&self) -> impl ExactSizeIterator<Item = &AudioCommand> {
        self.commands.iter()
    }

    pub fn play_count(&self, key: &str) -> usize {
        self.commands.iter().filter(|cmd| matches!(cmd, AudioCommand::Play { key: k, .. } if k == key)).count()
    }

    pub fn is_playing(&self, key: &str) -> bool {
        self.playing.contains(key)
    }

    fn push_command(&mut self, command: AudioCommand) {
        trace!(?command, "audio");
        if self.commands.len() == self.capacity {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }
}

impl AudioService for AudioLog {
    fn play(&mut self, key: &str, looped: bool, volume: Option<f32>) {
        if !self.enabled {
            return;
        }
        if looped {
            self.playing.insert(key.to_string());
        }
        self.push_command(AudioCommand::Play { key: key.to_string(), looped, volume });
    }

    fn stop(&mut self, key: &str) {
        self.playing.remove(key);
        self.push_command(AudioCommand::Stop { key: key.to_string() });
    }

    fn stop_all(&mut self) {
        self.playing.clear();
        self.push_command(AudioCommand::StopAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut audio = AudioLog::new(2);
        audio.play("a", false, None);
        audio.play("b", false, None);
        audio.play("c", false, None);
        assert_eq!(audio.recent_commands().len(), 2);
        assert_eq!(audio.play_count("a"), 0);
        assert_eq!(audio.play_count("c"), 1);
    }

    #[test]
    fn looped_tracks_stay_playing_until_stopped() {
        let mut audio = AudioLog::new(8);
        audio.play("ambience", true, Some(0.4));
        assert!(audio.is_playing("ambience"));
        audio.stop_all();
        assert!(!audio.is_playing("ambience"));
    }
}
