//! Preset catalog.
//!
//! Maps track identifiers to a streamed file, a generated noise tag, or
//! silence. Work presets favour steady noise for concentration; break presets
//! are relaxed acoustic music.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::types::{Channel, SourceKind, TrackConfig, Volume};

/// Identifier of the silent preset present in both catalogs.
pub const SILENCE_ID: &str = "silence";

/// Default work track.
pub const DEFAULT_WORK_TRACK: &str = "white_noise";

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: &'static str,
    pub display_name: &'static str,
    pub source_kind: SourceKind,
    pub locator: &'static str,
}

const fn preset(
    id: &'static str,
    display_name: &'static str,
    source_kind: SourceKind,
    locator: &'static str,
) -> Preset {
    Preset {
        id,
        display_name,
        source_kind,
        locator,
    }
}

const SILENCE: Preset = preset(SILENCE_ID, "無音", SourceKind::Silence, "generated_silence");

static WORK_PRESETS: &[Preset] = &[
    preset("white_noise", "White Noise（作業用）", SourceKind::GeneratedNoise, "white"),
    preset("brown_noise", "Brown Noise（作業用）", SourceKind::GeneratedNoise, "brown"),
    preset("rain", "Rain（雨音）", SourceKind::GeneratedNoise, "rain"),
    preset("ocean", "Ocean（波音）", SourceKind::GeneratedNoise, "ocean"),
    preset("forest", "Forest（森）", SourceKind::GeneratedNoise, "forest"),
    preset("cafe", "Cafe（カフェ）", SourceKind::GeneratedNoise, "cafe"),
    preset(
        "white_noise_recording",
        "White Noise（録音）",
        SourceKind::StreamedFile,
        "audio/work/white-noise.mp3",
    ),
    SILENCE,
];

static BREAK_PRESETS: &[Preset] = &[
    preset(
        "acoustic07",
        "Acoustic 07",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic07.mp3",
    ),
    preset(
        "acoustic16",
        "Acoustic 16",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic16.mp3",
    ),
    preset(
        "acoustic29",
        "Acoustic 29",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic29.mp3",
    ),
    preset(
        "acoustic38",
        "Acoustic 38",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic38.mp3",
    ),
    preset(
        "acoustic41",
        "Acoustic 41",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic41.mp3",
    ),
    preset(
        "acoustic42",
        "Acoustic 42",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic42.mp3",
    ),
    preset(
        "acoustic50",
        "Acoustic 50",
        SourceKind::StreamedFile,
        "audio/break/maou_bgm_acoustic50.mp3",
    ),
    SILENCE,
];

/// Static catalog plus the root that relative locators resolve against.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    asset_root: String,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl PresetRegistry {
    /// `asset_root` is a directory or an http(s) base URL.
    pub fn new(asset_root: impl Into<String>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    pub fn asset_root(&self) -> &str {
        &self.asset_root
    }

    /// All presets offered for a channel.
    pub fn presets(&self, channel: Channel) -> &'static [Preset] {
        match channel {
            Channel::Work => WORK_PRESETS,
            Channel::Break => BREAK_PRESETS,
        }
    }

    /// Looks up a preset in one channel's catalog.
    pub fn find(&self, channel: Channel, id: &str) -> Option<&'static Preset> {
        self.presets(channel).iter().find(|p| p.id == id)
    }

    /// Looks up a preset in either catalog, work first.
    pub fn find_any(&self, id: &str) -> Option<&'static Preset> {
        self.find(Channel::Work, id)
            .or_else(|| self.find(Channel::Break, id))
    }

    /// Resolves a preset id into a playable track for `channel`.
    pub fn resolve(&self, channel: Channel, id: &str, volume: Volume) -> Option<TrackConfig> {
        self.find(channel, id).map(|p| self.track(p, volume))
    }

    /// Resolves a preset id from either catalog.
    pub fn resolve_any(&self, id: &str, volume: Volume) -> Option<TrackConfig> {
        self.find_any(id).map(|p| self.track(p, volume))
    }

    /// The initial selection for a channel: white noise for work, a random
    /// music track for breaks.
    pub fn default_track<R: Rng + ?Sized>(&self, channel: Channel, rng: &mut R) -> &'static str {
        match channel {
            Channel::Work => DEFAULT_WORK_TRACK,
            Channel::Break => {
                let music: Vec<&Preset> = BREAK_PRESETS
                    .iter()
                    .filter(|p| p.source_kind == SourceKind::StreamedFile)
                    .collect();
                music.choose(rng).map_or(SILENCE_ID, |p| p.id)
            }
        }
    }

    fn track(&self, preset: &Preset, volume: Volume) -> TrackConfig {
        let locator = match preset.source_kind {
            SourceKind::StreamedFile => self.resolve_locator(preset.locator),
            SourceKind::GeneratedNoise | SourceKind::Silence => preset.locator.to_string(),
        };
        TrackConfig::new(preset.id, preset.source_kind, locator, volume)
    }

    fn resolve_locator(&self, locator: &str) -> String {
        if is_remote(locator) || locator.starts_with('/') || self.asset_root.is_empty() {
            return locator.to_string();
        }
        if is_remote(&self.asset_root) {
            format!("{}/{}", self.asset_root.trim_end_matches('/'), locator)
        } else {
            std::path::Path::new(&self.asset_root)
                .join(locator)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// True for http(s) locators.
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}
