//! Equalizer presets
//!
//! Each preset is a list of ffmpeg audio filters joined into one `-af`
//! filter graph for the transcode stage. The graph is fixed when the decode
//! pipeline starts, so changing preset means restarting the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of equalizer presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualizerMode {
    #[default]
    Normal,
    Bassboost,
    Vocal,
    Nightcore,
}

impl EqualizerMode {
    /// All presets, in display order
    pub const ALL: [EqualizerMode; 4] = [
        EqualizerMode::Normal,
        EqualizerMode::Bassboost,
        EqualizerMode::Vocal,
        EqualizerMode::Nightcore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EqualizerMode::Normal => "normal",
            EqualizerMode::Bassboost => "bassboost",
            EqualizerMode::Vocal => "vocal",
            EqualizerMode::Nightcore => "nightcore",
        }
    }

    /// Individual ffmpeg filters for this preset
    pub fn filters(&self) -> &'static [&'static str] {
        match self {
            EqualizerMode::Normal => &[],
            EqualizerMode::Bassboost => &[
                "bass=g=10:f=110:w=0.6",
                "equalizer=f=40:width_type=h:width=50:g=6",
                "equalizer=f=80:width_type=h:width=50:g=4",
            ],
            EqualizerMode::Vocal => &[
                "equalizer=f=300:width_type=h:width=100:g=4",
                "equalizer=f=1000:width_type=h:width=200:g=3",
                "equalizer=f=3000:width_type=h:width=200:g=2",
            ],
            // Speed up and pitch up: resample at 1.25x, then slow the tempo back
            EqualizerMode::Nightcore => &[
                "asetrate=48000*1.25",
                "atempo=0.8",
                "equalizer=f=5000:width_type=h:width=200:g=3",
            ],
        }
    }

    /// Comma-joined filter graph, or `None` when the preset is flat
    pub fn filter_graph(&self) -> Option<String> {
        let filters = self.filters();
        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }
}

impl fmt::Display for EqualizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EqualizerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(EqualizerMode::Normal),
            "bassboost" => Ok(EqualizerMode::Bassboost),
            "vocal" => Ok(EqualizerMode::Vocal),
            "nightcore" => Ok(EqualizerMode::Nightcore),
            other => Err(format!(
                "unknown equalizer mode '{}' (expected normal, bassboost, vocal or nightcore)",
                other
            )),
        }
    }
}
