use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MAX_BATCH_IMAGES: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Story,
    #[serde(rename = "16:9")]
    Widescreen,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::Square,
        AspectRatio::Portrait4x5,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Story,
        AspectRatio::Widescreen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Story => "9:16",
            AspectRatio::Widescreen => "16:9",
        }
    }

    pub fn dims(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait4x5 => (4, 5),
            AspectRatio::Portrait3x4 => (3, 4),
            AspectRatio::Landscape4x3 => (4, 3),
            AspectRatio::Story => (9, 16),
            AspectRatio::Widescreen => (16, 9),
        }
    }

    /// Placement the format is usually booked for; feeds the prompt.
    pub fn placement(self) -> &'static str {
        match self {
            AspectRatio::Square => "square social feed post",
            AspectRatio::Portrait4x5 => "portrait feed ad",
            AspectRatio::Portrait3x4 => "portrait print-style poster",
            AspectRatio::Landscape4x3 => "landscape display banner",
            AspectRatio::Story => "full-screen vertical story",
            AspectRatio::Widescreen => "widescreen hero banner",
        }
    }

    pub fn is_video_supported(self) -> bool {
        matches!(self, AspectRatio::Story | AspectRatio::Widescreen)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['/', 'x'], ":");
        let ratio = match normalized.as_str() {
            "1:1" | "square" => AspectRatio::Square,
            "4:5" | "feed" => AspectRatio::Portrait4x5,
            "3:4" | "portrait" => AspectRatio::Portrait3x4,
            "4:3" | "landscape" => AspectRatio::Landscape4x3,
            "9:16" | "story" | "vertical" => AspectRatio::Story,
            "16:9" | "wide" | "widescreen" => AspectRatio::Widescreen,
            _ => return Err(format!("Unsupported aspect ratio '{}'.", raw.trim())),
        };
        Ok(ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSlot {
    pub index: usize,
    pub aspect_ratio: AspectRatio,
    pub variant: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectPlan {
    entries: Vec<(AspectRatio, u32)>,
}

impl Default for AspectPlan {
    fn default() -> Self {
        Self {
            entries: vec![
                (AspectRatio::Square, 2),
                (AspectRatio::Story, 1),
                (AspectRatio::Widescreen, 1),
            ],
        }
    }
}

impl AspectPlan {
    /// Builds a plan keeping first-seen order. Zero counts are dropped and
    /// repeated ratios are merged.
    pub fn new(entries: impl IntoIterator<Item = (AspectRatio, u32)>) -> Result<Self, String> {
        let mut merged: Vec<(AspectRatio, u32)> = Vec::new();
        for (ratio, count) in entries {
            if count == 0 {
                continue;
            }
            if let Some(existing) = merged.iter_mut().find(|(row, _)| *row == ratio) {
                existing.1 = existing.1.saturating_add(count);
            } else {
                merged.push((ratio, count));
            }
        }
        let plan = Self { entries: merged };
        if plan.total() > MAX_BATCH_IMAGES as usize {
            return Err(format!(
                "Plan requests {} images; the batch limit is {MAX_BATCH_IMAGES}.",
                plan.total()
            ));
        }
        Ok(plan)
    }

    /// Parses `"1:1=2,16:9,9:16=1"`. A bare ratio counts once.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (ratio_raw, count_raw) = match token.split_once(['=', '*']) {
                Some((ratio, count)) => (ratio, Some(count)),
                None => (token, None),
            };
            let ratio = ratio_raw.parse::<AspectRatio>()?;
            let count = match count_raw {
                Some(value) => value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid image count in '{token}'."))?,
                None => 1,
            };
            entries.push((ratio, count));
        }
        Self::new(entries)
    }

    pub fn entries(&self) -> &[(AspectRatio, u32)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| *count as usize).sum()
    }

    pub fn ratios(&self) -> Vec<AspectRatio> {
        self.entries.iter().map(|(ratio, _)| *ratio).collect()
    }

    /// One slot per requested image, in plan order.
    pub fn fan_out(&self) -> Vec<ImageSlot> {
        let mut slots = Vec::with_capacity(self.total());
        for (ratio, count) in &self.entries {
            for variant in 1..=*count {
                slots.push(ImageSlot {
                    index: slots.len(),
                    aspect_ratio: *ratio,
                    variant,
                });
            }
        }
        slots
    }
}

impl fmt::Display for AspectPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self
            .entries
            .iter()
            .map(|(ratio, count)| format!("{ratio}={count}"))
            .collect::<Vec<String>>();
        f.write_str(&rows.join(","))
    }
}
