// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! The closed emotion vocabulary, its fixed valence/arousal/dominance table,
//! and the primary-emotion re-targeting map (spec §3 "VAD", §4.7 step 4-5).

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// One of the closed set of emotion types the pipeline scores against.
/// Serialized as its upper-case name (and deserialized case-insensitively,
/// with a few common synonyms) so config lexicons can write `happy:` or
/// `HAPPY:` interchangeably as YAML keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    Confused,
}

pub const ALL_EMOTIONS: [Emotion; 8] = [
    Emotion::Neutral,
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Fearful,
    Emotion::Disgusted,
    Emotion::Surprised,
    Emotion::Confused,
];

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "NEUTRAL",
            Emotion::Happy => "HAPPY",
            Emotion::Sad => "SAD",
            Emotion::Angry => "ANGRY",
            Emotion::Fearful => "FEARFUL",
            Emotion::Disgusted => "DISGUSTED",
            Emotion::Surprised => "SURPRISED",
            Emotion::Confused => "CONFUSED",
        }
    }

    /// The `valence, arousal, dominance` triple this emotion contributes
    /// score-weighted to the final VAD (spec §4.7 step 5). Dominance sits
    /// at 0.5 (neutral control) for emotions where the source material
    /// gives no strong directional cue — this is a simplification, not a
    /// claim about the psychology of the emotion.
    fn vad(&self) -> Vad {
        match self {
            Emotion::Neutral => Vad { valence: 0.0, arousal: 0.1, dominance: 0.5 },
            Emotion::Happy => Vad { valence: 0.85, arousal: 0.6, dominance: 0.65 },
            Emotion::Sad => Vad { valence: -0.7, arousal: 0.25, dominance: 0.25 },
            Emotion::Angry => Vad { valence: -0.6, arousal: 0.8, dominance: 0.7 },
            Emotion::Fearful => Vad { valence: -0.65, arousal: 0.75, dominance: 0.2 },
            Emotion::Disgusted => Vad { valence: -0.55, arousal: 0.5, dominance: 0.4 },
            Emotion::Surprised => Vad { valence: 0.15, arousal: 0.8, dominance: 0.45 },
            Emotion::Confused => Vad { valence: -0.2, arousal: 0.45, dominance: 0.35 },
        }
    }

    /// Default output re-targeting (spec §4.7 step 4): expresses
    /// downstream-animation preferences without distorting the raw scores
    /// the pipeline computed. Kept as an implementation-side constant per
    /// spec §9's open question — not exposed in [`crate::EmotionConfig`].
    pub fn output_mapped(&self) -> Emotion {
        match self {
            Emotion::Fearful => Emotion::Confused,
            Emotion::Disgusted => Emotion::Angry,
            other => *other,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Emotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Emotion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| de::Error::custom(format!("unknown emotion: {s:?}")))
    }
}

impl FromStr for Emotion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEUTRAL" => Ok(Emotion::Neutral),
            "HAPPY" | "JOY" | "JOYFUL" => Ok(Emotion::Happy),
            "SAD" | "SADNESS" => Ok(Emotion::Sad),
            "ANGRY" | "ANGER" => Ok(Emotion::Angry),
            "FEARFUL" | "FEAR" | "AFRAID" => Ok(Emotion::Fearful),
            "DISGUSTED" | "DISGUST" => Ok(Emotion::Disgusted),
            "SURPRISED" | "SURPRISE" => Ok(Emotion::Surprised),
            "CONFUSED" | "CONFUSION" => Ok(Emotion::Confused),
            _ => Err(()),
        }
    }
}

/// Valence/arousal/dominance triple: valence in `[-1, 1]`, arousal and
/// dominance in `[0, 1]` (spec GLOSSARY "VAD").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vad {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
}

impl Vad {
    const ZERO: Vad = Vad { valence: 0.0, arousal: 0.0, dominance: 0.0 };

    /// Score-weighted sum over the fixed emotion→VAD table (spec §4.7 step 5).
    pub fn weighted(scores: &[(Emotion, f32)]) -> Vad {
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            return Vad::ZERO;
        }
        let mut acc = Vad::ZERO;
        for (emotion, score) in scores {
            let w = score / total;
            let v = emotion.vad();
            acc.valence += w * v.valence;
            acc.arousal += w * v.arousal;
            acc.dominance += w * v.dominance;
        }
        acc
    }
}
