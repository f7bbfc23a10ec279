//! Transition planning for the final concatenation.
//!
//! Every boundary between two segments gets the same transition. With `N` segments and
//! transition length `t`, boundary `i` starts at
//! `offset[i] = offset[i - 1] + duration[i] - t`, with `offset[0] = duration[0] - t`,
//! which is exactly the `offset` argument ffmpeg's `xfade` filter expects when the
//! filters are chained left to right.

use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Result, SlidecastError};

/// Longest transition accepted from configuration, in seconds.
pub const MAX_TRANSITION_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    None,
    Fade,
    FadeBlack,
    FadeWhite,
    Dissolve,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    CircleOpen,
    CircleClose,
    Pixelize,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 14] = [
        TransitionKind::None,
        TransitionKind::Fade,
        TransitionKind::FadeBlack,
        TransitionKind::FadeWhite,
        TransitionKind::Dissolve,
        TransitionKind::WipeLeft,
        TransitionKind::WipeRight,
        TransitionKind::WipeUp,
        TransitionKind::WipeDown,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::CircleOpen,
        TransitionKind::CircleClose,
        TransitionKind::Pixelize,
    ];

    /// Name of the `xfade` transition, which is also the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fade => "fade",
            Self::FadeBlack => "fadeblack",
            Self::FadeWhite => "fadewhite",
            Self::Dissolve => "dissolve",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
            Self::WipeUp => "wipeup",
            Self::WipeDown => "wipedown",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
            Self::CircleOpen => "circleopen",
            Self::CircleClose => "circleclose",
            Self::Pixelize => "pixelize",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = SlidecastError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                SlidecastError::Config(format!(
                    "Invalid transition '{}'. Valid transitions: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Validated transition configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSettings {
    pub kind: TransitionKind,
    pub duration: f64,
}

impl TransitionSettings {
    pub fn none() -> Self {
        Self {
            kind: TransitionKind::None,
            duration: 0.0,
        }
    }

    /// Validate raw configuration values. Transitions are cosmetic, so anything
    /// invalid degrades to no transition instead of failing the run.
    pub fn validate(kind: &str, duration: f64) -> Self {
        let kind = match kind.parse::<TransitionKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("{}; rendering without transitions", e);
                return Self::none();
            }
        };

        if !duration.is_finite() || !(0.0..=MAX_TRANSITION_SECONDS).contains(&duration) {
            warn!(
                "Transition duration {} is outside [0, {}] seconds; rendering without transitions",
                duration, MAX_TRANSITION_SECONDS
            );
            return Self::none();
        }

        if kind == TransitionKind::None || duration == 0.0 {
            return Self::none();
        }

        Self { kind, duration }
    }

    pub fn is_enabled(&self) -> bool {
        self.kind != TransitionKind::None && self.duration > 0.0
    }
}

/// Where each boundary's overlap starts on the cumulative output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub kind: TransitionKind,
    pub duration: f64,
    /// `(segment_index, offset_seconds)`: the transition into `segment_index` starts at `offset_seconds`.
    pub points: Vec<(usize, f64)>,
}

impl TransitionPlan {
    pub fn empty() -> Self {
        Self {
            kind: TransitionKind::None,
            duration: 0.0,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn offsets(&self) -> Vec<f64> {
        self.points.iter().map(|(_, offset)| *offset).collect()
    }

    /// Length of the concatenated output.
    pub fn total_duration(&self, durations: &[f64]) -> f64 {
        durations.iter().sum::<f64>() - self.duration * self.points.len() as f64
    }

    /// `-filter_complex` graph chaining `xfade` on video and `acrossfade` on audio over
    /// inputs `0..=points.len()`. The final streams are labelled `[vout]` and `[aout]`.
    pub fn filter_graph(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let last = self.points.len();
        let mut video = Vec::with_capacity(last);
        let mut audio = Vec::with_capacity(last);

        for (step, (index, offset)) in self.points.iter().enumerate() {
            let (video_in, audio_in) = if step == 0 {
                ("[0:v]".to_string(), "[0:a]".to_string())
            } else {
                (format!("[v{}]", step), format!("[a{}]", step))
            };
            let (video_out, audio_out) = if step + 1 == last {
                ("[vout]".to_string(), "[aout]".to_string())
            } else {
                (format!("[v{}]", step + 1), format!("[a{}]", step + 1))
            };

            video.push(format!(
                "{}[{}:v]xfade=transition={}:duration={:.3}:offset={:.3}{}",
                video_in, index, self.kind, self.duration, offset, video_out
            ));
            audio.push(format!(
                "{}[{}:a]acrossfade=d={:.3}{}",
                audio_in, index, self.duration, audio_out
            ));
        }

        video.extend(audio);
        Some(video.join(";"))
    }
}

/// Compute the transition points for segments of the given durations.
pub fn plan(durations: &[f64], settings: &TransitionSettings) -> Result<TransitionPlan> {
    if let Some(bad) = durations.iter().find(|d| !d.is_finite() || **d < 0.0) {
        return Err(SlidecastError::Transition(format!("Invalid segment duration {}", bad)));
    }

    if !settings.is_enabled() || durations.len() < 2 {
        return Ok(TransitionPlan::empty());
    }

    let t = settings.duration;
    if let Some((index, d)) = durations.iter().enumerate().find(|(_, d)| **d < t) {
        return Err(SlidecastError::Transition(format!(
            "Segment {} lasts {:.3}s, shorter than the {:.3}s transition",
            index, d, t
        )));
    }

    let mut points = Vec::with_capacity(durations.len() - 1);
    let mut offset = 0.0;
    for (i, d) in durations[..durations.len() - 1].iter().enumerate() {
        offset += d - t;
        points.push((i + 1, offset));
    }

    Ok(TransitionPlan {
        kind: settings.kind,
        duration: t,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fade(duration: f64) -> TransitionSettings {
        TransitionSettings {
            kind: TransitionKind::Fade,
            duration,
        }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{} != {}", a, e);
        }
    }

    #[test]
    fn test_plan_offsets() {
        let plan = plan(&[5.0, 4.0, 6.0], &fade(0.5)).unwrap();
        assert_close(&plan.offsets(), &[4.5, 8.0]);
        assert_eq!(plan.points.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
        assert!((plan.total_duration(&[5.0, 4.0, 6.0]) - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_segment_has_empty_plan() {
        assert!(plan(&[12.0], &fade(1.0)).unwrap().is_empty());
        assert!(plan(&[], &fade(1.0)).unwrap().is_empty());
    }

    #[test]
    fn test_disabled_transition_has_empty_plan() {
        assert!(plan(&[3.0, 4.0], &TransitionSettings::none()).unwrap().is_empty());
        assert!(plan(&[3.0, 4.0], &fade(0.0)).unwrap().is_empty());
    }

    #[test]
    fn test_segment_shorter_than_transition_is_error() {
        let result = plan(&[3.0, 0.2, 4.0], &fade(0.5));
        assert!(matches!(result, Err(SlidecastError::Transition(_))));
    }

    #[test]
    fn test_invalid_duration_is_error() {
        assert!(plan(&[3.0, f64::NAN], &fade(0.5)).is_err());
        assert!(plan(&[-1.0, 2.0], &TransitionSettings::none()).is_err());
    }

    #[test]
    fn test_validate_falls_back_to_none() {
        assert_eq!(TransitionSettings::validate("sparkle", 1.0), TransitionSettings::none());
        assert_eq!(TransitionSettings::validate("fade", 6.0), TransitionSettings::none());
        assert_eq!(TransitionSettings::validate("fade", -0.1), TransitionSettings::none());
        assert_eq!(TransitionSettings::validate("none", 1.0), TransitionSettings::none());
        assert_eq!(TransitionSettings::validate("Dissolve", 0.75), TransitionSettings {
            kind: TransitionKind::Dissolve,
            duration: 0.75,
        });
    }

    #[test]
    fn test_filter_graph_chains_transitions() {
        let plan = plan(&[5.0, 4.0, 6.0], &fade(0.5)).unwrap();
        let graph = plan.filter_graph().unwrap();
        assert_eq!(
            graph,
            "[0:v][1:v]xfade=transition=fade:duration=0.500:offset=4.500[v1];\
             [v1][2:v]xfade=transition=fade:duration=0.500:offset=8.000[vout];\
             [0:a][1:a]acrossfade=d=0.500[a1];\
             [a1][2:a]acrossfade=d=0.500[aout]"
        );
    }

    #[test]
    fn test_filter_graph_for_two_segments() {
        let plan = plan(&[2.0, 2.0], &fade(1.0)).unwrap();
        assert_eq!(
            plan.filter_graph().unwrap(),
            "[0:v][1:v]xfade=transition=fade:duration=1.000:offset=1.000[vout];\
             [0:a][1:a]acrossfade=d=1.000[aout]"
        );
        assert!(TransitionPlan::empty().filter_graph().is_none());
    }

    #[test]
    fn test_kind_round_trip_names() {
        for kind in TransitionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransitionKind>().unwrap(), kind);
        }
    }
}
