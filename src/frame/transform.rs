//! Frame transforms and tweening.
//!
//! A [`FrameTransform`] describes how a layer's frame is placed and mixed by
//! the compositor. A [`TweenedTransform`] animates from one transform to
//! another over a number of ticks with a named easing curve.

use crate::error::StageError;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Visual and audio placement of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameTransform {
    /// Opacity (0.0 - 1.0).
    pub opacity: f64,
    /// Audio gain.
    pub volume: f64,
    /// Brightness multiplier.
    pub brightness: f64,
    /// Contrast multiplier.
    pub contrast: f64,
    /// Saturation multiplier.
    pub saturation: f64,
    /// Position of the fill, in normalized coordinates.
    pub fill_translation: [f64; 2],
    /// Scale of the fill.
    pub fill_scale: [f64; 2],
    /// Position of the crop window.
    pub clip_translation: [f64; 2],
    /// Size of the crop window.
    pub clip_scale: [f64; 2],
    /// Frame is used as a key (alpha only).
    pub is_key: bool,
    /// Frame takes part in a mix transition.
    pub is_mix: bool,
}

impl FrameTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        opacity: 1.0,
        volume: 1.0,
        brightness: 1.0,
        contrast: 1.0,
        saturation: 1.0,
        fill_translation: [0.0, 0.0],
        fill_scale: [1.0, 1.0],
        clip_translation: [0.0, 0.0],
        clip_scale: [1.0, 1.0],
        is_key: false,
        is_mix: false,
    };

    /// Interpolate towards `dest` at `time` of `duration` ticks.
    pub fn tween(&self, dest: &Self, time: f64, duration: f64, tweener: Tweener) -> Self {
        let lerp = |source: f64, dest: f64| tweener.tween(time, source, dest - source, duration);
        let lerp2 = |source: [f64; 2], dest: [f64; 2]| {
            [lerp(source[0], dest[0]), lerp(source[1], dest[1])]
        };

        Self {
            opacity: lerp(self.opacity, dest.opacity),
            volume: lerp(self.volume, dest.volume),
            brightness: lerp(self.brightness, dest.brightness),
            contrast: lerp(self.contrast, dest.contrast),
            saturation: lerp(self.saturation, dest.saturation),
            fill_translation: lerp2(self.fill_translation, dest.fill_translation),
            fill_scale: lerp2(self.fill_scale, dest.fill_scale),
            clip_translation: lerp2(self.clip_translation, dest.clip_translation),
            clip_scale: lerp2(self.clip_scale, dest.clip_scale),
            is_key: self.is_key || dest.is_key,
            is_mix: self.is_mix || dest.is_mix,
        }
    }

    /// Check whether the fill is scaled or offset vertically.
    ///
    /// Interlaced output needs deinterlaced sources in that case.
    pub fn moves_vertically(&self) -> bool {
        (self.fill_scale[1] - 1.0).abs() > 0.0001 || self.fill_translation[1].abs() > 0.0001
    }
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Easing curve shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Curve {
    Linear,
    Quad,
    Cubic,
    Quart,
    Quint,
    Sine,
    Expo,
    Circ,
}

/// Which end of the curve is eased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    In,
    Out,
    InOut,
}

/// A named easing function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tweener {
    curve: Curve,
    direction: Direction,
}

/// Registered tween names.
const TWEENS: &[(&str, Curve, Direction)] = &[
    ("linear", Curve::Linear, Direction::In),
    ("easenone", Curve::Linear, Direction::In),
    ("easeinquad", Curve::Quad, Direction::In),
    ("easeoutquad", Curve::Quad, Direction::Out),
    ("easeinoutquad", Curve::Quad, Direction::InOut),
    ("easeincubic", Curve::Cubic, Direction::In),
    ("easeoutcubic", Curve::Cubic, Direction::Out),
    ("easeinoutcubic", Curve::Cubic, Direction::InOut),
    ("easeinquart", Curve::Quart, Direction::In),
    ("easeoutquart", Curve::Quart, Direction::Out),
    ("easeinoutquart", Curve::Quart, Direction::InOut),
    ("easeinquint", Curve::Quint, Direction::In),
    ("easeoutquint", Curve::Quint, Direction::Out),
    ("easeinoutquint", Curve::Quint, Direction::InOut),
    ("easeinsine", Curve::Sine, Direction::In),
    ("easeoutsine", Curve::Sine, Direction::Out),
    ("easeinoutsine", Curve::Sine, Direction::InOut),
    ("easeinexpo", Curve::Expo, Direction::In),
    ("easeoutexpo", Curve::Expo, Direction::Out),
    ("easeinoutexpo", Curve::Expo, Direction::InOut),
    ("easeincirc", Curve::Circ, Direction::In),
    ("easeoutcirc", Curve::Circ, Direction::Out),
    ("easeinoutcirc", Curve::Circ, Direction::InOut),
];

impl Tweener {
    /// Linear interpolation.
    pub const LINEAR: Self = Self {
        curve: Curve::Linear,
        direction: Direction::In,
    };

    /// Look up a tween by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, StageError> {
        TWEENS
            .iter()
            .find(|(tween, _, _)| tween.eq_ignore_ascii_case(name))
            .map(|&(_, curve, direction)| Self { curve, direction })
            .ok_or_else(|| StageError::UnknownTween(name.to_string()))
    }

    /// Canonical name of this tween.
    pub fn name(self) -> &'static str {
        TWEENS
            .iter()
            .find(|(_, curve, direction)| *curve == self.curve && *direction == self.direction)
            .map_or("linear", |(name, _, _)| name)
    }

    /// Eased progress for normalized time `t` in `0.0..=1.0`.
    pub fn ease(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self.direction {
            Direction::In => ease_in(self.curve, t),
            Direction::Out => 1.0 - ease_in(self.curve, 1.0 - t),
            Direction::InOut => {
                if t < 0.5 {
                    ease_in(self.curve, 2.0 * t) / 2.0
                } else {
                    1.0 - ease_in(self.curve, 2.0 - 2.0 * t) / 2.0
                }
            }
        }
    }

    /// Value at `time` of a change `delta` from `begin` lasting `duration`.
    pub fn tween(self, time: f64, begin: f64, delta: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return begin + delta;
        }
        begin + delta * self.ease(time / duration)
    }
}

/// The "in" half of each curve; the other directions are derived from it.
fn ease_in(curve: Curve, t: f64) -> f64 {
    match curve {
        Curve::Linear => t,
        Curve::Quad => t * t,
        Curve::Cubic => t.powi(3),
        Curve::Quart => t.powi(4),
        Curve::Quint => t.powi(5),
        Curve::Sine => 1.0 - (t * PI / 2.0).cos(),
        Curve::Expo => {
            if t <= 0.0 {
                0.0
            } else {
                2.0_f64.powf(10.0 * (t - 1.0))
            }
        }
        Curve::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
    }
}

impl Default for Tweener {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl FromStr for Tweener {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Debug for Tweener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tweener({})", self.name())
    }
}

impl fmt::Display for Tweener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A transform animating from `source` to `dest` over `duration` ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenedTransform {
    /// Starting transform.
    source: FrameTransform,
    /// Target transform.
    dest: FrameTransform,
    /// Length in ticks.
    duration: u32,
    /// Elapsed ticks.
    time: u32,
    /// Easing.
    tweener: Tweener,
}

impl TweenedTransform {
    /// Animate from `source` to `dest` over `duration` ticks.
    pub const fn new(
        source: FrameTransform,
        dest: FrameTransform,
        duration: u32,
        tweener: Tweener,
    ) -> Self {
        Self {
            source,
            dest,
            duration,
            time: 0,
            tweener,
        }
    }

    /// A transform that is already at rest.
    pub const fn settled(value: FrameTransform) -> Self {
        Self::new(value, value, 0, Tweener::LINEAR)
    }

    /// Current value.
    pub fn fetch(&self) -> FrameTransform {
        if self.is_finished() {
            self.dest
        } else {
            self.source.tween(
                &self.dest,
                f64::from(self.time),
                f64::from(self.duration),
                self.tweener,
            )
        }
    }

    /// Advance by `ticks` and return the new value.
    pub fn fetch_and_tick(&mut self, ticks: u32) -> FrameTransform {
        self.time = self.time.saturating_add(ticks).min(self.duration);
        self.fetch()
    }

    /// Check whether the animation has reached its target.
    #[inline]
    pub const fn is_finished(&self) -> bool {
        self.time >= self.duration
    }

    /// Ticks left until the target is reached.
    #[inline]
    pub const fn remaining(&self) -> u32 {
        self.duration - self.time
    }

    /// Target transform.
    #[inline]
    pub const fn dest(&self) -> &FrameTransform {
        &self.dest
    }
}

impl Default for TweenedTransform {
    fn default() -> Self {
        Self::settled(FrameTransform::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_tweener_lookup() {
        assert_eq!(Tweener::from_name("EaseInOutSine").unwrap().name(), "easeinoutsine");
        assert_eq!("linear".parse::<Tweener>().unwrap(), Tweener::LINEAR);
        assert!(matches!(
            Tweener::from_name("bounce"),
            Err(StageError::UnknownTween(_))
        ));
    }

    #[test]
    fn test_tweener_endpoints() {
        for (name, _, _) in TWEENS {
            let tweener = Tweener::from_name(name).unwrap();
            assert!(approx(tweener.ease(0.0), 0.0), "{name} should start at 0");
            assert!(approx(tweener.ease(1.0), 1.0), "{name} should end at 1");
        }
    }

    #[test]
    fn test_tweener_shapes() {
        let ease_in = Tweener::from_name("easeinquad").unwrap();
        let ease_out = Tweener::from_name("easeoutquad").unwrap();
        let in_out = Tweener::from_name("easeinoutquad").unwrap();
        assert!(approx(ease_in.ease(0.5), 0.25));
        assert!(approx(ease_out.ease(0.5), 0.75));
        assert!(approx(in_out.ease(0.5), 0.5));
        assert!(approx(Tweener::LINEAR.tween(5.0, 10.0, 20.0, 10.0), 20.0));
    }

    #[test]
    fn test_tween_zero_duration() {
        assert!(approx(Tweener::LINEAR.tween(0.0, 1.0, 2.0, 0.0), 3.0));
    }

    #[test]
    fn test_transform_tween_midpoint() {
        let dest = FrameTransform {
            opacity: 0.0,
            fill_translation: [1.0, 0.5],
            is_key: true,
            ..FrameTransform::IDENTITY
        };
        let mid = FrameTransform::IDENTITY.tween(&dest, 5.0, 10.0, Tweener::LINEAR);
        assert!(approx(mid.opacity, 0.5));
        assert!(approx(mid.fill_translation[0], 0.5));
        assert!(approx(mid.fill_translation[1], 0.25));
        assert!(mid.is_key);
    }

    #[test]
    fn test_tweened_transform_progress() {
        let dest = FrameTransform {
            opacity: 0.0,
            ..FrameTransform::IDENTITY
        };
        let mut tween = TweenedTransform::new(FrameTransform::IDENTITY, dest, 4, Tweener::LINEAR);
        assert!(approx(tween.fetch().opacity, 1.0));
        assert!(approx(tween.fetch_and_tick(1).opacity, 0.75));
        assert_eq!(tween.remaining(), 3);
        tween.fetch_and_tick(10);
        assert!(tween.is_finished());
        assert_eq!(tween.fetch(), dest);
    }

    #[test]
    fn test_settled_transform() {
        let mut settled = TweenedTransform::default();
        assert!(settled.is_finished());
        assert_eq!(settled.fetch_and_tick(1), FrameTransform::IDENTITY);
    }

    #[test]
    fn test_moves_vertically() {
        assert!(!FrameTransform::IDENTITY.moves_vertically());
        let moved = FrameTransform {
            fill_translation: [0.0, 0.1],
            ..FrameTransform::IDENTITY
        };
        assert!(moved.moves_vertically());
    }
}
