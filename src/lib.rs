/*!
# smoothpos

**smoothpos** is a setpoint generator for closed-loop motion control written for Rust - given a
start position, a goal position and a transition time, the library produces the position a
controller should track at any elapsed time, so that an actuator is driven towards its goal
without steps in position or velocity.

## Features
* linear interpolation between start and goal
* smooth interpolation using a triangular velocity profile (constant acceleration for the first
  half of the move, equal deceleration for the second half, zero velocity at both ends)
* goals are guarded: a new goal is only accepted once the current one has been reached or
  explicitly acknowledged
* scalar positions or fixed-size `nalgebra` vectors for several axes sharing one timeline

## Using **smoothpos**
Simply add the following to your `Cargo.toml` file:

```ignore
[dependencies]
smoothpos = "*"
```

and now you can generate setpoints from your control loop:

```
use smoothpos::{InterpolationMode, ScalarTrajectory, TrajectoryError};

fn main() -> Result<(), TrajectoryError> {
    // start at position 0 with a 2 second transition time
    let mut traj = ScalarTrajectory::new(0., 2.)?;
    traj.set_mode(InterpolationMode::Smooth);

    // move to 10, time starts counting from here
    traj.set_new_goal(10.)?;

    // call once per control loop tick with the time elapsed since the goal was set
    let setpoint = traj.evaluate(0.5);
    assert_eq!(1.25, setpoint);

    // the goal is marked as reached once the transition time has elapsed
    assert_eq!(10., traj.evaluate(2.));
    assert!(traj.is_goal_reached());
    Ok(())
}
```

The caller owns all timing: the generator has no clock, threads or I/O, and every operation is
constant time.
 */

mod error;

pub use error::{Result, TrajectoryError};

use log::{debug, info, warn};
use std::fmt;
use std::fmt::Formatter;
use std::ops::{Add, Div, Mul, Sub};
use std::time::Duration;

use nalgebra::Vector3;

/// Transition time in seconds used when none is configured
pub const DEFAULT_DURATION: f32 = 1.0;

/// Slack in seconds allowed when deciding that a segment has reached its end time
pub const DEFAULT_COMPLETION_TOLERANCE: f32 = 1e-6;

/// Largest number of positions `TrajectoryGenerator::positions` will return
pub const MAX_SAMPLES: usize = 1 << 20;

/// A value the generator can interpolate
///
/// Implemented for anything that can be added, subtracted and scaled by an `f32`, which covers
/// `f32` itself and `nalgebra` vectors such as `Vector3<f32>`.
pub trait Position:
    Copy
    + fmt::Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f32, Output = Self>
    + Div<f32, Output = Self>
{
}

impl<T> Position for T where
    T: Copy
        + fmt::Debug
        + PartialEq
        + Add<Output = T>
        + Sub<Output = T>
        + Mul<f32, Output = T>
        + Div<f32, Output = T>
{
}

/// Generator for a single axis
pub type ScalarTrajectory = TrajectoryGenerator<f32>;

/// Generator for three axes moving on the same timeline
pub type Trajectory3 = TrajectoryGenerator<Vector3<f32>>;

/// The supported interpolation policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// straight line from start to goal
    Linear,
    /// piecewise quadratic following a triangular velocity profile
    #[default]
    Smooth,
}

impl InterpolationMode {
    /// Returns the numeric code of the mode, 0 for linear and 1 for smooth
    pub fn code(&self) -> u8 {
        match self {
            InterpolationMode::Linear => 0,
            InterpolationMode::Smooth => 1,
        }
    }
}

impl TryFrom<u8> for InterpolationMode {
    type Error = TrajectoryError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(InterpolationMode::Linear),
            1 => Ok(InterpolationMode::Smooth),
            _ => Err(TrajectoryError::InvalidMode(code)),
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMode::Linear => write!(f, "linear"),
            InterpolationMode::Smooth => write!(f, "smooth"),
        }
    }
}

/// Progress of the current segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// the goal has been reached, a new goal may be accepted
    Idle,
    /// moving towards the goal, new goals are rejected
    InFlight,
}

/// When a mode change made during an in-flight segment takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSwitch {
    /// the in-flight segment keeps its mode, the new mode is used from the next accepted goal
    #[default]
    NextGoal,
    /// the new mode is used on the next evaluation, which may cause a jump in position
    Immediate,
}

/// Generator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// transition time in seconds
    pub duration: f32,
    pub mode: InterpolationMode,
    pub mode_switch: ModeSwitch,
    /// slack in seconds when detecting the end of a segment
    pub completion_tolerance: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            duration: DEFAULT_DURATION,
            mode: InterpolationMode::default(),
            mode_switch: ModeSwitch::default(),
            completion_tolerance: DEFAULT_COMPLETION_TOLERANCE,
        }
    }
}

impl GeneratorConfig {
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_mode(mut self, mode: InterpolationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mode_switch(mut self, mode_switch: ModeSwitch) -> Self {
        self.mode_switch = mode_switch;
        self
    }

    pub fn with_completion_tolerance(mut self, tolerance: f32) -> Self {
        self.completion_tolerance = tolerance;
        self
    }

    /// Checks that the duration is positive and the tolerance is non-negative, both finite, and
    /// that the tolerance is shorter than the duration
    pub fn validate(&self) -> Result<()> {
        check_duration(self.duration)?;
        let tolerance = self.completion_tolerance;
        if !tolerance.is_finite() || tolerance < 0. || tolerance >= self.duration {
            warn!("Rejected completion tolerance {} for a transition time of {}s", tolerance, self.duration);
            return Err(TrajectoryError::InvalidTolerance(tolerance));
        }
        Ok(())
    }
}

/// returns the duration if it can be used to divide by, an error otherwise
fn check_duration(duration: f32) -> Result<f32> {
    if duration.is_finite() && duration > 0. {
        Ok(duration)
    } else {
        warn!("Rejected transition time of {}s", duration);
        Err(TrajectoryError::InvalidDuration(duration))
    }
}

/// like `check_duration`, also rejecting durations that the completion tolerance would swallow
fn check_duration_with_tolerance(duration: f32, tolerance: f32) -> Result<f32> {
    let duration = check_duration(duration)?;
    if tolerance >= duration {
        warn!("Rejected transition time of {}s, not longer than the completion tolerance {}s",
              duration, tolerance);
        return Err(TrajectoryError::InvalidDuration(duration));
    }
    Ok(duration)
}

/// checks that a position holds no infinities or NaN
fn check_position<P: Position>(position: P) -> Result<P> {
    // p - p is zero when finite and NaN otherwise, and NaN never equals itself
    let diff = position - position;
    if diff == diff {
        Ok(position)
    } else {
        warn!("Rejected non-finite position {:?}", position);
        Err(TrajectoryError::NonFinitePosition)
    }
}

/// one motion from a start position to a goal position, with the profile parameters fixed when
/// the goal was accepted
#[derive(Debug, Clone, Copy)]
struct Segment<P> {
    start: P,
    goal: P,
    duration: f32,
    mode: InterpolationMode,
    ramp_velocity: P,
    ramp_accel: P,
}

impl<P: Position> Segment<P> {
    fn new(start: P, goal: P, duration: f32, mode: InterpolationMode) -> Segment<P> {
        // peak velocity and acceleration of the triangular profile covering goal - start
        let ramp_velocity = (goal - start) * 2. / duration;
        let ramp_accel = ramp_velocity * 2. / duration;
        Segment { start, goal, duration, mode, ramp_velocity, ramp_accel }
    }

    fn zero(&self) -> P {
        self.ramp_accel * 0.
    }

    /// position strictly inside (0, duration)
    fn interpolate(&self, t: f32) -> P {
        match self.mode {
            InterpolationMode::Linear => self.start + (self.goal - self.start) * (t / self.duration),
            InterpolationMode::Smooth => {
                if t <= self.duration / 2. {
                    self.start + self.ramp_accel * (0.5 * t * t)
                } else {
                    let remaining = self.duration - t;
                    self.goal - self.ramp_accel * (0.5 * remaining * remaining)
                }
            }
        }
    }

    fn velocity(&self, t: f32) -> P {
        if t <= 0. || t >= self.duration {
            return self.zero();
        }
        match self.mode {
            InterpolationMode::Linear => (self.goal - self.start) / self.duration,
            InterpolationMode::Smooth => {
                if t <= self.duration / 2. {
                    self.ramp_accel * t
                } else {
                    self.ramp_accel * (self.duration - t)
                }
            }
        }
    }

    fn acceleration(&self, t: f32) -> P {
        if t <= 0. || t >= self.duration {
            return self.zero();
        }
        match self.mode {
            InterpolationMode::Linear => self.zero(),
            InterpolationMode::Smooth => {
                if t <= self.duration / 2. {
                    self.ramp_accel
                } else {
                    self.ramp_accel * -1.
                }
            }
        }
    }
}

/// Trajectory Generator
///
/// Holds the current segment and hands out setpoints for the time elapsed since the segment's
/// goal was accepted.
#[derive(Debug, Clone)]
pub struct TrajectoryGenerator<P: Position> {
    config: GeneratorConfig,
    segment: Segment<P>,
    state: SegmentState,
}

impl<P: Position> TrajectoryGenerator<P> {
    /// Creates an idle generator resting at `position`
    ///
    /// # Arguments
    ///
    /// `position` - the current position
    /// `duration` - transition time in seconds for the following goals
    ///
    /// # Examples
    ///
    /// ```
    /// use smoothpos::{ScalarTrajectory, TrajectoryError};
    /// let traj = ScalarTrajectory::new(1.5, 0.75).unwrap();
    /// assert!(traj.is_goal_reached());
    /// assert_eq!(Err(TrajectoryError::InvalidDuration(0.)), ScalarTrajectory::new(1.5, 0.).map(|_| ()));
    /// ```
    pub fn new(position: P, duration: f32) -> Result<TrajectoryGenerator<P>> {
        Self::with_config(position, GeneratorConfig::default().with_duration(duration))
    }

    /// Creates an idle generator resting at `position` using the given configuration
    pub fn with_config(position: P, config: GeneratorConfig) -> Result<TrajectoryGenerator<P>> {
        config.validate()?;
        let position = check_position(position)?;
        Ok(TrajectoryGenerator {
            config,
            segment: Segment::new(position, position, config.duration, config.mode),
            state: SegmentState::Idle,
        })
    }

    /// Resets the generator to rest at `position`, e.g. after homing
    ///
    /// Leaves the generator untouched if `position` or `duration` is invalid.
    pub fn initialize(&mut self, position: P, duration: f32) -> Result<()> {
        let duration = check_duration_with_tolerance(duration, self.config.completion_tolerance)?;
        let position = check_position(position)?;
        self.config.duration = duration;
        self.segment = Segment::new(position, position, duration, self.config.mode);
        self.state = SegmentState::Idle;
        info!("Initialized at {:?} with a transition time of {}s", position, duration);
        Ok(())
    }

    /// Sets the interpolation mode
    ///
    /// While a segment is in flight the change is applied according to the configured
    /// `ModeSwitch` policy, otherwise it applies right away.
    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.config.mode = mode;
        match (self.state, self.config.mode_switch) {
            (SegmentState::InFlight, ModeSwitch::NextGoal) => {
                debug!("Switch to {} mode deferred until the next goal", mode);
            }
            _ => self.segment.mode = mode,
        }
    }

    /// Sets the interpolation mode from its numeric code, see `InterpolationMode::code`
    ///
    /// Unknown codes are rejected and the mode is left unchanged.
    pub fn set_mode_code(&mut self, code: u8) -> Result<()> {
        let mode = InterpolationMode::try_from(code).map_err(|e| {
            warn!("Ignoring mode change: {}", e);
            e
        })?;
        self.set_mode(mode);
        Ok(())
    }

    /// Returns the configured mode, used by the next accepted goal
    pub fn mode(&self) -> InterpolationMode {
        self.config.mode
    }

    /// Returns the mode the current segment is evaluated with
    pub fn active_mode(&self) -> InterpolationMode {
        self.segment.mode
    }

    /// Sets the transition time in seconds
    ///
    /// A segment already in flight keeps its own duration and profile, the new value is used
    /// from the next accepted goal. Durations not longer than the completion tolerance are
    /// rejected.
    pub fn set_duration_s(&mut self, duration: f32) -> Result<()> {
        let duration = check_duration_with_tolerance(duration, self.config.completion_tolerance)?;
        self.config.duration = duration;
        if self.state == SegmentState::InFlight {
            debug!("Transition time of {}s deferred until the next goal", duration);
        } else {
            let segment = self.segment;
            self.segment = Segment::new(segment.start, segment.goal, duration, segment.mode);
        }
        Ok(())
    }

    /// Sets the transition time in milliseconds
    pub fn set_duration_ms(&mut self, duration: u32) -> Result<()> {
        self.set_duration_s(duration as f32 / 1000.)
    }

    /// Sets the transition time
    pub fn set_duration(&mut self, duration: Duration) -> Result<()> {
        self.set_duration_s(duration.as_secs_f32())
    }

    /// Returns the configured transition time in seconds
    pub fn duration(&self) -> f32 {
        self.config.duration
    }

    /// Returns the transition time of the current segment in seconds
    pub fn segment_duration(&self) -> f32 {
        self.segment.duration
    }

    /// Starts a new segment from the previous goal towards `goal`
    ///
    /// Only accepted when idle. While a segment is in flight the goal is dropped and
    /// `TrajectoryError::GoalInFlight` is returned; wait for the segment to finish or call
    /// `mark_reached` first. Goals holding infinities or NaN are rejected with
    /// `TrajectoryError::NonFinitePosition`.
    ///
    /// # Examples
    ///
    /// ```
    /// use smoothpos::{ScalarTrajectory, TrajectoryError};
    /// let mut traj = ScalarTrajectory::new(0., 2.).unwrap();
    /// assert!(traj.set_new_goal(10.).is_ok());
    /// assert_eq!(Err(TrajectoryError::GoalInFlight), traj.set_new_goal(20.));
    /// assert_eq!(10., traj.goal());
    /// ```
    pub fn set_new_goal(&mut self, goal: P) -> Result<()> {
        if self.state == SegmentState::InFlight {
            warn!("Rejected goal {:?} while moving towards {:?}", goal, self.segment.goal);
            return Err(TrajectoryError::GoalInFlight);
        }
        let goal = check_position(goal)?;

        self.segment = Segment::new(self.segment.goal, goal, self.config.duration, self.config.mode);
        self.state = SegmentState::InFlight;
        info!("Moving from {:?} to {:?} over {}s using {} mode",
              self.segment.start, goal, self.segment.duration, self.segment.mode);
        Ok(())
    }

    /// returns the position at time t and whether t is at or past the end of the segment
    fn sample(&self, t: f32) -> (P, bool) {
        if t <= 0. {
            (self.segment.start, false)
        } else if t >= self.segment.duration - self.config.completion_tolerance {
            (self.segment.goal, true)
        } else {
            (self.segment.interpolate(t), false)
        }
    }

    /// Returns the setpoint `t` seconds after the current goal was accepted
    ///
    /// Times at or before 0 give the start position and times at or after the segment duration
    /// (less the completion tolerance) give the goal; reaching the end marks the goal as reached.
    ///
    /// # Examples
    ///
    /// ```
    /// use smoothpos::{InterpolationMode, ScalarTrajectory};
    /// let mut traj = ScalarTrajectory::new(0., 2.).unwrap();
    /// traj.set_mode(InterpolationMode::Linear);
    /// traj.set_new_goal(10.).unwrap();
    /// assert_eq!(5., traj.evaluate(1.));
    /// assert!(!traj.is_goal_reached());
    /// assert_eq!(10., traj.evaluate(2.));
    /// assert!(traj.is_goal_reached());
    /// ```
    pub fn evaluate(&mut self, t: f32) -> P {
        let (position, at_end) = self.sample(t);
        if at_end && self.state == SegmentState::InFlight {
            self.state = SegmentState::Idle;
            info!("Reached goal {:?}", self.segment.goal);
        }
        position
    }

    /// Same as `evaluate` with the elapsed time in milliseconds
    pub fn evaluate_ms(&mut self, t: u32) -> P {
        self.evaluate(t as f32 / 1000.)
    }

    /// Same as `evaluate` with the elapsed time as a `Duration`
    pub fn evaluate_elapsed(&mut self, elapsed: Duration) -> P {
        self.evaluate(elapsed.as_secs_f32())
    }

    /// Returns the same setpoint as `evaluate` without marking the goal as reached
    pub fn position_at(&self, t: f32) -> P {
        self.sample(t).0
    }

    /// Returns the velocity of the current segment at time t, zero outside the segment
    pub fn velocity_at(&self, t: f32) -> P {
        self.segment.velocity(t)
    }

    /// Returns the acceleration of the current segment at time t, zero outside the segment
    pub fn acceleration_at(&self, t: f32) -> P {
        self.segment.acceleration(t)
    }

    /// Returns positions of the current segment covering the input time range and step
    ///
    /// Samples are taken at `start + i * step` up to and including `end`, at most `MAX_SAMPLES`
    /// of them.
    ///
    /// # Arguments
    ///
    /// `start` - start time
    /// `end` - end time
    /// `step` - time step
    ///
    /// # Examples
    ///
    /// ```
    /// use smoothpos::ScalarTrajectory;
    /// let mut traj = ScalarTrajectory::new(0., 2.).unwrap();
    /// traj.set_new_goal(10.).unwrap();
    /// let path = traj.positions(0., 2., 0.5).unwrap();
    /// assert_eq!(vec![0., 1.25, 5., 8.75, 10.], path);
    /// ```
    pub fn positions(&self, start: f32, end: f32, step: f32) -> Result<Vec<P>> {
        if !(end > start) {
            return Err(TrajectoryError::InvalidRange { start, end });
        }

        if !(step > 0.) {
            return Err(TrajectoryError::InvalidStep(step));
        }

        let steps = ((end - start) / step).floor();
        if !(steps < MAX_SAMPLES as f32) {
            return Err(TrajectoryError::TooManySamples { start, end, step, max: MAX_SAMPLES });
        }

        let count = steps as usize + 1;
        let values: Vec<P> = (0..count)
            .map(|idx| self.position_at(start + idx as f32 * step))
            .collect();

        Ok(values)
    }

    /// Marks the current goal as reached regardless of progress and returns it
    ///
    /// Used to accept a new goal straight away, e.g. after aborting a move.
    pub fn mark_reached(&mut self) -> P {
        if self.state == SegmentState::InFlight {
            debug!("Goal {:?} marked as reached", self.segment.goal);
        }
        self.state = SegmentState::Idle;
        self.segment.goal
    }

    /// Returns the start position of the current segment
    pub fn start(&self) -> P {
        self.segment.start
    }

    /// Returns the goal position of the current segment
    pub fn goal(&self) -> P {
        self.segment.goal
    }

    /// Returns the peak velocity of the triangular profile of the current segment
    pub fn ramp_velocity(&self) -> P {
        self.segment.ramp_velocity
    }

    /// Returns the acceleration magnitude of the triangular profile of the current segment
    pub fn ramp_accel(&self) -> P {
        self.segment.ramp_accel
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn is_goal_reached(&self) -> bool {
        self.state == SegmentState::Idle
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
