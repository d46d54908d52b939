//! Track-to-track navigation decisions
//!
//! Pure functions over a snapshot of the queue position. The controller asks
//! what to do, then does it; nothing in here touches audio or the queue.

/// What the controller knows when the listener (or the end of a track) asks to move on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceInput {
    /// Index into the active queue, `None` when nothing has been selected yet
    pub current: Option<usize>,

    /// Length of the active queue
    pub len: usize,

    pub looping: bool,

    /// Recommendation buffer holds at least one new track
    pub has_recommendations: bool,

    /// A recommendation fetch for the end of this queue already came back
    pub fetch_attempted: bool,
}

/// Outcome of [`plan_next`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Nothing queued
    Idle,

    /// Move to this index of the active queue
    Advance(usize),

    /// Loop back to the top
    Wrap,

    /// Append the buffered recommendations, then step into them
    ExtendAndAdvance,

    /// Out of tracks with nothing buffered; ask the gateway before giving up
    FetchRecommendations,

    /// Out of tracks for good
    Exhausted,
}

/// Outcome of [`plan_previous`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousStep {
    /// Nothing queued
    Idle,

    /// Move to this index of the active queue
    Move(usize),

    /// Seek the current track back to its start
    RestartCurrent,
}

/// Decide where "next" goes
pub fn plan_next(input: AdvanceInput) -> NextStep {
    if input.len == 0 {
        return NextStep::Idle;
    }

    let Some(current) = input.current else {
        return NextStep::Advance(0);
    };

    let candidate = current + 1;
    if candidate < input.len {
        return NextStep::Advance(candidate);
    }

    if input.looping {
        NextStep::Wrap
    } else if input.has_recommendations {
        NextStep::ExtendAndAdvance
    } else if input.fetch_attempted {
        NextStep::Exhausted
    } else {
        NextStep::FetchRecommendations
    }
}

/// Decide where "previous" goes
///
/// There is nothing before the first track of a non-looping queue, so that
/// case restarts the current track instead.
pub fn plan_previous(current: Option<usize>, len: usize, looping: bool) -> PreviousStep {
    if len == 0 {
        return PreviousStep::Idle;
    }

    match current {
        None => PreviousStep::Move(0),
        Some(0) if looping => PreviousStep::Move(len - 1),
        Some(0) => PreviousStep::RestartCurrent,
        Some(c) => PreviousStep::Move(c.min(len) - 1),
    }
}
