//! Turn scheduling
//!
//! Decides who speaks next and which turn number the reply gets. Pure: the
//! caller supplies the participant list, the round-robin cursor and the
//! highest existing turn number, and persists the decision itself.

use thiserror::Error;

/// How the next speaker is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A specific character was requested
    Explicit(i64),
    /// `participants[cursor mod len]`
    RoundRobin,
}

impl Selection {
    pub fn from_request(character_id: Option<i64>) -> Self {
        character_id.map_or(Selection::RoundRobin, Selection::Explicit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnDecision {
    pub character_id: i64,
    pub turn_number: i64,
    /// Position of the speaker in the participant list
    pub speaker_index: usize,
}

impl TurnDecision {
    /// Cursor value to store once this turn is committed, so the
    /// rotation continues after this speaker
    pub fn next_cursor(&self) -> i64 {
        i64::try_from(self.speaker_index).map_or(0, |i| i + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("no participants")]
    NoParticipants,
    #[error("character {0} is not a participant")]
    NotAParticipant(i64),
    #[error("turn numbers exhausted")]
    TurnOverflow,
}

/// `max(existing turn numbers, 0) + 1`, `None` once `i64::MAX` is taken
pub fn next_turn_number(turns: impl IntoIterator<Item = i64>) -> Option<i64> {
    turns.into_iter().fold(0, i64::max).checked_add(1)
}

/// Index picked by round-robin for the given cursor, `None` when empty
pub fn round_robin_index(cursor: i64, len: usize) -> Option<usize> {
    let len_i64 = i64::try_from(len).ok().filter(|n| *n > 0)?;
    usize::try_from(cursor.rem_euclid(len_i64)).ok()
}

/// Pick the next speaker among `participants` (character ids in order)
pub fn schedule(
    participants: &[i64],
    selection: Selection,
    cursor: i64,
    last_turn: i64,
) -> Result<TurnDecision, ScheduleError> {
    let speaker_index = match selection {
        Selection::Explicit(character_id) => participants
            .iter()
            .position(|id| *id == character_id)
            .ok_or(ScheduleError::NotAParticipant(character_id))?,
        Selection::RoundRobin => {
            round_robin_index(cursor, participants.len()).ok_or(ScheduleError::NoParticipants)?
        }
    };

    Ok(TurnDecision {
        character_id: participants[speaker_index],
        turn_number: next_turn_number([last_turn]).ok_or(ScheduleError::TurnOverflow)?,
        speaker_index,
    })
}
