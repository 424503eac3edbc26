use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::mission::{MissionCatalog, MissionId};

/// Missions that must be reachable before any mission data is consulted.
const BOOTSTRAP_CHAIN: &[(MissionId, MissionId)] = &[(0, 1), (1, 2)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No mission loaded.
    Idle,
    Loaded,
    Solved,
    AllComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextMission {
    Mission(MissionId),
    AllComplete,
    /// Nothing left to pick but not everything is done either.
    NoMission,
}

/// What the player's "advance" does once the current step is solved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextAction {
    AdvanceSubmission,
    CompleteMission,
}

/// The session's mission progress. Only the game controller mutates it.
#[derive(Clone, Debug, Default)]
pub struct MissionProgress {
    current_mission: Option<MissionId>,
    submission_index: usize,
    solved: bool,
    all_complete: bool,
    completed: BTreeSet<MissionId>,
    score: u32,
    /// Bumped by every transition that replaces the loaded step.
    generation: u64,
}

impl MissionProgress {
    pub fn current_mission(&self) -> Option<MissionId> {
        self.current_mission
    }

    pub fn submission_index(&self) -> usize {
        self.submission_index
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn completed(&self) -> &BTreeSet<MissionId> {
        &self.completed
    }

    pub fn is_completed(&self, id: MissionId) -> bool {
        self.completed.contains(&id)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        match (self.all_complete, self.current_mission, self.solved) {
            (true, _, _) => Phase::AllComplete,
            (false, None, _) => Phase::Idle,
            (false, Some(_), false) => Phase::Loaded,
            (false, Some(_), true) => Phase::Solved,
        }
    }

    pub fn load(&mut self, id: MissionId) {
        self.current_mission = Some(id);
        self.submission_index = 0;
        self.solved = false;
        self.all_complete = false;
        self.generation += 1;
    }

    pub fn next_submission(&mut self) {
        self.submission_index += 1;
        self.solved = false;
        self.generation += 1;
    }

    pub fn set_solved(&mut self, solved: bool) {
        self.solved = solved;
    }

    /// Records the current mission as completed. Points are only awarded the
    /// first time; returns whether they were.
    pub fn complete_current(&mut self, points: u32) -> bool {
        let id = match self.current_mission {
            Some(id) => id,
            None => return false,
        };
        let first_time = self.completed.insert(id);
        if first_time {
            self.score = self.score.saturating_add(points);
        }
        first_time
    }

    pub fn unload(&mut self, all_complete: bool) {
        self.current_mission = None;
        self.submission_index = 0;
        self.solved = false;
        self.all_complete = all_complete;
        self.generation += 1;
    }

    /// Tears down the whole session. The generation keeps counting so that
    /// tickets issued before the reset stay stale.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
    }
}

/// Picks the mission that follows `finished`.
pub fn resolve_next(
    finished: MissionId,
    missions: &MissionCatalog,
    completed: &BTreeSet<MissionId>,
) -> NextMission {
    if let Some((_, next)) = BOOTSTRAP_CHAIN.iter().find(|(from, _)| *from == finished) {
        return NextMission::Mission(*next);
    }

    let candidate = missions
        .get(finished)
        .and_then(|mission| mission.next_mission_id)
        .filter(|id| missions.contains(*id))
        .or_else(|| finished.checked_add(1).filter(|id| missions.contains(*id)));

    match candidate {
        Some(id) if !completed.contains(&id) => return NextMission::Mission(id),
        Some(id) => debug!(id, "next mission already completed, looking for another"),
        None => debug!(finished, "no follow-up mission, looking for another"),
    }

    match missions.ids().find(|id| !completed.contains(id)) {
        Some(id) => NextMission::Mission(id),
        None if missions.is_empty() => NextMission::NoMission,
        None => NextMission::AllComplete,
    }
}

/// A scheduled move to the next mission. It only applies while the progress
/// generation it was issued for is still current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceTicket {
    generation: u64,
    pub target: NextMission,
    pub due: Instant,
}

impl AdvanceTicket {
    pub fn new(progress: &MissionProgress, target: NextMission, delay: Duration) -> Self {
        Self {
            generation: progress.generation(),
            target,
            due: Instant::now() + delay,
        }
    }

    pub fn is_stale(&self, progress: &MissionProgress) -> bool {
        self.generation != progress.generation()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }
}
