use std::path::Path;

use serde::Deserialize;

use crate::criteria::{Criteria, RawCriteria};
use crate::error::MissionError;

pub type Result<T, E = MissionError> = std::result::Result<T, E>;

pub type MissionId = u32;

const MAX_DIFFICULTY: u8 = 5;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissionRecord {
    id: MissionId,
    title: String,
    #[serde(default)]
    description: String,
    difficulty: u8,
    points: u32,
    db_alias: String,
    #[serde(default)]
    hint: String,
    #[serde(default)]
    solution: String,
    #[serde(default)]
    success_message: String,
    #[serde(default)]
    next_mission_id: Option<MissionId>,
    validation_criteria: Option<RawCriteria>,
    #[serde(default)]
    submissions: Vec<SubmissionRecord>,
    #[serde(default)]
    skip_auto_mount: bool,
    #[serde(default)]
    relaxed_row_count: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionRecord {
    title: Option<String>,
    description: Option<String>,
    hint: Option<String>,
    solution: Option<String>,
    success_message: Option<String>,
    validation_criteria: Option<RawCriteria>,
}

/// The player-facing text and criteria of one step of a mission.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub title: String,
    pub description: String,
    pub hint: String,
    pub solution: String,
    pub success_message: String,
    pub criteria: Criteria,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mission {
    pub id: MissionId,
    pub difficulty: u8,
    pub points: u32,
    pub db_alias: String,
    pub next_mission_id: Option<MissionId>,
    /// Loading the mission leaves its database unmounted, usually because
    /// mounting it is the lesson.
    pub skip_auto_mount: bool,
    /// The mission itself, used when it has no submissions.
    pub main: Step,
    pub submissions: Vec<Step>,
}

impl Mission {
    fn compile(record: MissionRecord) -> Result<Self> {
        let MissionRecord {
            id,
            title,
            description,
            difficulty,
            points,
            db_alias,
            hint,
            solution,
            success_message,
            next_mission_id,
            validation_criteria,
            submissions,
            skip_auto_mount,
            relaxed_row_count,
        } = record;

        if difficulty > MAX_DIFFICULTY {
            return Err(MissionError::InvalidDifficulty { id, difficulty });
        }

        let compile_criteria = |raw: Option<&RawCriteria>| {
            Criteria::compile(raw, &db_alias, relaxed_row_count)
                .map_err(|reason| MissionError::InvalidCriteria { id, reason })
        };

        let main = Step {
            title,
            description,
            hint,
            solution,
            success_message,
            criteria: compile_criteria(validation_criteria.as_ref())?,
        };

        let submissions = submissions
            .into_iter()
            .map(|sub| -> Result<Step> {
                // A submission without criteria of its own is judged by the
                // mission's.
                let criteria = match &sub.validation_criteria {
                    Some(raw) => compile_criteria(Some(raw))?,
                    None => main.criteria.clone(),
                };
                Ok(Step {
                    title: sub.title.unwrap_or_else(|| main.title.clone()),
                    description: sub.description.unwrap_or_else(|| main.description.clone()),
                    hint: sub.hint.unwrap_or_else(|| main.hint.clone()),
                    solution: sub.solution.unwrap_or_else(|| main.solution.clone()),
                    success_message: sub
                        .success_message
                        .unwrap_or_else(|| main.success_message.clone()),
                    criteria,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            difficulty,
            points,
            db_alias,
            next_mission_id,
            skip_auto_mount,
            main,
            submissions,
        })
    }

    pub fn title(&self) -> &str {
        &self.main.title
    }

    /// Number of steps the player has to solve; a mission without submissions
    /// is a single step.
    pub fn step_count(&self) -> usize {
        self.submissions.len().max(1)
    }

    pub fn step(&self, index: usize) -> &Step {
        self.submissions.get(index).unwrap_or(&self.main)
    }
}

/// All missions, in the order the mission data lists them.
#[derive(Clone, Debug, Default)]
pub struct MissionCatalog {
    missions: Vec<Mission>,
}

impl MissionCatalog {
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<MissionRecord> = serde_json::from_str(json)?;
        let mut missions: Vec<Mission> = Vec::with_capacity(records.len());
        for record in records {
            if missions.iter().any(|m| m.id == record.id) {
                return Err(MissionError::DuplicateMission(record.id));
            }
            missions.push(Mission::compile(record)?);
        }
        Ok(Self { missions })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, id: MissionId) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MissionId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = MissionId> + '_ {
        self.missions.iter().map(|m| m.id)
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }
}
