use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ast::ParsedQueryInfo;
use crate::catalog::{Catalog, MountReport, SchemaLoader};
use crate::criteria::Criteria;
use crate::diagram::{self, DiagramHighlight};
use crate::engine::{QueryOutcome, SqlEngine, SqliteEngine};
use crate::error::{CatalogError, GameError, MissionError};
use crate::mission::{Mission, MissionCatalog, MissionId, Step};
use crate::parser::parse_query_info;
use crate::progression::{
    resolve_next, AdvanceTicket, MissionProgress, NextAction, NextMission,
};
use crate::validation::{self, Verdict};

pub type Result<T, E = GameError> = std::result::Result<T, E>;

#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Pause between completing a mission and loading the next one.
    pub advance_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mounted {
    pub report: MountReport,
    /// Set when mounting solved the current step.
    pub action: Option<NextAction>,
}

#[derive(Clone, Debug)]
pub enum AutoMount {
    Mounted(MountReport),
    AlreadyMounted,
    Skipped,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct LoadReport {
    pub mission: MissionId,
    pub auto_mount: AutoMount,
    /// Set when the step is solved on arrival (its database is already there).
    pub action: Option<NextAction>,
}

#[derive(Clone, Debug)]
pub struct QueryReport {
    /// Rows or affected count, or the engine's error message.
    pub result: Result<QueryOutcome, String>,
    pub diagram: DiagramHighlight,
    /// Present when a step was loaded and waiting to be solved.
    pub verdict: Option<Verdict>,
    pub action: Option<NextAction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advanced {
    Submission(usize),
    MissionComplete {
        mission: MissionId,
        points_awarded: bool,
        ticket: AdvanceTicket,
    },
}

#[derive(Clone, Debug)]
pub enum Transition {
    Loaded(LoadReport),
    AllComplete,
    NoMission,
}

/// Owns every piece of game state and is the only thing that changes it.
pub struct Game<E = SqliteEngine> {
    engine: E,
    loader: SchemaLoader,
    catalog: Catalog,
    missions: MissionCatalog,
    progress: MissionProgress,
    config: GameConfig,
    last_query_info: Option<ParsedQueryInfo>,
    pending: Option<AdvanceTicket>,
}

impl<E: SqlEngine> Game<E> {
    pub fn new(engine: E, loader: SchemaLoader, missions: MissionCatalog, config: GameConfig) -> Self {
        Self {
            engine,
            loader,
            catalog: Catalog::default(),
            missions,
            progress: MissionProgress::default(),
            config,
            last_query_info: None,
            pending: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    pub fn missions(&self) -> &MissionCatalog {
        &self.missions
    }

    pub fn progress(&self) -> &MissionProgress {
        &self.progress
    }

    pub fn pending_advance(&self) -> Option<AdvanceTicket> {
        self.pending
    }

    pub fn last_query_info(&self) -> Option<&ParsedQueryInfo> {
        self.last_query_info.as_ref()
    }

    pub fn current_mission(&self) -> Option<&Mission> {
        self.progress
            .current_mission()
            .and_then(|id| self.missions.get(id))
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_mission()
            .map(|mission| mission.step(self.progress.submission_index()))
    }

    /// Redraws the diagram for the most recent query.
    pub fn diagram(&self) -> DiagramHighlight {
        diagram::plan(self.last_query_info.as_ref(), &self.catalog)
    }

    pub fn mount(&mut self, alias: &str) -> Result<Mounted> {
        if !self.loader.is_ready() {
            return Err(CatalogError::NotReady.into());
        }
        let schema = self
            .loader
            .get(alias)
            .ok_or_else(|| CatalogError::UnknownDatabase(alias.to_owned()))?;
        if self.catalog.is_mounted(alias) {
            return Err(CatalogError::AlreadyMounted(alias.to_owned()).into());
        }

        let replaced: Vec<String> = self
            .catalog
            .collisions(schema)
            .into_iter()
            .map(|collision| collision.table)
            .collect();
        // The catalog only learns about the tables once the engine has them.
        self.engine.mount(schema, &replaced)?;
        let report = self.catalog.mount(schema)?;
        info!(alias, tables = report.tables.len(), "mounted database");

        Ok(Mounted {
            report,
            action: self.recheck_mounted_criteria(),
        })
    }

    pub fn unmount(&mut self, alias: &str) -> Result<Vec<String>> {
        if !self.catalog.is_mounted(alias) {
            return Err(CatalogError::NotMounted(alias.to_owned()).into());
        }
        let tables: Vec<String> = self
            .catalog
            .tables_of(alias)
            .map(|table| table.name.clone())
            .collect();
        self.engine.unmount(&tables)?;
        let removed = self.catalog.unmount(alias)?;
        info!(alias, "unmounted database");

        if self.pending.is_none() && self.depends_on(alias) && self.progress.is_solved() {
            debug!(alias, "required database unmounted, the step is unsolved again");
            self.progress.set_solved(false);
        }
        Ok(removed)
    }

    pub fn load_mission(&mut self, id: MissionId) -> Result<LoadReport> {
        let mission = self
            .missions
            .get(id)
            .ok_or(MissionError::UnknownMission(id))?;
        let db_alias = mission.db_alias.clone();
        let skip_auto_mount = mission.skip_auto_mount;

        self.pending = None;
        self.last_query_info = None;
        self.progress.load(id);
        info!(id, "loaded mission");

        let auto_mount = if skip_auto_mount {
            AutoMount::Skipped
        } else if self.catalog.is_mounted(&db_alias) {
            AutoMount::AlreadyMounted
        } else {
            match self.mount(&db_alias) {
                Ok(mounted) => AutoMount::Mounted(mounted.report),
                Err(err) => {
                    warn!(id, alias = %db_alias, %err, "auto-mount failed");
                    AutoMount::Failed(err.to_string())
                }
            }
        };

        Ok(LoadReport {
            mission: id,
            auto_mount,
            action: self.recheck_mounted_criteria(),
        })
    }

    pub fn run_query(&mut self, sql: &str) -> QueryReport {
        let info = parse_query_info(sql, &self.catalog);
        let diagram = diagram::plan(info.as_ref(), &self.catalog);
        self.last_query_info = info;

        let outcome = match self.engine.execute(sql) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(%err, "query failed");
                return QueryReport {
                    result: Err(err.to_string()),
                    diagram,
                    verdict: None,
                    action: None,
                };
            }
        };

        let verdict = match (self.pending, self.current_step()) {
            (None, Some(step)) => Some(validation::validate(
                &step.criteria,
                sql,
                &outcome,
                &self.catalog,
            )),
            _ => None,
        };

        let action = match &verdict {
            Some(verdict) => {
                self.progress.set_solved(verdict.solved());
                self.next_action()
            }
            None => None,
        };

        QueryReport {
            result: Ok(outcome),
            diagram,
            verdict,
            action,
        }
    }

    pub fn advance(&mut self) -> Result<Advanced> {
        if self.pending.is_some() {
            return Err(GameError::AdvancePending);
        }
        let (id, points) = match self.current_mission() {
            Some(mission) => (mission.id, mission.points),
            None => return Err(GameError::NoMission),
        };
        let action = self.next_action().ok_or(GameError::NotSolved)?;

        match action {
            NextAction::AdvanceSubmission => {
                self.progress.next_submission();
                self.last_query_info = None;
                self.recheck_mounted_criteria();
                Ok(Advanced::Submission(self.progress.submission_index()))
            }
            NextAction::CompleteMission => {
                let points_awarded = self.progress.complete_current(points);
                let target = resolve_next(id, &self.missions, self.progress.completed());
                let ticket = AdvanceTicket::new(&self.progress, target, self.config.advance_delay);
                self.pending = Some(ticket);
                info!(id, ?target, "mission complete");
                Ok(Advanced::MissionComplete {
                    mission: id,
                    points_awarded,
                    ticket,
                })
            }
        }
    }

    /// Applies the scheduled advance once it is due.
    pub fn poll(&mut self, now: Instant) -> Option<Transition> {
        let ticket = self.pending?;
        if !ticket.is_due(now) {
            return None;
        }
        self.apply(ticket)
    }

    /// Carries out `ticket` unless something replaced the loaded step since
    /// it was issued.
    pub fn apply(&mut self, ticket: AdvanceTicket) -> Option<Transition> {
        if ticket.is_stale(&self.progress) {
            debug!("ignoring stale advance");
            return None;
        }
        self.pending = None;

        match ticket.target {
            NextMission::Mission(id) => match self.load_mission(id) {
                Ok(report) => Some(Transition::Loaded(report)),
                Err(err) => {
                    warn!(id, %err, "next mission could not be loaded");
                    self.progress.unload(false);
                    Some(Transition::NoMission)
                }
            },
            NextMission::AllComplete => {
                self.progress.unload(true);
                Some(Transition::AllComplete)
            }
            NextMission::NoMission => {
                self.progress.unload(false);
                Some(Transition::NoMission)
            }
        }
    }

    /// Full game reset: progress is dropped and every database unmounted.
    pub fn reset(&mut self) -> Result<()> {
        let tables: Vec<String> = self.catalog.tables().map(|t| t.name.clone()).collect();
        self.engine.unmount(&tables)?;

        self.pending = None;
        self.last_query_info = None;
        self.progress.reset();
        self.catalog.clear();
        info!("game reset");
        Ok(())
    }

    fn next_action(&self) -> Option<NextAction> {
        if !self.progress.is_solved() {
            return None;
        }
        let mission = self.current_mission()?;
        if self.progress.submission_index() + 1 < mission.submissions.len() {
            Some(NextAction::AdvanceSubmission)
        } else {
            Some(NextAction::CompleteMission)
        }
    }

    /// Whether the loaded step needs `alias` to be mounted.
    fn depends_on(&self, alias: &str) -> bool {
        match (self.current_mission(), self.current_step()) {
            (Some(mission), Some(step)) => {
                mission.db_alias == alias || step.criteria.required_database() == Some(alias)
            }
            _ => false,
        }
    }

    /// Database-mounted criteria follow the catalog rather than a query.
    fn recheck_mounted_criteria(&mut self) -> Option<NextAction> {
        if self.pending.is_some() {
            return None;
        }
        let solved = match self.current_step().map(|step| &step.criteria) {
            Some(Criteria::DatabaseMounted { database }) => {
                validation::database_mounted(database, &self.catalog).solved()
            }
            _ => return None,
        };
        self.progress.set_solved(solved);
        self.next_action()
    }
}
