//! Running a search on a background thread.
//!
//! `Filler::new` sets a run up in the `Stopped` state; `Filler::run` (or `Filler::start`, which does
//! both) moves the grid into a worker thread and returns straight away. While the worker runs, the
//! only state shared with the starting thread is the status, the cancellation flag and the
//! `HintBoard` the worker publishes entry bitmaps to. The grid comes back in the `FillOutcome`.

use log::debug;
use std::panic;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::candidates::CandidateListBuilder;
use crate::error::FillError;
use crate::grid::{Grid, WordId};
use crate::lights::{LightId, LightTable};
use crate::search::{run_search, FillOptions, FillStatus, Solution, Statistics};
use crate::types::{Alphabet, Flbm};

/// The entry bitmaps most recently published by a run: progress snapshots while it's running,
/// then the final bitmaps if it succeeded or zeros if it didn't.
#[derive(Debug, Clone, Default)]
pub struct HintBoard {
    flbms: Arc<Mutex<Vec<Flbm>>>,
}

impl HintBoard {
    #[must_use]
    pub fn new() -> HintBoard {
        HintBoard::default()
    }

    pub fn publish(&self, flbms: &[Flbm]) {
        let mut hints = self.flbms.lock().unwrap_or_else(PoisonError::into_inner);
        hints.clear();
        hints.extend_from_slice(flbms);
    }

    /// Set every hint to "no letter possible".
    pub fn clear(&self, entry_count: usize) {
        let mut hints = self.flbms.lock().unwrap_or_else(PoisonError::into_inner);
        hints.clear();
        hints.resize(entry_count, 0);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Flbm> {
        self.flbms.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Hooks called from the worker thread.
pub trait FillObserver: Send {
    /// Called periodically with the entry bitmaps of the running search.
    fn on_progress(&mut self, _flbms: &[Flbm]) {}

    /// Called once when the run ends, before `Filler::wait` returns.
    fn on_complete(&mut self, _outcome: &FillOutcome) {}
}

impl FillObserver for () {}

/// The result of a run, with the grid handed back.
#[derive(Debug)]
pub struct FillOutcome {
    pub status: FillStatus,
    pub grid: Grid,
    pub lights: Option<LightTable>,
    pub solution: Option<Solution>,
    pub statistics: Statistics,
}

impl FillOutcome {
    /// The surviving candidates of a word in the solution, best first.
    #[must_use]
    pub fn feasible_list(&self, word_id: WordId) -> Vec<LightId> {
        let (Some(lights), Some(solution)) = (&self.lights, &self.solution) else {
            return vec![];
        };
        let Some(list) = solution.word_lists.get(word_id) else {
            return vec![];
        };
        let mut list = list.clone();
        lights.sort_by_weight(&mut list);
        list
    }

    /// Render the solution, if there is one.
    #[must_use]
    pub fn render(&self, alphabet: &Alphabet) -> Option<String> {
        self.solution
            .as_ref()
            .map(|solution| self.grid.render(&solution.entry_flbms, alphabet))
    }
}

/// Run a search on `grid` and publish the result the way a background run does.
fn complete_run(
    mut grid: Grid,
    builder: &mut dyn CandidateListBuilder,
    options: &FillOptions,
    cancel: &CancellationToken,
    hints: &HintBoard,
    observer: &mut dyn FillObserver,
) -> FillOutcome {
    let report = {
        let mut progress = |flbms: &[Flbm]| {
            hints.publish(flbms);
            observer.on_progress(flbms);
        };
        run_search(&mut grid, builder, options, cancel, &mut progress)
    };

    match (&report.status, &report.solution) {
        (FillStatus::SolutionFound, Some(solution)) => hints.publish(&solution.entry_flbms),
        (FillStatus::Aborted, _) => hints.publish(&grid.entry_flbms()),
        _ => hints.clear(grid.entries.len()),
    }

    let outcome = FillOutcome {
        status: report.status,
        grid,
        lights: report.lights,
        solution: report.solution,
        statistics: report.statistics,
    };
    observer.on_complete(&outcome);
    outcome
}

/// Fill `grid` on the calling thread.
pub fn fill(grid: Grid, builder: &mut dyn CandidateListBuilder, options: &FillOptions) -> FillOutcome {
    complete_run(
        grid,
        builder,
        options,
        &CancellationToken::new(),
        &HintBoard::new(),
        &mut (),
    )
}

/// Everything a run needs, held until its worker is spawned.
struct PendingRun {
    grid: Grid,
    builder: Box<dyn CandidateListBuilder>,
    options: FillOptions,
    observer: Box<dyn FillObserver>,
}

/// A handle on a run, either waiting to start or in progress on a worker thread.
pub struct Filler {
    pending: Option<PendingRun>,
    handle: Option<JoinHandle<FillOutcome>>,
    status: Arc<Mutex<FillStatus>>,
    cancel: CancellationToken,
    hints: HintBoard,
}

impl Filler {
    /// Set up a run on `grid` without starting it. Its status is `Stopped` until `run` is called.
    #[must_use]
    pub fn new(
        grid: Grid,
        builder: Box<dyn CandidateListBuilder>,
        options: FillOptions,
        observer: Box<dyn FillObserver>,
    ) -> Filler {
        let hints = HintBoard::new();
        hints.publish(&grid.entry_flbms());

        Filler {
            pending: Some(PendingRun {
                grid,
                builder,
                options,
                observer,
            }),
            handle: None,
            status: Arc::new(Mutex::new(FillStatus::Stopped)),
            cancel: CancellationToken::new(),
            hints,
        }
    }

    /// Spawn a worker to fill `grid`.
    pub fn start(
        grid: Grid,
        builder: Box<dyn CandidateListBuilder>,
        options: FillOptions,
        observer: Box<dyn FillObserver>,
    ) -> Result<Filler, FillError> {
        Filler::new(grid, builder, options, observer).run()
    }

    /// Spawn the worker for a run set up with `new`. Does nothing if it's already running.
    pub fn run(mut self) -> Result<Filler, FillError> {
        let Some(PendingRun {
            grid,
            mut builder,
            options,
            mut observer,
        }) = self.pending.take()
        else {
            return Ok(self);
        };
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = FillStatus::Running;

        let handle = {
            let status = Arc::clone(&self.status);
            let cancel = self.cancel.clone();
            let hints = self.hints.clone();

            thread::Builder::new()
                .name(String::from("filler"))
                .spawn(move || {
                    debug!("worker started on {} entries", grid.entries.len());
                    let outcome = complete_run(
                        grid,
                        builder.as_mut(),
                        &options,
                        &cancel,
                        &hints,
                        observer.as_mut(),
                    );
                    *status.lock().unwrap_or_else(PoisonError::into_inner) = outcome.status.clone();
                    outcome
                })
                .map_err(|error| FillError::WorkerSpawn(error.to_string()))?
        };

        self.handle = Some(handle);
        Ok(self)
    }

    #[must_use]
    pub fn status(&self) -> FillStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(false, JoinHandle::is_finished)
    }

    /// The latest published entry bitmaps.
    #[must_use]
    pub fn hints(&self) -> Vec<Flbm> {
        self.hints.snapshot()
    }

    /// A handle on the published bitmaps that outlives the `Filler`.
    #[must_use]
    pub fn hint_board(&self) -> HintBoard {
        self.hints.clone()
    }

    /// Block until the run ends and take back the grid. A run that was never started comes back
    /// `Stopped` with its grid as it was.
    pub fn wait(mut self) -> FillOutcome {
        if let Some(handle) = self.handle.take() {
            return match handle.join() {
                Ok(outcome) => outcome,
                Err(payload) => panic::resume_unwind(payload),
            };
        }
        let Some(run) = self.pending.take() else {
            unreachable!("a filler holds either a pending run or a worker");
        };
        FillOutcome {
            status: FillStatus::Stopped,
            grid: run.grid,
            lights: None,
            solution: None,
            statistics: Statistics::default(),
        }
    }

    /// Ask the worker to abort, then wait for it.
    pub fn stop(self) -> FillOutcome {
        self.cancel.cancel();
        self.wait()
    }
}

impl Drop for Filler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{CandidateRequest, DictionaryCandidates};
    use crate::error::CandidateListError;
    use crate::lights::LightProps;
    use crate::search::FillMode;
    use crate::types::is_forced;
    use indoc::indoc;
    use instant::Duration;

    fn square(alphabet: &Alphabet) -> Grid {
        Grid::from_template(
            indoc! {"
                a.
                ..
            "},
            alphabet,
            &LightProps::default(),
        )
        .unwrap()
    }

    fn dictionary(alphabet: &Alphabet, words: &[(&str, i32)]) -> Box<DictionaryCandidates> {
        let word_list: Vec<(String, i32)> =
            words.iter().map(|&(word, score)| (word.to_string(), score)).collect();
        Box::new(DictionaryCandidates::from_word_list(&word_list, alphabet))
    }

    /// Builds nothing until it's cancelled.
    struct StallingBuilder;

    impl CandidateListBuilder for StallingBuilder {
        fn prepare(&mut self) -> Result<LightTable, CandidateListError> {
            Ok(LightTable::new(vec![].into(), 0))
        }

        fn build(
            &mut self,
            _request: &CandidateRequest<'_>,
            _table: &mut LightTable,
            cancel: &CancellationToken,
        ) -> Result<Vec<LightId>, CandidateListError> {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Err(CandidateListError::Aborted)
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        completed: Arc<Mutex<Vec<FillStatus>>>,
    }

    impl FillObserver for Recorder {
        fn on_complete(&mut self, outcome: &FillOutcome) {
            self.completed.lock().unwrap().push(outcome.status.clone());
        }
    }

    #[test]
    fn test_start_and_wait() {
        let alphabet = Alphabet::latin();
        let builder = dictionary(&alphabet, &[("ab", 50), ("ac", 40), ("cd", 30), ("bd", 20)]);
        let recorder = Recorder::default();

        let filler = Filler::start(
            square(&alphabet),
            builder,
            FillOptions::default(),
            Box::new(recorder.clone()),
        )
        .unwrap();
        let hints = filler.hint_board();
        let outcome = filler.wait();

        assert_eq!(outcome.status, FillStatus::SolutionFound);
        let solution = outcome.solution.as_ref().unwrap();
        assert_eq!(hints.snapshot(), solution.entry_flbms);
        assert!(hints.snapshot().iter().all(|&flbm| is_forced(flbm)));
        assert_eq!(*recorder.completed.lock().unwrap(), vec![FillStatus::SolutionFound]);

        // The grid itself comes back untouched
        assert_eq!(outcome.grid.entry_flbms(), square(&alphabet).entry_flbms());
        let rendered = outcome.render(&alphabet).unwrap();
        assert!(["ab\ncd", "ab\nbd", "ac\nbd", "ac\ncd"].contains(&rendered.as_str()), "{rendered}");
    }

    #[test]
    fn test_stopped_until_run() {
        let alphabet = Alphabet::latin();
        let words = [("ab", 50), ("ac", 40), ("cd", 30), ("bd", 20)];

        let filler = Filler::new(
            square(&alphabet),
            dictionary(&alphabet, &words),
            FillOptions::default(),
            Box::new(()),
        );
        assert_eq!(filler.status(), FillStatus::Stopped);
        assert!(!filler.status().is_finished());
        assert!(!filler.is_finished());
        assert_eq!(filler.hints(), square(&alphabet).entry_flbms());

        let outcome = filler.run().unwrap().wait();
        assert_eq!(outcome.status, FillStatus::SolutionFound);

        // A run that never started hands its grid straight back
        let recorder = Recorder::default();
        let filler = Filler::new(
            square(&alphabet),
            dictionary(&alphabet, &words),
            FillOptions::default(),
            Box::new(recorder.clone()),
        );
        let outcome = filler.stop();
        assert_eq!(outcome.status, FillStatus::Stopped);
        assert_eq!(outcome.grid.entry_flbms(), square(&alphabet).entry_flbms());
        assert!(outcome.lights.is_none());
        assert_eq!(outcome.statistics.states, 0);
        assert!(recorder.completed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_clears_hints() {
        let alphabet = Alphabet::latin();
        let builder = dictionary(&alphabet, &[("xy", 1)]);

        let filler =
            Filler::start(square(&alphabet), builder, FillOptions::default(), Box::new(())).unwrap();
        let hints = filler.hint_board();
        let outcome = filler.wait();

        assert_eq!(outcome.status, FillStatus::NoSolution);
        assert_eq!(hints.snapshot(), vec![0; 4]);
        assert!(outcome.render(&alphabet).is_none());
        assert!(outcome.feasible_list(0).is_empty());
    }

    #[test]
    fn test_stop_aborts_and_restores() {
        let alphabet = Alphabet::latin();
        let grid = square(&alphabet);
        let before = grid.entry_flbms();

        let filler =
            Filler::start(grid, Box::new(StallingBuilder), FillOptions::default(), Box::new(()))
                .unwrap();
        assert_eq!(filler.status(), FillStatus::Running);
        assert!(!filler.is_finished());
        let outcome = filler.stop();

        assert_eq!(outcome.status, FillStatus::Aborted);
        assert_eq!(outcome.grid.entry_flbms(), before);
        assert!(outcome.lights.is_none());
    }

    #[test]
    fn test_feasible_list_is_sorted_by_score() {
        let alphabet = Alphabet::latin();
        let mut grid = Grid::new();
        let entries: Vec<_> = (0..2).map(|_| grid.add_entry(alphabet.letters())).collect();
        grid.add_word(&entries, LightProps::default());
        let mut builder = dictionary(&alphabet, &[("ab", 1), ("cd", 5), ("ef", 3)]);
        let options = FillOptions {
            mode: FillMode::Feasibility,
            ..FillOptions::default()
        };

        let outcome = fill(grid, builder.as_mut(), &options);

        assert_eq!(outcome.status, FillStatus::SolutionFound);
        let lights = outcome.lights.as_ref().unwrap();
        let texts: Vec<&str> = outcome
            .feasible_list(0)
            .into_iter()
            .filter_map(|light_id| lights.source_text(light_id))
            .collect();
        assert_eq!(texts, vec!["cd", "ef", "ab"]);
    }
}
