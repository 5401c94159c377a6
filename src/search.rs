//! The backtracking search.
//!
//! The driver keeps a stack of frames, one per decision depth. Frame 0 holds the state from before
//! the run; each deeper frame is pushed just before a letter is tried at the branching entry of
//! the frame below, and holds the entry bitmaps from that moment plus whatever word arrays the
//! ensuing propagation displaced. Popping a frame puts all of that back, so trying the next letter
//! starts from exactly the state the previous one did.

use instant::{Duration, Instant};
use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::mem;

use crate::branching::{find_critical_entry, get_possibilities, Possibilities, Randomization};
use crate::cancel::CancellationToken;
use crate::candidates::{CandidateListBuilder, CandidateRequest};
use crate::error::{CandidateListError, FillError, PropagationFailure};
use crate::grid::{EntryId, Grid, LetterMode, WordLists};
use crate::jumble::JumbleData;
use crate::lights::{LightId, LightTable, UsedTracker};
use crate::propagation::{settle_entries, settle_words, try_vec};
use crate::scoring::make_scores;
use crate::spread::SpreadData;
use crate::types::{glyph_bit, is_forced, Flbm, FLBM_ALL};

/// Branch decisions shallower than this are logged at debug level.
const LOGGED_DEPTH: usize = 4;

/// What a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Fill every entry.
    #[default]
    Grid,
    /// Only branch on selected entries; the rest are left as propagation leaves them.
    Selection,
    /// Propagate once and report the feasible letters, without branching.
    Feasibility,
}

/// Settings for a single run.
#[derive(Debug, Clone)]
pub struct FillOptions {
    pub mode: FillMode,
    /// Don't let the same answer (or the same string) appear twice.
    pub unique_answers: bool,
    pub randomization: Randomization,
    /// Seed for the letter shuffle; a random one is drawn if unset.
    pub seed: Option<u64>,
    /// How often to publish the bitmaps of a running search.
    pub progress_interval: Duration,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            mode: FillMode::Grid,
            unique_answers: false,
            randomization: Randomization::None,
            seed: None,
            progress_interval: Duration::from_secs(3),
        }
    }
}

/// Where a run is, or how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillStatus {
    Stopped,
    Running,
    SolutionFound,
    NoSolution,
    Aborted,
    Failed(FillError),
}

impl FillStatus {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, FillStatus::Stopped | FillStatus::Running)
    }
}

/// A struct tracking statistics about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Letters tried.
    pub states: u64,
    pub backtracks: u64,
    pub max_depth: usize,
    pub duration: Duration,
}

/// The state of the grid at the point a run succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub entry_flbms: Vec<Flbm>,
    /// Surviving candidates of each word.
    pub word_lists: Vec<Vec<LightId>>,
}

/// Everything a run hands back. The grid itself is always restored to its state before the run.
#[derive(Debug)]
pub struct SearchReport {
    pub status: FillStatus,
    /// The light table built for the run, if list building got that far.
    pub lights: Option<LightTable>,
    pub solution: Option<Solution>,
    pub statistics: Statistics,
}

#[derive(Debug)]
struct Branch {
    entry: EntryId,
    possibilities: Possibilities,
    next: usize,
}

#[derive(Debug)]
struct Frame {
    entry_flbms: Vec<Flbm>,
    saved: Vec<Option<WordLists>>,
    branch: Option<Branch>,
}

impl Frame {
    fn new(grid: &Grid) -> Result<Frame, PropagationFailure> {
        let mut entry_flbms = try_vec(grid.entries.len())?;
        entry_flbms.extend(grid.entries.iter().map(|entry| entry.flbm));
        let mut saved = try_vec(grid.words.len())?;
        saved.resize_with(grid.words.len(), || None);
        Ok(Frame {
            entry_flbms,
            saved,
            branch: None,
        })
    }
}

/// Undo everything done since `frame` was pushed at `depth`.
fn restore_frame(grid: &mut Grid, lights: &LightTable, used: &mut UsedTracker, frame: Frame, depth: usize) {
    for (word, saved) in grid.words.iter_mut().zip(frame.saved) {
        if word.commit_depth.map_or(false, |commit_depth| commit_depth >= depth) {
            for &light_id in &word.lists.flist {
                used.set_used(lights.light(light_id), false);
            }
            word.commit_depth = None;
        }
        if let Some(lists) = saved {
            word.lists = lists;
        }
        word.upd = false;
    }
    for (entry, flbm) in grid.entries.iter_mut().zip(frame.entry_flbms) {
        entry.flbm = flbm;
        entry.upd = false;
    }
}

/// Alternate the two settling passes until neither changes anything.
fn propagate(
    grid: &mut Grid,
    lights: &LightTable,
    used: &mut UsedTracker,
    frame: &mut Frame,
    depth: usize,
    unique_answers: bool,
    cancel: &CancellationToken,
) -> Result<(), PropagationFailure> {
    loop {
        if cancel.is_cancelled() {
            return Err(PropagationFailure::Aborted);
        }
        if !settle_entries(grid, lights, used, &mut frame.saved, depth, unique_answers, cancel)? {
            return Ok(());
        }
        if !settle_words(grid, lights, cancel)? {
            return Ok(());
        }
    }
}

/// Ask the builder for every word's initial list and set up the per-candidate arrays.
fn build_lists(
    grid: &mut Grid,
    builder: &mut dyn CandidateListBuilder,
    cancel: &CancellationToken,
) -> Result<LightTable, CandidateListError> {
    let mut table = builder.prepare()?;

    for word_id in 0..grid.words.len() {
        let word = &grid.words[word_id];
        let tags = word.tag_count();
        let request = CandidateRequest {
            word: word_id,
            length: word.wlen - tags,
            tags,
            props: &word.props,
        };
        let flist = builder.build(&request, &mut table, cancel)?;
        if cancel.is_cancelled() {
            return Err(CandidateListError::Aborted);
        }

        let word = &mut grid.words[word_id];
        let count = flist.len();
        debug!("word {word_id}: {count} candidates");
        word.lists = WordLists {
            flist,
            ..WordLists::default()
        };
        match word.mode() {
            LetterMode::Normal => {}
            LetterMode::Jumble => {
                word.lists.jdata = vec![JumbleData::default(); count];
                word.lists.jflbm = vec![FLBM_ALL; count * word.jlen];
            }
            LetterMode::Spread => {
                word.lists.sdata = vec![SpreadData::unconstrained(word.entries.len()); count];
            }
        }
    }

    builder.finish(&mut table)?;
    Ok(table)
}

enum Step {
    Settle,
    NextPossibility,
    Backtrack,
}

/// Run a search over `grid` on the calling thread.
///
/// The grid comes back exactly as it went in; the outcome is in the report. `progress` is called
/// with the current entry bitmaps every `options.progress_interval` while the search runs.
pub fn run_search(
    grid: &mut Grid,
    builder: &mut dyn CandidateListBuilder,
    options: &FillOptions,
    cancel: &CancellationToken,
    progress: &mut dyn FnMut(&[Flbm]),
) -> SearchReport {
    let start = Instant::now();
    let mut statistics = Statistics::default();

    for word in &mut grid.words {
        word.fully_entered = word
            .entries
            .iter()
            .all(|&entry_id| is_forced(grid.entries[entry_id].flbm));
        word.commit_depth = None;
    }
    let pre_run_lists: Vec<WordLists> = grid
        .words
        .iter_mut()
        .map(|word| mem::take(&mut word.lists))
        .collect();

    let report = |status: FillStatus,
                      grid: &mut Grid,
                      lights: Option<LightTable>,
                      solution: Option<Solution>,
                      mut statistics: Statistics| {
        for (word, lists) in grid.words.iter_mut().zip(pre_run_lists.iter()) {
            word.lists = lists.clone();
            word.upd = false;
        }
        for entry in &mut grid.entries {
            entry.upd = false;
        }
        statistics.duration = start.elapsed();
        match &status {
            FillStatus::Failed(error) => warn!("fill failed: {error}"),
            status => info!("fill finished with {status:?}: {statistics:?}"),
        }
        SearchReport {
            status,
            lights,
            solution,
            statistics,
        }
    };

    let root = match Frame::new(grid) {
        Ok(frame) => frame,
        Err(_) => {
            return report(FillStatus::Failed(FillError::OutOfMemory), grid, None, None, statistics)
        }
    };
    let pre_run_flbms = root.entry_flbms.clone();

    let lights = match build_lists(grid, builder, cancel) {
        Ok(lights) => lights,
        Err(error) => {
            grid.set_entry_flbms(&pre_run_flbms);
            let status = match error {
                CandidateListError::Aborted => FillStatus::Aborted,
                error => FillStatus::Failed(error.into()),
            };
            return report(status, grid, None, None, statistics);
        }
    };
    debug!("built {} lights for {} words", lights.len(), grid.words.len());

    let mut used = UsedTracker::new(&lights);
    let seed = options.seed.unwrap_or_else(rand::random);
    debug!("seed {seed:#x}");
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut last_progress = Instant::now();
    let entry_count = grid.entries.len();
    let mut stack: Vec<Frame> = vec![root];

    for entry in &mut grid.entries {
        entry.upd = true;
    }
    for word in &mut grid.words {
        word.upd = true;
    }

    // Entry bitmaps and the fresh lists don't agree yet, so narrow the entries first.
    let mut step = match settle_words(grid, &lights, cancel) {
        Ok(_) => Step::Settle,
        Err(_) => Step::Backtrack,
    };

    let status = loop {
        match step {
            Step::Settle => {
                let depth = stack.len() - 1;
                let Some(frame) = stack.last_mut() else {
                    break FillStatus::NoSolution;
                };
                match propagate(grid, &lights, &mut used, frame, depth, options.unique_answers, cancel)
                    .and_then(|()| make_scores(grid, &lights, &used, options.unique_answers, cancel))
                {
                    Ok(()) => {}
                    Err(PropagationFailure::Infeasible { word }) => {
                        trace!("depth {depth}: word {word} is infeasible");
                        step = Step::Backtrack;
                        continue;
                    }
                    Err(PropagationFailure::Aborted) => break FillStatus::Aborted,
                    Err(PropagationFailure::OutOfMemory) => {
                        break FillStatus::Failed(FillError::OutOfMemory)
                    }
                }
                debug_assert!(
                    grid.entries
                        .iter()
                        .zip(&frame.entry_flbms)
                        .all(|(entry, &before)| entry.flbm & !before == 0),
                    "depth {depth}: propagation widened an entry"
                );

                if options.mode == FillMode::Feasibility {
                    break FillStatus::SolutionFound;
                }

                let selection_only = options.mode == FillMode::Selection;
                let Some(entry) = find_critical_entry(&grid.entries, selection_only) else {
                    break FillStatus::SolutionFound;
                };
                let possibilities =
                    get_possibilities(&grid.entries[entry], options.randomization, true, &mut rng);
                if depth < LOGGED_DEPTH {
                    debug!("depth {depth}: branching on entry {entry} with {} letters", possibilities.len());
                }
                frame.branch = Some(Branch {
                    entry,
                    possibilities,
                    next: 0,
                });
                step = Step::NextPossibility;
            }

            Step::NextPossibility => {
                let depth = stack.len() - 1;
                let Some(branch) = stack.last_mut().and_then(|frame| frame.branch.as_mut()) else {
                    step = Step::Backtrack;
                    continue;
                };
                let Some(&glyph) = branch.possibilities.get(branch.next) else {
                    step = Step::Backtrack;
                    continue;
                };
                branch.next += 1;
                let entry = branch.entry;

                if cancel.is_cancelled() {
                    break FillStatus::Aborted;
                }
                if depth == entry_count {
                    break FillStatus::Failed(FillError::OutOfStack { depth });
                }
                match Frame::new(grid) {
                    Ok(frame) => stack.push(frame),
                    Err(_) => break FillStatus::Failed(FillError::OutOfMemory),
                }
                debug_assert!(
                    grid.entries[entry].flbm & glyph_bit(glyph) != 0,
                    "glyph {glyph} was ruled out at entry {entry}"
                );

                trace!("depth {depth}: trying glyph {glyph} at entry {entry}");
                grid.entries[entry].flbm = glyph_bit(glyph);
                grid.entries[entry].upd = true;
                statistics.states += 1;
                statistics.max_depth = statistics.max_depth.max(depth + 1);

                if last_progress.elapsed() >= options.progress_interval {
                    progress(&grid.entry_flbms());
                    last_progress = Instant::now();
                }
                step = Step::Settle;
            }

            Step::Backtrack => {
                let depth = stack.len() - 1;
                if let Some(frame) = stack.pop() {
                    restore_frame(grid, &lights, &mut used, frame, depth);
                }
                statistics.backtracks += 1;
                if cancel.is_cancelled() {
                    break FillStatus::Aborted;
                }
                if stack.is_empty() {
                    break FillStatus::NoSolution;
                }
                step = Step::NextPossibility;
            }
        }
    };

    let solution = (status == FillStatus::SolutionFound).then(|| Solution {
        entry_flbms: grid.entry_flbms(),
        word_lists: grid.words.iter().map(|word| word.lists.flist.clone()).collect(),
    });

    while let Some(frame) = stack.pop() {
        let depth = stack.len();
        restore_frame(grid, &lights, &mut used, frame, depth);
    }
    debug_assert!(used.is_empty());

    report(status, grid, Some(lights), solution, statistics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::DictionaryCandidates;
    use crate::lights::{EntryMethods, LightProps};
    use crate::types::{forced_glyph, Alphabet, DASH, FLBM_NORMAL};
    use indoc::indoc;
    use rand::Rng;
    use std::collections::HashSet;

    fn dictionary(alphabet: &Alphabet, words: &[&str]) -> DictionaryCandidates {
        let word_list: Vec<(String, i32)> =
            words.iter().map(|word| (word.to_string(), 10)).collect();
        DictionaryCandidates::from_word_list(&word_list, alphabet)
    }

    fn open_square() -> (Alphabet, Grid) {
        let alphabet = Alphabet::latin();
        let grid = Grid::from_template(
            indoc! {"
                ..
                ..
            "},
            &alphabet,
            &LightProps::default(),
        )
        .unwrap();
        (alphabet, grid)
    }

    fn fill(
        grid: &mut Grid,
        builder: &mut DictionaryCandidates,
        options: &FillOptions,
    ) -> SearchReport {
        run_search(grid, builder, options, &CancellationToken::new(), &mut |_| {})
    }

    /// Check that every word of the solved grid reads as one of `words`.
    fn assert_valid_fill(grid: &Grid, alphabet: &Alphabet, solution: &Solution, words: &[&str]) {
        assert!(solution.entry_flbms.iter().all(|&flbm| is_forced(flbm)));
        for word_id in 0..grid.words.len() {
            let text = grid.word_text(word_id, &solution.entry_flbms, alphabet);
            assert!(words.contains(&text.as_str()), "{text} isn't in {words:?}");
        }
    }

    #[test]
    fn test_fill_2x2_squares() {
        for words in [["ab", "cd", "ac", "bd"], ["ok", "no", "on", "ko"]] {
            let (alphabet, mut grid) = open_square();
            let mut builder = dictionary(&alphabet, &words);

            let report = fill(&mut grid, &mut builder, &FillOptions::default());

            assert_eq!(report.status, FillStatus::SolutionFound);
            assert_valid_fill(&grid, &alphabet, report.solution.as_ref().unwrap(), &words);
            println!("{:?}", report.statistics);
        }
    }

    #[test]
    fn test_unique_answers() {
        let words = ["ab", "xy", "zz", "ww"];
        let (alphabet, mut grid) = open_square();
        let mut builder = dictionary(&alphabet, &words);

        // Without uniqueness an all-z or all-w square works
        let report = fill(&mut grid, &mut builder, &FillOptions::default());
        assert_eq!(report.status, FillStatus::SolutionFound);
        assert_valid_fill(&grid, &alphabet, report.solution.as_ref().unwrap(), &words);

        let options = FillOptions {
            unique_answers: true,
            ..FillOptions::default()
        };
        let report = fill(&mut grid, &mut builder, &options);
        assert_eq!(report.status, FillStatus::NoSolution);
        assert!(report.solution.is_none());

        let (alphabet, mut grid) = open_square();
        let mut builder = dictionary(&alphabet, &["aa"]);
        assert_eq!(
            fill(&mut grid, &mut builder, &FillOptions::default()).status,
            FillStatus::SolutionFound
        );
        assert_eq!(fill(&mut grid, &mut builder, &options).status, FillStatus::NoSolution);
    }

    #[test]
    fn test_grid_is_restored_after_a_run() {
        let alphabet = Alphabet::latin();
        let mut grid = Grid::from_template(
            indoc! {"
                a.
                ..
            "},
            &alphabet,
            &LightProps::default(),
        )
        .unwrap();
        let before = grid.entry_flbms();
        let mut builder = dictionary(&alphabet, &["ab", "cd", "ac", "bd"]);
        let options = FillOptions {
            unique_answers: true,
            ..FillOptions::default()
        };

        let report = fill(&mut grid, &mut builder, &options);

        assert_eq!(report.status, FillStatus::SolutionFound);
        let solution = report.solution.unwrap();
        assert_eq!(grid.render(&solution.entry_flbms, &alphabet), "ab\ncd");
        assert_eq!(grid.entry_flbms(), before);
        for word in &grid.words {
            assert!(word.lists.flist.is_empty());
            assert_eq!(word.commit_depth, None);
        }
        assert!(solution.word_lists.iter().all(|list| list.len() == 1));
    }

    #[test]
    fn test_backtracking_is_complete_on_small_squares() {
        let alphabet = Alphabet::latin();
        let mut rng = SmallRng::seed_from_u64(0x6669_6c6c);
        let all_words: Vec<String> = ["a", "b", "c"]
            .iter()
            .flat_map(|first| ["a", "b", "c"].iter().map(move |second| format!("{first}{second}")))
            .collect();

        for _ in 0..60 {
            let words: Vec<&str> = all_words
                .iter()
                .filter(|_| rng.gen_bool(0.35))
                .map(String::as_str)
                .collect();
            let dictionary_set: HashSet<&str> = words.iter().copied().collect();

            // Brute force over every lettering of the four cells
            let letters = ['a', 'b', 'c'];
            let mut expected = false;
            for cells in 0..81 {
                let cell = |index: u32| letters[(cells / 3usize.pow(index)) % 3];
                let rows = [format!("{}{}", cell(0), cell(1)), format!("{}{}", cell(2), cell(3))];
                let columns = [format!("{}{}", cell(0), cell(2)), format!("{}{}", cell(1), cell(3))];
                if rows.iter().chain(&columns).all(|word| dictionary_set.contains(word.as_str())) {
                    expected = true;
                    break;
                }
            }

            let (_, mut grid) = open_square();
            let mut builder = dictionary(&alphabet, &words);
            let options = FillOptions {
                randomization: Randomization::Light,
                seed: Some(rng.gen()),
                ..FillOptions::default()
            };
            let report = fill(&mut grid, &mut builder, &options);

            if expected {
                assert_eq!(report.status, FillStatus::SolutionFound, "{words:?}");
                assert_valid_fill(&grid, &alphabet, report.solution.as_ref().unwrap(), &words);
            } else {
                assert_eq!(report.status, FillStatus::NoSolution, "{words:?}");
            }
            assert!(grid.entries.iter().all(|entry| entry.flbm == alphabet.letters()));
        }
    }

    #[test]
    fn test_cancellation_restores_state() {
        let (alphabet, mut grid) = open_square();
        let before = grid.entry_flbms();
        let mut builder = dictionary(&alphabet, &["ab", "cd", "ac", "bd"]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = run_search(&mut grid, &mut builder, &FillOptions::default(), &cancel, &mut |_| {});
        assert_eq!(report.status, FillStatus::Aborted);
        assert!(report.lights.is_none());
        assert_eq!(grid.entry_flbms(), before);

        // Cancel from the progress hook, after the first letter has been placed
        let cancel = CancellationToken::new();
        let options = FillOptions {
            progress_interval: Duration::ZERO,
            ..FillOptions::default()
        };
        let mut published = vec![];
        let report = run_search(&mut grid, &mut builder, &options, &cancel, &mut |flbms| {
            published.push(flbms.to_vec());
            cancel.cancel();
        });

        assert_eq!(report.status, FillStatus::Aborted);
        assert_eq!(published.len(), 1);
        assert_ne!(published[0], before);
        assert_eq!(grid.entry_flbms(), before);
        for word in &grid.words {
            assert!(word.lists.flist.is_empty());
            assert_eq!(word.commit_depth, None);
        }
    }

    #[test]
    fn test_feasibility_and_selection_modes() {
        let alphabet = Alphabet::latin();
        let code = |letter| alphabet.code(letter).unwrap();
        let words = ["ab", "cd", "ac", "bd"];

        let mut grid = Grid::from_template("a.\n..", &alphabet, &LightProps::default()).unwrap();
        let mut builder = dictionary(&alphabet, &words);
        let options = FillOptions {
            mode: FillMode::Feasibility,
            ..FillOptions::default()
        };
        let report = fill(&mut grid, &mut builder, &options);
        assert_eq!(report.status, FillStatus::SolutionFound);
        let flbms = report.solution.unwrap().entry_flbms;
        assert_eq!(flbms[1], glyph_bit(code('b')) | glyph_bit(code('c')));
        assert_eq!(flbms[3], glyph_bit(code('d')));
        assert_eq!(report.statistics.states, 0);

        let (_, mut grid) = open_square();
        grid.entries[1].selected = true;
        let options = FillOptions {
            mode: FillMode::Selection,
            ..FillOptions::default()
        };
        let report = fill(&mut grid, &mut builder, &options);
        assert_eq!(report.status, FillStatus::SolutionFound);
        let flbms = report.solution.unwrap().entry_flbms;
        assert_eq!(forced_glyph(flbms[1]), Some(code('b')));
        assert!(!is_forced(flbms[2]));
        assert_eq!(report.statistics.states, 1);
    }

    #[test]
    fn test_jumbled_and_spread_words() {
        let alphabet = Alphabet::latin();
        let code = |letter| alphabet.code(letter).unwrap();

        // A jumbled "cat" crossing "ax" at its middle letter
        let mut grid = Grid::new();
        let entries: Vec<EntryId> = (0..4).map(|_| grid.add_entry(FLBM_NORMAL)).collect();
        let all_methods = LightProps {
            entry_methods: EntryMethods::ALL,
            ..LightProps::default()
        };
        grid.add_tagged_word(&entries[..3], 0, all_methods);
        grid.add_word(&[entries[1], entries[3]], LightProps::default());
        let mut builder = dictionary(&alphabet, &["cat", "ax"]);

        let report = fill(&mut grid, &mut builder, &FillOptions::default());
        assert_eq!(report.status, FillStatus::SolutionFound);
        let flbms = report.solution.unwrap().entry_flbms;
        assert_eq!(grid.word_text(0, &flbms, &alphabet), "cat");
        assert_eq!(grid.word_text(1, &flbms, &alphabet), "ax");

        // "ab" spread over three entries, with the first letter pinned by a crossing word
        let mut grid = Grid::new();
        let entries: Vec<EntryId> = (0..4).map(|_| grid.add_entry(FLBM_ALL)).collect();
        grid.add_spread_word(&entries[..3], 2, LightProps::default());
        grid.add_word(&[entries[0], entries[3]], LightProps::default());
        let mut builder = dictionary(&alphabet, &["ab"]);

        let report = fill(&mut grid, &mut builder, &FillOptions::default());
        assert_eq!(report.status, FillStatus::SolutionFound);
        let flbms = report.solution.unwrap().entry_flbms;
        assert_eq!(forced_glyph(flbms[0]), Some(code('a')));
        assert_eq!(forced_glyph(flbms[1]), Some(code('b')));
        assert_eq!(forced_glyph(flbms[2]), Some(DASH));
        assert_eq!(forced_glyph(flbms[3]), Some(code('b')));
    }

    /// Walks the whole search tree below a settled node with the same steps `run_search` takes.
    struct TreeWalk<'a> {
        lights: &'a LightTable,
        used: UsedTracker,
        rng: SmallRng,
        unique_answers: bool,
        cancel: CancellationToken,
        nodes: usize,
    }

    impl TreeWalk<'_> {
        /// Settle the node `frame` was pushed for and check it against its parent, then recurse
        /// into every letter offered at its branching entry.
        fn visit(&mut self, grid: &mut Grid, frame: &mut Frame, depth: usize, parent_commits: &[Option<usize>]) {
            let settled = propagate(
                grid,
                self.lights,
                &mut self.used,
                frame,
                depth,
                self.unique_answers,
                &self.cancel,
            )
            .and_then(|()| make_scores(grid, self.lights, &self.used, self.unique_answers, &self.cancel));
            if settled.is_err() {
                return;
            }
            self.nodes += 1;

            // Bitmaps only shrink along a branch
            for (entry, &before) in grid.entries.iter().zip(&frame.entry_flbms) {
                assert_eq!(entry.flbm & !before, 0, "entry widened at depth {depth}");
            }
            // Commits made higher up survive, and nothing is committed deeper than this node
            for (word, &parent) in grid.words.iter().zip(parent_commits) {
                if parent.is_some() {
                    assert_eq!(word.commit_depth, parent);
                }
                assert!(word.commit_depth.map_or(true, |commit| commit <= depth));
            }

            if self.nodes > 2000 {
                return;
            }
            let Some(entry) = find_critical_entry(&grid.entries, false) else {
                return;
            };
            let possibilities =
                get_possibilities(&grid.entries[entry], Randomization::Heavy, true, &mut self.rng);
            for &glyph in &possibilities {
                assert_ne!(
                    grid.entries[entry].flbm & glyph_bit(glyph),
                    0,
                    "glyph {glyph} offered at entry {entry} with bitmap {:#x}",
                    grid.entries[entry].flbm
                );
            }

            let flbms = grid.entry_flbms();
            let commits: Vec<Option<usize>> = grid.words.iter().map(|word| word.commit_depth).collect();
            for glyph in possibilities {
                let mut child = Frame::new(grid).unwrap();
                grid.entries[entry].flbm = glyph_bit(glyph);
                grid.entries[entry].upd = true;
                self.visit(grid, &mut child, depth + 1, &commits);
                restore_frame(grid, self.lights, &mut self.used, child, depth + 1);

                assert_eq!(grid.entry_flbms(), flbms);
                assert!(grid.words.iter().map(|word| word.commit_depth).eq(commits.iter().copied()));
            }
        }
    }

    #[test]
    fn test_branches_only_narrow() {
        let alphabet = Alphabet::latin();
        let mut rng = SmallRng::seed_from_u64(0x6e61_7277);
        let short_words: Vec<String> = ["a", "b", "c"]
            .iter()
            .flat_map(|first| ["a", "b", "c"].iter().map(move |second| format!("{first}{second}")))
            .collect();
        let long_words: Vec<String> = short_words
            .iter()
            .flat_map(|prefix| ["a", "b", "c"].iter().map(move |last| format!("{prefix}{last}")))
            .collect();

        let mut visited = 0;
        for round in 0..80 {
            // A spread word over entries 0..4, crossed by normal words at entries 1 and 3
            let spread_length = if round % 2 == 0 { 2 } else { 3 };
            let mut grid = Grid::new();
            let entries: Vec<EntryId> = (0..6).map(|_| grid.add_entry(FLBM_ALL)).collect();
            grid.add_spread_word(&entries[..4], spread_length, LightProps::default());
            grid.add_word(&[entries[1], entries[4]], LightProps::default());
            grid.add_word(&[entries[3], entries[5]], LightProps::default());

            let words: Vec<&str> = short_words
                .iter()
                .chain(&long_words)
                .filter(|_| rng.gen_bool(0.6))
                .map(String::as_str)
                .collect();
            let mut builder = dictionary(&alphabet, &words);
            let cancel = CancellationToken::new();

            let mut root = Frame::new(&grid).unwrap();
            let lights = build_lists(&mut grid, &mut builder, &cancel).unwrap();
            for entry in &mut grid.entries {
                entry.upd = true;
            }
            for word in &mut grid.words {
                word.upd = true;
            }
            if settle_words(&mut grid, &lights, &cancel).is_err() {
                continue;
            }

            let mut walk = TreeWalk {
                lights: &lights,
                used: UsedTracker::new(&lights),
                rng: SmallRng::seed_from_u64(rng.gen()),
                unique_answers: round % 4 >= 2,
                cancel,
                nodes: 0,
            };
            walk.visit(&mut grid, &mut root, 0, &[None, None, None]);
            restore_frame(&mut grid, &lights, &mut walk.used, root, 0);

            assert!(walk.used.is_empty());
            assert!(grid.entries.iter().all(|entry| entry.flbm == FLBM_ALL));
            visited += walk.nodes;
        }
        assert!(visited > 20);
    }

    #[test]
    fn test_out_of_candidates_before_branching() {
        let (alphabet, mut grid) = open_square();
        let mut builder = dictionary(&alphabet, &["abc"]);

        let report = fill(&mut grid, &mut builder, &FillOptions::default());

        assert_eq!(report.status, FillStatus::NoSolution);
        assert_eq!(report.statistics.states, 0);
        assert!(report.lights.is_some());
    }
}
