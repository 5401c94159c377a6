use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};

use crate::error::TemplateError;
use crate::jumble::JumbleData;
use crate::lights::{EntryMethods, LightId, LightProps};
use crate::spread::SpreadData;
use crate::types::{forced_glyph, glyph_bit, is_forced, Alphabet, Flbm, GLYPH_CODES};
use crate::{MAX_GRID_SIZE, MAX_SLOT_LENGTH, MAX_WORD_ENTRIES};

/// Index of an entry in the grid's entry arena.
pub type EntryId = usize;

/// Index of a word in the grid.
pub type WordId = usize;

/// Zero-indexed x and y coords for a cell in the grid, where y = 0 in the top row.
pub type GridCoord = (usize, usize);

/// Direction that a word is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Across,
    Down,
}

/// A single letter position, shared by every word that runs through it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Letters still possible here. This is the authoritative value during a search.
    pub flbm: Flbm,
    /// Number of words through this entry.
    pub checking: usize,
    /// Branching score for each letter, from the last scoring pass.
    pub score: [f64; GLYPH_CODES],
    /// Highest score in `score`.
    pub crux: f64,
    /// Whether the entry is part of the current selection, for selection-only fills.
    pub selected: bool,
    pub(crate) upd: bool,
    pub position: Option<GridCoord>,
}

impl Entry {
    #[must_use]
    pub fn new(flbm: Flbm) -> Entry {
        Entry {
            flbm,
            checking: 0,
            score: [0.0; GLYPH_CODES],
            crux: 0.0,
            selected: false,
            upd: false,
            position: None,
        }
    }

    #[must_use]
    pub fn is_forced(&self) -> bool {
        is_forced(self.flbm)
    }
}

/// How a word's candidates map onto its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterMode {
    /// Candidate letter `k` goes in entry `k`.
    Normal,
    /// The first `jlen` entries take any allowed permutation of the candidate.
    Jumble,
    /// The candidate is spread monotonically across the entries, with dashes filling the rest.
    Spread,
}

/// The arrays of a word that change during a search. A frame takes ownership of one of these the
/// first time it touches a word, and hands it back when the frame is popped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordLists {
    /// Surviving candidates.
    pub flist: Vec<LightId>,
    /// Jumble mode: one record per candidate.
    pub jdata: Vec<JumbleData>,
    /// Jumble mode: deduced bitmaps, `jlen` per candidate.
    pub jflbm: Vec<Flbm>,
    /// Spread mode: one record per candidate.
    pub sdata: Vec<SpreadData>,
}

impl WordLists {
    /// The jumble bitmaps deduced for the candidate at `index`.
    #[must_use]
    pub fn jumble_flbms(&self, index: usize, jlen: usize) -> &[Flbm] {
        &self.jflbm[index * jlen..(index + 1) * jlen]
    }
}

pub struct Word {
    pub entries: SmallVec<[EntryId; MAX_SLOT_LENGTH]>,
    /// Length of each candidate, including tags.
    pub wlen: usize,
    /// Number of leading entries subject to jumbling.
    pub jlen: usize,
    pub props: LightProps,
    pub lists: WordLists,
    /// Depth at which all of this word's entries became forced, if they have.
    pub commit_depth: Option<usize>,
    pub(crate) upd: bool,
    /// Were all entries forced before the search started?
    pub fully_entered: bool,
    pub start_cell: Option<GridCoord>,
    pub direction: Option<Direction>,
}

impl Debug for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Word")
            .field("entries", &self.entries)
            .field("wlen", &self.wlen)
            .field("jlen", &self.jlen)
            .field("props", &self.props)
            .field("candidates", &self.lists.flist.len())
            .field("commit_depth", &self.commit_depth)
            .field("fully_entered", &self.fully_entered)
            .finish()
    }
}

impl Word {
    #[must_use]
    pub fn mode(&self) -> LetterMode {
        if self.props.entry_methods.contains(EntryMethods::JUMBLED) {
            LetterMode::Jumble
        } else if self.props.entry_methods.contains(EntryMethods::SPREAD) {
            LetterMode::Spread
        } else {
            LetterMode::Normal
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of trailing tag entries.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        match self.mode() {
            LetterMode::Spread => 0,
            _ => self.entries.len() - self.jlen,
        }
    }

    #[must_use]
    pub fn candidates(&self) -> &[LightId] {
        &self.lists.flist
    }
}

/// The entries and words of a puzzle, plus the template layout when there is one.
#[derive(Debug, Default)]
pub struct Grid {
    pub entries: Vec<Entry>,
    pub words: Vec<Word>,
    cells: Vec<Vec<Option<EntryId>>>,
}

impl Grid {
    #[must_use]
    pub fn new() -> Grid {
        Grid::default()
    }

    pub fn add_entry(&mut self, flbm: Flbm) -> EntryId {
        self.entries.push(Entry::new(flbm));
        self.entries.len() - 1
    }

    fn push_word(&mut self, entries: &[EntryId], wlen: usize, jlen: usize, props: LightProps) -> WordId {
        assert!(
            entries.len() <= MAX_WORD_ENTRIES,
            "Word has more than {MAX_WORD_ENTRIES} entries"
        );
        for &entry_id in entries {
            self.entries[entry_id].checking += 1;
        }
        self.words.push(Word {
            entries: SmallVec::from_slice(entries),
            wlen,
            jlen,
            props,
            lists: WordLists::default(),
            commit_depth: None,
            upd: false,
            fully_entered: false,
            start_cell: None,
            direction: None,
        });
        self.words.len() - 1
    }

    /// Add a word whose candidates have one letter per entry.
    pub fn add_word(&mut self, entries: &[EntryId], props: LightProps) -> WordId {
        self.push_word(entries, entries.len(), entries.len(), props)
    }

    /// Add a jumbled word whose last `tags` entries hold tag letters in fixed positions.
    pub fn add_tagged_word(&mut self, entries: &[EntryId], tags: usize, props: LightProps) -> WordId {
        assert!(tags <= entries.len());
        let props = LightProps {
            entry_methods: props.entry_methods | EntryMethods::JUMBLED,
            ..props
        };
        self.push_word(entries, entries.len(), entries.len() - tags, props)
    }

    /// Add a word that takes `length`-letter candidates spread across its entries.
    pub fn add_spread_word(&mut self, entries: &[EntryId], length: usize, props: LightProps) -> WordId {
        assert!(length <= entries.len());
        let methods = (props.entry_methods | EntryMethods::SPREAD).bits() & !EntryMethods::JUMBLED.bits();
        let props = LightProps {
            entry_methods: EntryMethods::from_bits(methods),
            ..props
        };
        self.push_word(entries, length, entries.len(), props)
    }

    /// Build a grid from a string template, with `.` representing empty cells, `#` representing
    /// blocks, and letters representing themselves. Every run of two or more cells across or
    /// down becomes a word with the given props.
    pub fn from_template(
        template: &str,
        alphabet: &Alphabet,
        props: &LightProps,
    ) -> Result<Grid, TemplateError> {
        let template: Vec<Vec<char>> = template
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    None
                } else {
                    Some(line.chars().collect())
                }
            })
            .collect();

        let height = template.len();
        let width = template.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Err(TemplateError::Empty);
        }
        if width > MAX_GRID_SIZE || height > MAX_GRID_SIZE {
            return Err(TemplateError::TooLarge { width, height });
        }

        let mut grid = Grid::new();
        let open_letters = alphabet.letters();

        grid.cells = vec![vec![None; width]; height];
        for (y, line) in template.iter().enumerate() {
            for (x, &cell) in line.iter().enumerate() {
                let flbm = match cell {
                    '#' => continue,
                    '.' => open_letters,
                    _ => alphabet
                        .code(cell)
                        .map(glyph_bit)
                        .ok_or(TemplateError::UnknownCharacter { char: cell, x, y })?,
                };
                let entry_id = grid.add_entry(flbm);
                grid.entries[entry_id].position = Some((x, y));
                grid.cells[y][x] = Some(entry_id);
            }
        }

        fn build_runs(cells: &[Vec<Option<EntryId>>]) -> Vec<SmallVec<[EntryId; MAX_SLOT_LENGTH]>> {
            let mut result = vec![];

            for line in cells {
                let mut current_run: SmallVec<[EntryId; MAX_SLOT_LENGTH]> = SmallVec::new();

                for &cell in line {
                    if let Some(entry_id) = cell {
                        current_run.push(entry_id);
                    } else {
                        if current_run.len() > 1 {
                            result.push(current_run.clone());
                        }
                        current_run.clear();
                    }
                }

                if current_run.len() > 1 {
                    result.push(current_run);
                }
            }

            result
        }

        let transposed_cells: Vec<Vec<Option<EntryId>>> = (0..width)
            .map(|x| (0..height).map(|y| grid.cells[y][x]).collect())
            .collect();

        for (direction, runs) in [
            (Direction::Across, build_runs(&grid.cells)),
            (Direction::Down, build_runs(&transposed_cells)),
        ] {
            for run in runs {
                let start_cell = grid.entries[run[0]].position;
                let word_id = grid.add_word(&run, props.clone());
                grid.words[word_id].start_cell = start_cell;
                grid.words[word_id].direction = Some(direction);
            }
        }

        Ok(grid)
    }

    #[must_use]
    pub fn entry_flbms(&self) -> Vec<Flbm> {
        self.entries.iter().map(|entry| entry.flbm).collect()
    }

    /// Replace every entry bitmap.
    pub fn set_entry_flbms(&mut self, flbms: &[Flbm]) {
        for (entry, &flbm) in self.entries.iter_mut().zip(flbms) {
            entry.flbm = flbm;
        }
    }

    /// The text of a word under the given entry bitmaps, with `.` for unforced entries.
    #[must_use]
    pub fn word_text(&self, word_id: WordId, flbms: &[Flbm], alphabet: &Alphabet) -> String {
        self.words[word_id]
            .entries
            .iter()
            .map(|&entry_id| forced_glyph(flbms[entry_id]).map_or('.', |glyph| alphabet.glyph(glyph)))
            .collect()
    }

    /// Render the grid under the given entry bitmaps. Template grids come back in template form;
    /// other grids as one word per line.
    #[must_use]
    pub fn render(&self, flbms: &[Flbm], alphabet: &Alphabet) -> String {
        if self.cells.is_empty() {
            return (0..self.words.len())
                .map(|word_id| self.word_text(word_id, flbms, alphabet))
                .collect::<Vec<_>>()
                .join("\n");
        }

        self.cells
            .iter()
            .map(|line| {
                line.iter()
                    .map(|cell| match cell {
                        None => '#',
                        Some(entry_id) => forced_glyph(flbms[*entry_id])
                            .map_or('.', |glyph| alphabet.glyph(glyph)),
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
