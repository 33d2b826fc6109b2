//! Book quiz: open a book, answer one question per page, and a perfect run
//! counts towards unlocking the exit.
//!
//! A [`Bookshelf`] owns every book in the session together with the shared
//! bits (which book is open, how many are completed). All transitions come
//! back as [`ShelfEvent`]s; the session turns them into control changes,
//! sounds and runtime events.

use glam::Vec3;

use crate::config::BookSettings;
use crate::floater::BookFloater;
use crate::interaction::Interactable;
use crate::level::{Aabb, BookSpec, VanishSpec};
use crate::types::{BookView, SoundCue, VanishType};

pub const BOOK_HALF_EXTENTS: Vec3 = Vec3::new(0.2, 0.15, 0.15);

#[derive(Clone, Debug, PartialEq)]
pub enum ShelfEvent {
    Opened {
        book: usize,
    },
    Closed {
        book: usize,
    },
    Sound {
        cue: SoundCue,
    },
    Answered {
        book: usize,
        page: usize,
        choice: u8,
        correct: bool,
    },
    Completed {
        book: usize,
        completed: u32,
    },
    ExitUnlocked,
    Vanished {
        book: usize,
        destroyed: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookRequest {
    Open,
    Close,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum VanishPhase {
    Idle,
    Animating { elapsed: f32 },
    Done,
}

#[derive(Clone, Debug)]
pub struct Book {
    spec: BookSpec,
    page: usize,
    open: bool,
    locked: bool,
    answered: Vec<bool>,
    answered_correctly: Vec<bool>,
    finished: bool,
    advance_in: Option<f32>,
    vanish_in: Option<f32>,
    phase: VanishPhase,
    vanished: bool,
    active: bool,
    destroyed: bool,
    collider_enabled: bool,
    alpha: f32,
    scale: f32,
    dissolve: f32,
    floater: BookFloater,
    focused: bool,
}

impl Book {
    pub fn new(spec: BookSpec) -> Self {
        let pages = spec.pages.len();
        Self {
            floater: BookFloater::new(spec.position),
            spec,
            page: 0,
            open: false,
            locked: false,
            answered: vec![false; pages],
            answered_correctly: vec![false; pages],
            finished: false,
            advance_in: None,
            vanish_in: None,
            phase: VanishPhase::Idle,
            vanished: false,
            active: true,
            destroyed: false,
            collider_enabled: true,
            alpha: 1.0,
            scale: 1.0,
            dissolve: 0.0,
            focused: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn title(&self) -> &str {
        &self.spec.title
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.spec.pages.len()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_vanished(&self) -> bool {
        self.vanished
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn position(&self) -> Vec3 {
        self.floater.position()
    }

    /// Number of answer buttons on the current page.
    pub fn answer_count(&self) -> usize {
        self.spec.pages.get(self.page).map_or(0, |page| page.answers.len())
    }

    /// Correct answer of the current page, 1-based.
    pub fn correct_choice(&self) -> u8 {
        self.spec.pages.get(self.page).map_or(0, |page| page.correct)
    }

    /// Interaction volume, or `None` once the collider is gone.
    pub fn collider(&self) -> Option<Aabb> {
        (self.collider_enabled && self.active)
            .then(|| Aabb::around(self.floater.position(), BOOK_HALF_EXTENTS * self.scale.max(0.01)))
    }

    fn reset_quiz(&mut self) {
        self.answered.iter_mut().for_each(|flag| *flag = false);
        self.answered_correctly.iter_mut().for_each(|flag| *flag = false);
        self.locked = false;
        self.advance_in = None;
        self.page = 0;
    }

    fn apply_vanish_progress(&mut self, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        let faded = 1.0 - progress;
        match effective_vanish(&self.spec.vanish) {
            VanishType::Instant => {}
            VanishType::FadeOut => self.alpha = faded,
            VanishType::ScaleDown => self.scale = faded,
            VanishType::FadeAndScale => {
                self.alpha = faded;
                self.scale = faded;
            }
            VanishType::Dissolve => self.dissolve = progress,
        }
    }

    fn finish_vanish(&mut self) -> bool {
        self.phase = VanishPhase::Done;
        self.active = false;
        self.destroyed = self.spec.vanish.destroy_after;
        self.destroyed
    }

    pub fn view(&self) -> BookView {
        let page = self.spec.pages.get(self.page);
        BookView {
            id: self.spec.id.clone(),
            title: self.spec.title.clone(),
            position: self.floater.position(),
            open: self.open,
            page: self.page,
            page_label: format!("Page {}/{}", self.page + 1, self.spec.pages.len()),
            page_text: page.map(|p| p.text.clone()).unwrap_or_default(),
            answers: page.map(|p| p.answers.clone()).unwrap_or_default(),
            finished: self.finished,
            vanished: self.vanished,
            active: self.active,
            alpha: self.alpha,
            scale: self.scale,
            dissolve: self.dissolve,
        }
    }
}

/// Dissolve needs material support; without it the book fades instead.
fn effective_vanish(spec: &VanishSpec) -> VanishType {
    match spec.kind {
        VanishType::Dissolve if !spec.supports_dissolve => VanishType::FadeOut,
        kind => kind,
    }
}

impl Interactable for Book {
    type Outcome = BookRequest;

    fn interact(&mut self) -> BookRequest {
        if self.vanished {
            BookRequest::Ignored
        } else if self.open {
            BookRequest::Close
        } else {
            BookRequest::Open
        }
    }

    fn prompt(&self) -> String {
        if self.vanished || self.open {
            String::new()
        } else {
            format!("Read {}", self.spec.title)
        }
    }

    fn can_interact(&self) -> bool {
        !self.vanished
    }

    fn on_focus(&mut self) {
        self.focused = true;
    }

    fn on_lose_focus(&mut self) {
        self.focused = false;
    }
}

#[derive(Clone, Debug)]
pub struct Bookshelf {
    settings: BookSettings,
    books: Vec<Book>,
    open: Option<usize>,
    completed: u32,
}

impl Bookshelf {
    pub fn new(specs: &[BookSpec], settings: BookSettings) -> Self {
        Self {
            settings,
            books: specs.iter().cloned().map(Book::new).collect(),
            open: None,
            completed: 0,
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn book(&self, index: usize) -> Option<&Book> {
        self.books.get(index)
    }

    pub fn book_mut(&mut self, index: usize) -> Option<&mut Book> {
        self.books.get_mut(index)
    }

    pub fn open_book(&self) -> Option<usize> {
        self.open
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn required(&self) -> u32 {
        self.settings.books_required
    }

    pub fn exit_unlocked(&self) -> bool {
        self.completed >= self.settings.books_required
    }

    pub fn completed_text(&self) -> String {
        format!(
            "{} / {} books completed",
            self.completed, self.settings.books_required
        )
    }

    /// Interaction volumes of every book that can still be used.
    pub fn colliders(&self) -> Vec<(usize, Aabb)> {
        self.books
            .iter()
            .enumerate()
            .filter_map(|(index, book)| book.collider().map(|aabb| (index, aabb)))
            .collect()
    }

    pub fn interact(&mut self, index: usize) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        let Some(request) = self.books.get_mut(index).map(|book| book.interact()) else {
            return events;
        };
        if request == BookRequest::Ignored {
            return events;
        }
        if let Some(other) = self.open.filter(|open| *open != index) {
            self.close(other, &mut events);
        }
        match request {
            BookRequest::Open => self.open(index, &mut events),
            BookRequest::Close => self.close(index, &mut events),
            BookRequest::Ignored => {}
        }
        events
    }

    /// Escape closes the open book, if any.
    pub fn escape(&mut self) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        if let Some(index) = self.open {
            self.close(index, &mut events);
        }
        events
    }

    /// Picks answer `choice` (1-based) on the open book's current page.
    pub fn answer(&mut self, choice: u8) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        let Some(index) = self.open else {
            return events;
        };
        let advance_secs = self.settings.answer_advance_secs;
        let book = &mut self.books[index];
        if book.locked {
            return events;
        }
        let Some(page) = book.spec.pages.get(book.page) else {
            return events;
        };
        if choice == 0 || choice as usize > page.answers.len() {
            return events;
        }

        let correct = choice == page.correct;
        let current = book.page;
        book.answered[current] = true;
        book.answered_correctly[current] = correct;
        book.locked = true;
        events.push(ShelfEvent::Answered {
            book: index,
            page: current,
            choice,
            correct,
        });

        if correct {
            book.advance_in = Some(advance_secs);
        } else {
            events.push(ShelfEvent::Sound {
                cue: SoundCue::BookFailed,
            });
            self.close(index, &mut events);
        }
        events
    }

    /// Starts the vanish sequence right away.
    pub fn vanish(&mut self, index: usize) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        self.start_vanish(index, &mut events);
        events
    }

    /// Runs page timers, vanish countdowns and animations, and the floaters.
    pub fn update(&mut self, dt: f32, time_secs: f32) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        for index in 0..self.books.len() {
            if let Some(remaining) = self.books[index].advance_in {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.books[index].advance_in = None;
                    self.next_page(index, &mut events);
                } else {
                    self.books[index].advance_in = Some(remaining);
                }
            }

            if let Some(remaining) = self.books[index].vanish_in {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.books[index].vanish_in = None;
                    self.start_vanish(index, &mut events);
                } else {
                    self.books[index].vanish_in = Some(remaining);
                }
            }

            let book = &mut self.books[index];
            if let VanishPhase::Animating { elapsed } = book.phase {
                let elapsed = elapsed + dt;
                let duration = book.spec.vanish.duration_secs;
                if duration <= 0.0 || elapsed >= duration {
                    book.apply_vanish_progress(1.0);
                    let destroyed = book.finish_vanish();
                    events.push(ShelfEvent::Vanished {
                        book: index,
                        destroyed,
                    });
                } else {
                    book.apply_vanish_progress(elapsed / duration);
                    book.phase = VanishPhase::Animating { elapsed };
                }
            }

            if book.active {
                book.floater.update(time_secs);
            }
        }
        events
    }

    fn open(&mut self, index: usize, events: &mut Vec<ShelfEvent>) {
        self.open = Some(index);
        let book = &mut self.books[index];
        book.open = true;
        book.page = 0;
        book.floater.set_enabled(false);
        events.push(ShelfEvent::Sound {
            cue: SoundCue::BookOpen,
        });
        events.push(ShelfEvent::Opened { book: index });
    }

    fn close(&mut self, index: usize, events: &mut Vec<ShelfEvent>) {
        let book = &mut self.books[index];
        book.reset_quiz();
        book.open = false;
        book.floater.set_enabled(true);
        if self.open == Some(index) {
            self.open = None;
        }
        events.push(ShelfEvent::Sound {
            cue: SoundCue::BookClose,
        });
        events.push(ShelfEvent::Closed { book: index });
    }

    fn next_page(&mut self, index: usize, events: &mut Vec<ShelfEvent>) {
        let book = &mut self.books[index];
        book.locked = false;
        if self.open != Some(index) {
            return;
        }
        if book.page + 1 < book.spec.pages.len() {
            book.page += 1;
            events.push(ShelfEvent::Sound {
                cue: SoundCue::PageFlipped,
            });
        } else {
            self.show_results(index, events);
        }
    }

    fn show_results(&mut self, index: usize, events: &mut Vec<ShelfEvent>) {
        let book = &mut self.books[index];
        let all_correct = book
            .answered
            .iter()
            .zip(&book.answered_correctly)
            .all(|(answered, correct)| *answered && *correct);
        if !all_correct || book.finished {
            return;
        }
        book.finished = true;
        if self.settings.vanish_after_completion {
            book.vanish_in =
                Some(self.settings.vanish_hold_secs + self.settings.vanish_start_delay_secs);
        }
        self.completed += 1;
        events.push(ShelfEvent::Sound {
            cue: SoundCue::BookComplete,
        });
        events.push(ShelfEvent::Completed {
            book: index,
            completed: self.completed,
        });
        if self.completed == self.settings.books_required {
            events.push(ShelfEvent::Sound {
                cue: SoundCue::ExitDoorOpen,
            });
            events.push(ShelfEvent::ExitUnlocked);
        }
    }

    fn start_vanish(&mut self, index: usize, events: &mut Vec<ShelfEvent>) {
        let Some(book) = self.books.get(index) else {
            return;
        };
        if book.vanished || book.phase != VanishPhase::Idle {
            return;
        }
        if book.open {
            self.close(index, events);
        }
        let book = &mut self.books[index];
        book.vanished = true;
        book.collider_enabled = false;
        book.vanish_in = None;
        events.push(ShelfEvent::Sound {
            cue: SoundCue::Vanish,
        });
        if effective_vanish(&book.spec.vanish) == VanishType::Instant {
            let destroyed = book.finish_vanish();
            events.push(ShelfEvent::Vanished {
                book: index,
                destroyed,
            });
        } else {
            book.phase = VanishPhase::Animating { elapsed: 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{BookPage, Level};

    const DT: f32 = 0.25;

    fn shelf() -> Bookshelf {
        Bookshelf::new(&Level::library().books, BookSettings::default())
    }

    fn small_shelf(kind: VanishType, supports_dissolve: bool) -> Bookshelf {
        let spec = BookSpec {
            id: "b".to_string(),
            title: "Little Book".to_string(),
            position: Vec3::ZERO,
            pages: vec![BookPage {
                text: "one".to_string(),
                answers: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                correct: 1,
            }],
            vanish: VanishSpec {
                kind,
                duration_secs: 1.0,
                destroy_after: false,
                supports_dissolve,
            },
        };
        let settings = BookSettings {
            books_required: 1,
            ..BookSettings::default()
        };
        Bookshelf::new(&[spec], settings)
    }

    fn run(shelf: &mut Bookshelf, ticks: usize) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(shelf.update(DT, 0.0));
        }
        events
    }

    fn solve(shelf: &mut Bookshelf, index: usize) -> Vec<ShelfEvent> {
        let mut events = shelf.interact(index);
        for _ in 0..shelf.books[index].page_count() {
            let choice = shelf.books[index].correct_choice();
            events.extend(shelf.answer(choice));
            events.extend(run(shelf, 2));
        }
        events
    }

    #[test]
    fn prompt_depends_on_open_and_vanished() {
        let mut shelf = shelf();
        assert_eq!(shelf.books[0].prompt(), "Read Atlas of the Night Sky");
        shelf.interact(0);
        assert_eq!(shelf.books[0].prompt(), "");
        shelf.escape();
        shelf.vanish(0);
        assert_eq!(shelf.books[0].prompt(), "");
        assert!(shelf.interact(0).is_empty());
    }

    #[test]
    fn opening_another_book_closes_the_first() {
        let mut shelf = shelf();
        shelf.interact(0);
        let events = shelf.interact(1);
        assert!(events.contains(&ShelfEvent::Closed { book: 0 }));
        assert!(events.contains(&ShelfEvent::Opened { book: 1 }));
        assert_eq!(shelf.open_book(), Some(1));
        assert!(!shelf.books[0].is_open());
    }

    #[test]
    fn interacting_with_open_book_closes_it() {
        let mut shelf = shelf();
        shelf.interact(2);
        let events = shelf.interact(2);
        assert!(events.contains(&ShelfEvent::Closed { book: 2 }));
        assert_eq!(shelf.open_book(), None);
    }

    #[test]
    fn correct_answer_advances_after_delay_and_locks_meanwhile() {
        let mut shelf = shelf();
        shelf.interact(0);
        let events = shelf.answer(2);
        assert!(events.contains(&ShelfEvent::Answered {
            book: 0,
            page: 0,
            choice: 2,
            correct: true,
        }));
        assert!(shelf.answer(1).is_empty());

        run(&mut shelf, 1);
        assert_eq!(shelf.books[0].page(), 0);
        let events = run(&mut shelf, 1);
        assert_eq!(shelf.books[0].page(), 1);
        assert!(events.contains(&ShelfEvent::Sound {
            cue: SoundCue::PageFlipped
        }));
        assert!(!shelf.books[0].is_locked());
    }

    #[test]
    fn wrong_answer_fails_and_closes() {
        let mut shelf = shelf();
        shelf.interact(0);
        let events = shelf.answer(1);
        assert!(events.contains(&ShelfEvent::Sound {
            cue: SoundCue::BookFailed
        }));
        assert!(events.contains(&ShelfEvent::Closed { book: 0 }));
        assert!(!shelf.books[0].is_open());
        assert_eq!(shelf.books[0].page(), 0);
        assert_eq!(shelf.completed(), 0);
    }

    #[test]
    fn answers_are_ignored_without_open_book_or_out_of_range() {
        let mut shelf = shelf();
        assert!(shelf.answer(1).is_empty());
        shelf.interact(0);
        assert!(shelf.answer(0).is_empty());
        assert!(shelf.answer(4).is_empty());
    }

    #[test]
    fn perfect_run_completes_book_once() {
        let mut shelf = shelf();
        let events = solve(&mut shelf, 0);
        assert!(events.contains(&ShelfEvent::Completed {
            book: 0,
            completed: 1
        }));
        assert!(shelf.books[0].is_finished());
        assert_eq!(shelf.completed_text(), "1 / 5 books completed");
        assert!(shelf.books[0].is_open());

        let again = shelf.answer(shelf.books[0].correct_choice());
        let mut later = again;
        later.extend(run(&mut shelf, 2));
        assert!(!later
            .iter()
            .any(|event| matches!(event, ShelfEvent::Completed { .. })));
        assert_eq!(shelf.completed(), 1);
    }

    #[test]
    fn fifth_completion_unlocks_exit() {
        let mut shelf = shelf();
        let mut events = Vec::new();
        for index in 0..5 {
            events.extend(solve(&mut shelf, index));
        }
        let unlocks = events
            .iter()
            .filter(|event| **event == ShelfEvent::ExitUnlocked)
            .count();
        assert_eq!(unlocks, 1);
        assert!(shelf.exit_unlocked());
        assert!(events.contains(&ShelfEvent::Sound {
            cue: SoundCue::ExitDoorOpen
        }));
    }

    #[test]
    fn completed_book_vanishes_after_hold_and_delay() {
        let mut shelf = small_shelf(VanishType::FadeOut, false);
        solve(&mut shelf, 0);
        assert!(!shelf.books[0].is_vanished());

        let events = run(&mut shelf, 8);
        assert!(events.contains(&ShelfEvent::Closed { book: 0 }));
        assert!(shelf.books[0].is_vanished());
        assert!(shelf.books[0].collider().is_none());
        assert!(shelf.books[0].is_active());

        let events = run(&mut shelf, 4);
        assert!(events.contains(&ShelfEvent::Vanished {
            book: 0,
            destroyed: false
        }));
        assert!(!shelf.books[0].is_active());
        assert_eq!(shelf.books[0].view().alpha, 0.0);
    }

    #[test]
    fn instant_vanish_finishes_immediately() {
        let mut shelf = small_shelf(VanishType::Instant, false);
        let events = shelf.vanish(0);
        assert!(events.contains(&ShelfEvent::Vanished {
            book: 0,
            destroyed: false
        }));
        assert!(!shelf.books[0].is_active());
        assert!(shelf.vanish(0).is_empty());
    }

    #[test]
    fn dissolve_without_support_fades_instead() {
        let mut shelf = small_shelf(VanishType::Dissolve, false);
        shelf.vanish(0);
        run(&mut shelf, 2);
        let view = shelf.books[0].view();
        assert_eq!(view.dissolve, 0.0);
        assert_eq!(view.alpha, 0.5);

        let mut supported = small_shelf(VanishType::Dissolve, true);
        supported.vanish(0);
        run(&mut supported, 2);
        let view = supported.books[0].view();
        assert_eq!(view.dissolve, 0.5);
        assert_eq!(view.alpha, 1.0);
    }

    #[test]
    fn scale_down_shrinks_collider_until_gone() {
        let mut shelf = small_shelf(VanishType::ScaleDown, false);
        shelf.vanish(0);
        run(&mut shelf, 1);
        assert_eq!(shelf.books[0].view().scale, 0.75);
        run(&mut shelf, 3);
        assert!(!shelf.books[0].is_active());
    }

    #[test]
    fn open_book_stops_floating() {
        let mut shelf = shelf();
        shelf.update(DT, 0.5);
        shelf.interact(0);
        let held = shelf.books[0].view().position;
        shelf.update(DT, 1.3);
        assert_eq!(shelf.books[0].view().position, held);
        shelf.escape();
        shelf.update(DT, 1.3);
        assert_ne!(shelf.books[0].view().position, held);
    }
}
