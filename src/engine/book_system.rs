use super::*;

use crate::book::ShelfEvent;
use crate::interaction::{cast_interaction_ray, FocusChange, Interactable};

impl GameSession {
    /// Casts the interaction ray, moves focus, and applies this tick's
    /// interact / escape / answer presses.
    pub(super) fn update_interaction(&mut self, input: &PlayerInput) {
        if !self.run_started {
            return;
        }
        let eye = self.camera_position();
        let direction = self.look.forward();
        let obstacle_hit =
            self.level
                .raycast_obstacles(eye, direction, self.settings.interaction.range);
        let candidates = self
            .shelf
            .colliders()
            .into_iter()
            .map(|(index, bounds)| (Target::Book(index), bounds))
            .chain(
                self.doors
                    .iter()
                    .enumerate()
                    .map(|(index, door)| (Target::Door(index), door.bounds)),
            );
        let hit = cast_interaction_ray(
            eye,
            direction,
            &self.settings.interaction,
            obstacle_hit,
            candidates,
        );

        let shelf = &self.shelf;
        let doors = &self.doors;
        let changes = self.interaction.update(hit, |target| match target {
            Target::Book(index) => shelf.book(index).map(|book| book.prompt()).unwrap_or_default(),
            Target::Door(index) => doors.get(index).map(|door| door.prompt()).unwrap_or_default(),
        });
        for change in changes {
            match change {
                FocusChange::Gained(target) => self.set_focus(target, true),
                FocusChange::Lost(target) => self.set_focus(target, false),
            }
        }

        if input.interact {
            if let Some(target) = self.interaction.focus() {
                self.interact_with(target);
            }
        }
        if input.escape {
            let events = self.shelf.escape();
            self.apply_shelf_events(events);
        }
        if let Some(choice) = input.answer {
            let events = self.shelf.answer(choice);
            self.apply_shelf_events(events);
        }
    }

    fn set_focus(&mut self, target: Target, focused: bool) {
        match target {
            Target::Book(index) => {
                if let Some(book) = self.shelf.book_mut(index) {
                    apply_focus(book, focused);
                }
            }
            Target::Door(index) => {
                if let Some(door) = self.doors.get_mut(index) {
                    apply_focus(door, focused);
                }
            }
        }
    }

    fn interact_with(&mut self, target: Target) {
        match target {
            Target::Book(index) => {
                let events = self.shelf.interact(index);
                self.apply_shelf_events(events);
            }
            Target::Door(index) => {
                let Some(door) = self.doors.get_mut(index) else {
                    return;
                };
                if !door.can_interact() {
                    return;
                }
                let open = door.interact();
                let door_id = door.id.clone();
                self.events.push(RuntimeEvent::DoorToggled { door_id, open });
            }
        }
    }

    pub(super) fn update_books_and_doors(&mut self, dt: f32) {
        let events = self.shelf.update(dt, self.clock_secs());
        self.apply_shelf_events(events);
        for door in &mut self.doors {
            door.update(dt);
        }
    }

    pub(super) fn apply_shelf_events(&mut self, events: Vec<ShelfEvent>) {
        for event in events {
            let runtime = match event {
                ShelfEvent::Opened { book } => RuntimeEvent::BookOpened {
                    book_id: self.book_id(book),
                },
                ShelfEvent::Closed { book } => {
                    self.interaction.force_refresh();
                    RuntimeEvent::BookClosed {
                        book_id: self.book_id(book),
                    }
                }
                ShelfEvent::Sound { cue } => RuntimeEvent::Sound {
                    cue,
                    mode: SoundMode::OneShot,
                    source: SoundSource::Book,
                },
                ShelfEvent::Answered {
                    book,
                    page,
                    choice,
                    correct,
                } => {
                    self.stats.answers_given += 1;
                    if correct {
                        self.stats.answers_correct += 1;
                    }
                    RuntimeEvent::AnswerGiven {
                        book_id: self.book_id(book),
                        page,
                        choice,
                        correct,
                    }
                }
                ShelfEvent::Completed { book, completed } => RuntimeEvent::BookCompleted {
                    book_id: self.book_id(book),
                    completed,
                },
                ShelfEvent::ExitUnlocked => RuntimeEvent::ExitUnlocked,
                ShelfEvent::Vanished { book, destroyed } => RuntimeEvent::BookVanished {
                    book_id: self.book_id(book),
                    destroyed,
                },
            };
            self.events.push(runtime);
        }
    }

    fn book_id(&self, index: usize) -> String {
        self.shelf
            .book(index)
            .map(|book| book.id().to_string())
            .unwrap_or_default()
    }
}

fn apply_focus(target: &mut impl Interactable, focused: bool) {
    if focused {
        target.on_focus();
    } else {
        target.on_lose_focus();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::config::GameSettings;
    use crate::constants::TICK_MS;
    use crate::engine::{GameSession, GameSessionOptions, Target};
    use crate::types::{PlayerInput, RuntimeEvent};

    fn session_facing_first_book() -> GameSession {
        let mut settings = GameSettings::default();
        settings.session.skip_start_screen = true;
        let mut session = GameSession::new(
            settings,
            crate::level::Level::library(),
            GameSessionOptions::default(),
        );
        let book = session.shelf.book(0).map_or(Vec3::ZERO, |book| book.position());
        // Stand 1.5 m in front of the book and look straight at it.
        session
            .player
            .set_position(Vec3::new(book.x, 0.0, book.z - 1.5));
        let eye = session.camera_position();
        let pitch = (eye.y - book.y).atan2(1.5).to_degrees();
        session.look = crate::look::MouseLook::new(session.settings.look.clone(), 0.0);
        session.look.set_enabled(true);
        for _ in 0..40 {
            let error = pitch - session.look.pitch_deg();
            session.look.update(0.0, -error * 0.25);
        }
        session
    }

    #[test]
    fn looking_at_a_book_shows_its_prompt() {
        let mut session = session_facing_first_book();
        session.step(TICK_MS, &PlayerInput::default());
        assert_eq!(session.interaction.focus(), Some(Target::Book(0)));
        assert_eq!(
            session.interaction.prompt(),
            Some("Read Atlas of the Night Sky")
        );
        assert!(session.shelf.book(0).is_some_and(|book| book.is_focused()));
    }

    #[test]
    fn interact_opens_the_focused_book_and_answers_advance() {
        let mut session = session_facing_first_book();
        session.step(TICK_MS, &PlayerInput::default());
        session.step(
            TICK_MS,
            &PlayerInput {
                interact: true,
                ..PlayerInput::default()
            },
        );
        assert_eq!(session.shelf.open_book(), Some(0));

        let correct = session.shelf.book(0).map_or(0, |book| book.correct_choice());
        session.step(
            TICK_MS,
            &PlayerInput {
                answer: Some(correct),
                ..PlayerInput::default()
            },
        );
        for _ in 0..20 {
            session.step(TICK_MS, &PlayerInput::default());
        }
        assert_eq!(session.shelf.book(0).map(|book| book.page()), Some(1));
        let events = session.build_snapshot(true).events;
        assert!(events.iter().any(|event| matches!(
            event,
            RuntimeEvent::AnswerGiven { correct: true, .. }
        )));
    }

    #[test]
    fn closing_a_book_schedules_a_focus_refresh() {
        let mut session = session_facing_first_book();
        session.step(TICK_MS, &PlayerInput::default());
        let events = session.shelf.interact(0);
        session.apply_shelf_events(events);
        let events = session.shelf.escape();
        session.apply_shelf_events(events);
        let snapshot = session.build_snapshot(true);
        assert!(snapshot
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::BookClosed { .. })));

        session.step(TICK_MS, &PlayerInput::default());
        session.step(TICK_MS, &PlayerInput::default());
        // The ray still hits the book, so focus comes straight back.
        assert_eq!(session.interaction.focus(), Some(Target::Book(0)));
    }
}
