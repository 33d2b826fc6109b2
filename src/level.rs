use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::constants::{DOOR_OPEN_ANGLE_DEG, DOOR_OPEN_SPEED, VANISH_DURATION_SECS};
use crate::perception::Occluder;
use crate::types::VanishType;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn around(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Does a vertical cylinder standing at `feet` overlap this box?
    pub fn overlaps_body(&self, feet: Vec3, radius: f32, height: f32) -> bool {
        if feet.y >= self.max.y || feet.y + height <= self.min.y {
            return false;
        }
        let closest_x = feet.x.clamp(self.min.x, self.max.x);
        let closest_z = feet.z.clamp(self.min.z, self.max.z);
        let dx = feet.x - closest_x;
        let dz = feet.z - closest_z;
        dx * dx + dz * dz < radius * radius
    }

    /// Slab test. `dir` must be normalised; returns the entry distance.
    pub fn ray_distance(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < 1e-8 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookPage {
    pub text: String,
    pub answers: Vec<String>,
    /// 1-based index into `answers`.
    pub correct: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VanishSpec {
    #[serde(default)]
    pub kind: VanishType,
    #[serde(default = "default_vanish_duration")]
    pub duration_secs: f32,
    #[serde(default)]
    pub destroy_after: bool,
    #[serde(default)]
    pub supports_dissolve: bool,
}

fn default_vanish_duration() -> f32 {
    VANISH_DURATION_SECS
}

impl Default for VanishSpec {
    fn default() -> Self {
        Self {
            kind: VanishType::FadeOut,
            duration_secs: VANISH_DURATION_SECS,
            destroy_after: false,
            supports_dissolve: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookSpec {
    pub id: String,
    pub title: String,
    pub position: Vec3,
    pub pages: Vec<BookPage>,
    #[serde(default)]
    pub vanish: VanishSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorSpec {
    pub id: String,
    pub bounds: Aabb,
    #[serde(default = "default_door_angle")]
    pub open_angle_deg: f32,
    #[serde(default = "default_door_speed")]
    pub open_speed: f32,
    #[serde(default)]
    pub start_open: bool,
}

fn default_door_angle() -> f32 {
    DOOR_OPEN_ANGLE_DEG
}

fn default_door_speed() -> f32 {
    DOOR_OPEN_SPEED
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnemySpec {
    pub id: String,
    pub spawn: Vec3,
    pub forward: Vec3,
    /// `None` entries are unassigned waypoints and are skipped.
    pub patrol: Vec<Option<Vec3>>,
    pub respawn: Vec3,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub name: String,
    pub floor_y: f32,
    pub player_spawn: Vec3,
    pub player_yaw_deg: f32,
    pub obstacles: Vec<Aabb>,
    pub books: Vec<BookSpec>,
    pub doors: Vec<DoorSpec>,
    pub enemies: Vec<EnemySpec>,
    pub exit: Aabb,
}

impl Level {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let level: Level = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        level.validate()?;
        Ok(level)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for book in &self.books {
            if book.pages.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "books.pages",
                    reason: format!("book `{}` has no pages", book.id),
                });
            }
            for (index, page) in book.pages.iter().enumerate() {
                if page.correct == 0 || page.correct as usize > page.answers.len() {
                    return Err(ConfigError::Invalid {
                        field: "books.pages.correct",
                        reason: format!(
                            "book `{}` page {} points at answer {} of {}",
                            book.id,
                            index + 1,
                            page.correct,
                            page.answers.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn raycast_obstacles(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        self.obstacles
            .iter()
            .filter_map(|aabb| aabb.ray_distance(origin, dir, max_distance))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn is_blocked(&self, feet: Vec3, radius: f32, height: f32) -> bool {
        self.obstacles
            .iter()
            .any(|aabb| aabb.overlaps_body(feet, radius, height))
    }

    /// Built-in night library: two shelf rows, five books, one storage door.
    pub fn library() -> Self {
        let shelf = |x0: f32, z0: f32, x1: f32, z1: f32| {
            Aabb::new(Vec3::new(x0, 0.0, z0), Vec3::new(x1, 3.0, z1))
        };
        let obstacles = vec![
            // outer walls
            shelf(-31.0, 39.0, 31.0, 40.0),
            shelf(-31.0, 130.0, -2.0, 131.0),
            shelf(2.0, 130.0, 31.0, 131.0),
            shelf(-31.0, 40.0, -30.0, 130.0),
            shelf(30.0, 40.0, 31.0, 130.0),
            // shelf rows
            shelf(-22.0, 62.0, -6.0, 64.0),
            shelf(6.0, 62.0, 22.0, 64.0),
            shelf(-22.0, 84.0, -6.0, 86.0),
            shelf(6.0, 84.0, 22.0, 86.0),
            shelf(-22.0, 104.0, -6.0, 106.0),
            shelf(6.0, 104.0, 22.0, 106.0),
        ];

        let books = vec![
            BookSpec {
                id: "book_astronomy".to_string(),
                title: "Atlas of the Night Sky".to_string(),
                position: Vec3::new(-14.0, 1.2, 61.5),
                pages: vec![
                    page(
                        "The sun is a star, one of billions in our galaxy.",
                        ["A planet", "A star", "A moon"],
                        2,
                    ),
                    page(
                        "Mars appears red because of iron oxide dust on its surface.",
                        ["Iron oxide", "Lava", "Red ice"],
                        1,
                    ),
                    page(
                        "The Milky Way is a barred spiral galaxy.",
                        ["Elliptical", "Irregular", "Spiral"],
                        3,
                    ),
                ],
                vanish: VanishSpec::default(),
            },
            BookSpec {
                id: "book_botany".to_string(),
                title: "Secrets of Green Things".to_string(),
                position: Vec3::new(14.0, 1.2, 64.5),
                pages: vec![
                    page(
                        "Plants turn sunlight into sugar through photosynthesis.",
                        ["Respiration", "Photosynthesis", "Fermentation"],
                        2,
                    ),
                    page(
                        "Chlorophyll is the pigment that makes leaves green.",
                        ["Chlorophyll", "Melanin", "Keratin"],
                        1,
                    ),
                    page(
                        "Roots take up water and minerals from the soil.",
                        ["Leaves", "Flowers", "Roots"],
                        3,
                    ),
                ],
                vanish: VanishSpec {
                    kind: VanishType::ScaleDown,
                    ..VanishSpec::default()
                },
            },
            BookSpec {
                id: "book_history".to_string(),
                title: "Chronicle of Lost Cities".to_string(),
                position: Vec3::new(-14.0, 1.2, 86.5),
                pages: vec![
                    page(
                        "Pompeii was buried by the eruption of Mount Vesuvius.",
                        ["Etna", "Vesuvius", "Stromboli"],
                        2,
                    ),
                    page(
                        "Machu Picchu was built by the Inca.",
                        ["The Inca", "The Maya", "The Aztecs"],
                        1,
                    ),
                    page(
                        "Troy was long thought to be only a legend.",
                        ["Rome", "Athens", "Troy"],
                        3,
                    ),
                ],
                vanish: VanishSpec {
                    kind: VanishType::FadeAndScale,
                    ..VanishSpec::default()
                },
            },
            BookSpec {
                id: "book_oceans".to_string(),
                title: "Beneath the Waves".to_string(),
                position: Vec3::new(14.0, 1.2, 103.5),
                pages: vec![
                    page(
                        "The Pacific is the largest ocean on Earth.",
                        ["Atlantic", "Indian", "Pacific"],
                        3,
                    ),
                    page(
                        "Octopuses have three hearts.",
                        ["One", "Three", "Eight"],
                        2,
                    ),
                    page(
                        "The Mariana Trench is the deepest known point of the ocean.",
                        ["Mariana Trench", "Java Trench", "Puerto Rico Trench"],
                        1,
                    ),
                ],
                vanish: VanishSpec {
                    kind: VanishType::Dissolve,
                    supports_dissolve: true,
                    ..VanishSpec::default()
                },
            },
            BookSpec {
                id: "book_machines".to_string(),
                title: "Gears and Engines".to_string(),
                position: Vec3::new(-14.0, 1.2, 106.5),
                pages: vec![
                    page(
                        "A lever multiplies force around a fixed pivot called a fulcrum.",
                        ["Fulcrum", "Axle", "Piston"],
                        1,
                    ),
                    page(
                        "Steam engines convert heat into motion.",
                        ["Light", "Heat", "Sound"],
                        2,
                    ),
                    page(
                        "A pulley changes the direction of a pulling force.",
                        ["Spring", "Wedge", "Pulley"],
                        3,
                    ),
                ],
                vanish: VanishSpec {
                    kind: VanishType::Instant,
                    destroy_after: true,
                    ..VanishSpec::default()
                },
            },
        ];

        let doors = vec![DoorSpec {
            id: "door_storage".to_string(),
            bounds: Aabb::new(Vec3::new(29.5, 0.0, 70.0), Vec3::new(30.0, 2.5, 72.0)),
            open_angle_deg: DOOR_OPEN_ANGLE_DEG,
            open_speed: DOOR_OPEN_SPEED,
            start_open: false,
        }];

        let enemies = vec![EnemySpec {
            id: "librarian".to_string(),
            spawn: Vec3::new(-15.97, 0.0, 115.54),
            forward: Vec3::NEG_Z,
            patrol: vec![
                Some(Vec3::new(-25.0, 0.0, 115.0)),
                Some(Vec3::new(-25.0, 0.0, 74.0)),
                None,
                Some(Vec3::new(0.0, 0.0, 74.0)),
                Some(Vec3::new(25.0, 0.0, 74.0)),
                Some(Vec3::new(25.0, 0.0, 115.0)),
                Some(Vec3::new(0.0, 0.0, 115.0)),
            ],
            respawn: Vec3::new(-15.97, 0.0, 115.54),
        }];

        Self {
            name: "night-library".to_string(),
            floor_y: 0.0,
            player_spawn: Vec3::new(8.93, 0.0, 53.41),
            player_yaw_deg: 0.0,
            obstacles,
            books,
            doors,
            enemies,
            exit: Aabb::new(Vec3::new(-2.0, 0.0, 128.0), Vec3::new(2.0, 3.0, 131.0)),
        }
    }
}

impl Occluder for Level {
    fn first_hit(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        self.raycast_obstacles(from, delta / length, length)
    }
}

fn page(text: &str, answers: [&str; 3], correct: u8) -> BookPage {
    BookPage {
        text: text.to_string(),
        answers: answers.iter().map(|a| a.to_string()).collect(),
        correct,
    }
}
