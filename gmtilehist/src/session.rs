//! Owns everything mutable: the selected room's cache, the reveal cursor,
//! the anomaly feed and the viewer configuration, mutated only from the
//! frame-driven caller. The archive itself stays immutable for the session.

use crate::{
    cursor::Cursor,
    detect::{self, DetectorConfig},
    events::{DecayPolicy, EventLog},
    rect::ResolvedRect,
    room::RoomCache,
};
use gmwad::GameData;
use log::debug;

/// Viewer behavior switches, one named field per recognized option.
#[derive(Clone, Copy, Debug)]
pub struct ViewerConfig {
    /// Clip tile source rects to their image bounds when handing entities to
    /// presentation. Detection always sees the unclipped declaration.
    pub clamp_tile_rects: bool,
    /// Honor the background blacklist when enumerating visible entities.
    pub follow_blacklist: bool,
    pub show_objects: bool,
    /// Entities revealed per second while animating.
    pub animation_speed: f32,
}

impl Default for ViewerConfig {
    fn default() -> ViewerConfig {
        ViewerConfig { clamp_tile_rects: true, follow_blacklist: true, show_objects: true, animation_speed: 10.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Tile,
    Object,
}

/// A revealed, renderable entity as handed to presentation code.
#[derive(Clone, Debug)]
pub struct VisibleEntity {
    /// Position in the concatenated tiles-then-objects sequence.
    pub index: usize,
    pub kind: EntityKind,
    pub rect: ResolvedRect,
}

pub struct Session {
    data: GameData,
    config: ViewerConfig,
    detector: DetectorConfig,
    blacklist: Vec<i32>,
    cache: RoomCache,
    cursor: Cursor,
    log: EventLog,
    animating: bool,
}

impl Session {
    /// Takes exclusive ownership of a loaded archive and selects its first
    /// room. A load failure never reaches this point, so a session always
    /// reflects exactly one successfully decoded archive.
    pub fn new(data: GameData) -> Session {
        let mut session = Session {
            data,
            config: ViewerConfig::default(),
            detector: DetectorConfig::default(),
            blacklist: Vec::new(),
            cache: RoomCache::empty(),
            cursor: Cursor::new(0),
            log: EventLog::default(),
            animating: false,
        };
        let first = session.data.room_order.first().copied().unwrap_or(0);
        if !session.select_room(first) {
            let fallback = (0..session.data.room_count() as i32).find(|&id| session.data.room(id).is_some());
            if let Some(id) = fallback {
                session.select_room(id);
            }
        }
        session
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn cache(&self) -> &RoomCache {
        &self.cache
    }

    pub fn current_room(&self) -> i32 {
        self.cache.room_id
    }

    pub fn config(&self) -> ViewerConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ViewerConfig) {
        self.config = config;
    }

    pub fn detector(&self) -> DetectorConfig {
        self.detector
    }

    pub fn set_detector(&mut self, detector: DetectorConfig) {
        self.detector = detector;
    }

    pub fn set_decay_policy(&mut self, policy: DecayPolicy) {
        self.log.set_policy(policy);
    }

    /// Switches rooms: the cache is cleared and repopulated wholesale, the
    /// anomaly feed is dropped (anomalies are room-scoped) and the cursor is
    /// re-clamped without firing. An unresolvable id leaves the prior state
    /// fully intact and returns false.
    pub fn select_room(&mut self, room_id: i32) -> bool {
        match RoomCache::rebuild(&self.data, room_id) {
            Some(cache) => {
                debug!("selected room {} ({} tiles, {} objects)", room_id, cache.tiles.len(), cache.objects.len());
                self.cursor.set_limit(cache.len());
                self.cache = cache;
                self.log.clear();
                true
            },
            None => false,
        }
    }

    pub fn cursor_position(&self) -> f32 {
        self.cursor.position()
    }

    pub fn revealed(&self) -> usize {
        self.cursor.revealed()
    }

    pub fn at_end(&self) -> bool {
        self.cursor.at_end()
    }

    /// Direct scrub. Fires the detector for the edge, if any.
    pub fn set_cursor(&mut self, position: f32) {
        if let Some(index) = self.cursor.jump(position) {
            detect::inspect(&self.cache, index, &self.detector, &mut self.log);
        }
    }

    /// Relative motion, clamped. Fires the detector for the edge, if any.
    pub fn advance_cursor(&mut self, delta: f32) {
        if let Some(index) = self.cursor.advance(delta) {
            detect::inspect(&self.cache, index, &self.detector, &mut self.log);
        }
    }

    pub fn start_animation(&mut self, restart: bool) {
        if restart {
            self.cursor.jump(0.0);
        }
        self.animating = true;
    }

    pub fn stop_animation(&mut self) {
        self.animating = false;
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Advances the reveal animation by one frame's worth of entities and
    /// stops it at the end of the sequence.
    pub fn step_animation(&mut self, dt: f64) {
        if !self.animating {
            return
        }
        self.advance_cursor(self.config.animation_speed * dt as f32);
        if self.cursor.at_end() {
            self.animating = false;
        }
    }

    /// Ages the anomaly feed.
    pub fn tick(&mut self, dt: f64) {
        self.log.tick(dt);
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn blacklist(&self) -> &[i32] {
        &self.blacklist
    }

    /// Adds a background to the blacklist by table id. Unknown ids and
    /// duplicates are rejected.
    pub fn blacklist_background(&mut self, id: i32) -> bool {
        if self.data.background(id).is_none() || self.blacklist.contains(&id) {
            return false
        }
        self.blacklist.push(id);
        true
    }

    /// Adds a background by asset name, the way the blacklist UI does.
    pub fn blacklist_background_by_name(&mut self, name: &str) -> bool {
        let found = self
            .data
            .backgrounds
            .iter()
            .position(|slot| slot.as_deref().map_or(false, |bg| bg.name == name));
        match found {
            Some(index) => self.blacklist_background(index as i32),
            None => false,
        }
    }

    pub fn unblacklist_background(&mut self, id: i32) {
        self.blacklist.retain(|&listed| listed != id);
    }

    /// The revealed prefix of the room as presentation-ready rectangles:
    /// blacklisted tiles and unresolvable slots are skipped, tile sources
    /// are clipped when configured, objects are withheld when hidden.
    pub fn visible_entities(&self) -> Vec<VisibleEntity> {
        let revealed = self.cursor.revealed();
        let mut out = Vec::new();

        for (index, slot) in self.cache.tiles.iter().take(revealed).enumerate() {
            if self.config.follow_blacklist && self.blacklist.contains(&slot.record.asset_id) {
                continue
            }
            let rect = match &slot.rect {
                Some(rect) => rect,
                None => continue,
            };
            let mut rect = rect.clone();
            if self.config.clamp_tile_rects {
                rect.source = rect.clamped_source();
            }
            out.push(VisibleEntity { index, kind: EntityKind::Tile, rect });
        }

        if self.config.show_objects {
            let shown = revealed.saturating_sub(self.cache.tiles.len());
            for (offset, slot) in self.cache.objects.iter().take(shown).enumerate() {
                let rect = match &slot.rect {
                    Some(rect) => rect.clone(),
                    None => continue,
                };
                out.push(VisibleEntity { index: self.cache.tiles.len() + offset, kind: EntityKind::Object, rect });
            }
        }

        out
    }
}
