//! Per-edge anomaly checks over the room cache. Every check compares exact
//! values on purpose: any non-default authoring is worth flagging, however
//! small.

use crate::{events::EventLog, room::RoomCache};
use serde::Serialize;
use std::fmt::{self, Display};

/// Which checks run. Named fields instead of a bitmask so a toggle can't
/// alias another flag.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    pub colour: bool,
    pub creation_code: bool,
    pub scaled_rect: bool,
    pub id_discrepancy: bool,
    pub uv_bleed: bool,
    pub rotation: bool,
}

impl Default for DetectorConfig {
    fn default() -> DetectorConfig {
        DetectorConfig {
            colour: true,
            creation_code: true,
            scaled_rect: true,
            id_discrepancy: true,
            uv_bleed: true,
            rotation: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyKind {
    Colour,
    CreationCode,
    ScaledRect,
    IdDiscrepancy,
    UvBleed,
    ObjectRotation,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AnomalyKind::Colour => "has colour",
            AnomalyKind::CreationCode => "has creation code",
            AnomalyKind::ScaledRect => "scaled rect",
            AnomalyKind::IdDiscrepancy => "ID discrepancy",
            AnomalyKind::UvBleed => "UV bleed",
            AnomalyKind::ObjectRotation => "object rotation",
        })
    }
}

/// Runs every enabled check against the entity at `index`, the last one
/// revealed by a cursor edge, appending a log event per firing check.
///
/// An edge whose entity (or whose predecessor) failed to resolve is skipped
/// wholesale: expected with malformed archives, not an error.
pub fn inspect(cache: &RoomCache, index: usize, config: &DetectorConfig, log: &mut EventLog) {
    let room = cache.room_id;
    let tile_count = cache.tiles.len();

    if index < tile_count {
        let current = &cache.tiles[index];
        let previous = if index > 0 { Some(&cache.tiles[index - 1]) } else { None };

        let rect = match &current.rect {
            Some(rect) => rect,
            None => return,
        };
        if previous.map_or(false, |slot| slot.rect.is_none()) {
            return
        }

        if config.colour && !rect.colour.is_opaque_white() {
            log.push(AnomalyKind::Colour, index, room);
        }
        if config.scaled_rect && rect.is_scaled() {
            log.push(AnomalyKind::ScaledRect, index, room);
        }
        if config.uv_bleed && rect.bleeds() {
            log.push(AnomalyKind::UvBleed, index, room);
        }
        if config.id_discrepancy {
            if let Some(previous) = previous {
                if i64::from(previous.record.id) != i64::from(current.record.id) - 1 {
                    log.push(AnomalyKind::IdDiscrepancy, index, room);
                }
            }
        }
    } else {
        let object_index = index - tile_count;
        let current = match cache.objects.get(object_index) {
            Some(slot) => slot,
            None => return,
        };
        // The first object's predecessor would be the last tile; the ranges
        // never share an ID sequence, so it has none.
        let previous = if object_index > 0 { Some(&cache.objects[object_index - 1]) } else { None };

        let rect = match &current.rect {
            Some(rect) => rect,
            None => return,
        };
        if previous.map_or(false, |slot| slot.rect.is_none()) {
            return
        }

        if config.colour && !rect.colour.is_opaque_white() {
            log.push(AnomalyKind::Colour, index, room);
        }
        if config.scaled_rect && rect.is_scaled() {
            log.push(AnomalyKind::ScaledRect, index, room);
        }
        if config.uv_bleed && rect.bleeds() {
            log.push(AnomalyKind::UvBleed, index, room);
        }
        if config.rotation && rect.is_rotated() {
            log.push(AnomalyKind::ObjectRotation, index, room);
        }
        if config.creation_code && (current.record.pre_create_code_id > 0 || current.record.creation_code_id > 0) {
            log.push(AnomalyKind::CreationCode, index, room);
        }
        if config.id_discrepancy {
            if let Some(previous) = previous {
                if i64::from(previous.record.id) != i64::from(current.record.id) - 1 {
                    log.push(AnomalyKind::IdDiscrepancy, index, room);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rect::{Colour, ResolvedRect, SourceRect, TextureRef},
        room::EntitySlot,
    };
    use gmwad::{Instance, Tile};

    fn plain_rect() -> ResolvedRect {
        ResolvedRect {
            texture: TextureRef::Page(0),
            x: 0.0,
            y: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            pivot_x: 0.0,
            pivot_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            colour: Colour::WHITE,
            depth: 0,
            source: SourceRect { x: 0, y: 0, width: 16, height: 16 },
            local_source_x: 0,
            local_source_y: 0,
            bound_width: 16,
            bound_height: 16,
        }
    }

    fn tile_slot(id: u32) -> EntitySlot<Tile> {
        EntitySlot { record: Tile { id, ..Default::default() }, rect: Some(plain_rect()) }
    }

    fn object_slot(id: u32) -> EntitySlot<Instance> {
        EntitySlot { record: Instance { id, ..Default::default() }, rect: Some(plain_rect()) }
    }

    fn cache_of(tiles: Vec<EntitySlot<Tile>>, objects: Vec<EntitySlot<Instance>>) -> RoomCache {
        RoomCache { room_id: 0, tiles, objects }
    }

    fn kinds(log: &EventLog) -> Vec<(AnomalyKind, usize)> {
        log.iter().map(|event| (event.kind, event.index)).collect()
    }

    #[test]
    fn id_gap_fires_exactly_once_at_the_gap() {
        let cache = cache_of(vec![tile_slot(10), tile_slot(11), tile_slot(13), tile_slot(14)], Vec::new());
        let config = DetectorConfig::default();
        let mut log = EventLog::default();

        for index in 0..4 {
            inspect(&cache, index, &config, &mut log);
        }
        assert_eq!(kinds(&log), vec![(AnomalyKind::IdDiscrepancy, 2)]);
    }

    #[test]
    fn white_tint_is_silent_and_anything_else_fires() {
        let mut tinted = tile_slot(1);
        tinted.rect.as_mut().unwrap().colour = Colour { r: 255, g: 255, b: 255, a: 254 };
        let cache = cache_of(vec![tile_slot(0), tinted], Vec::new());
        let mut log = EventLog::default();

        inspect(&cache, 0, &DetectorConfig::default(), &mut log);
        assert!(log.is_empty());
        inspect(&cache, 1, &DetectorConfig::default(), &mut log);
        assert_eq!(kinds(&log), vec![(AnomalyKind::Colour, 1)]);
    }

    #[test]
    fn rotation_check_is_exact_and_object_only() {
        let mut barely = object_slot(100);
        barely.rect.as_mut().unwrap().rotation = 0.0001;
        let cache = cache_of(Vec::new(), vec![object_slot(99), barely]);
        let mut log = EventLog::default();

        inspect(&cache, 0, &DetectorConfig::default(), &mut log);
        assert!(log.is_empty());
        inspect(&cache, 1, &DetectorConfig::default(), &mut log);
        assert_eq!(kinds(&log), vec![(AnomalyKind::ObjectRotation, 1)]);
    }

    #[test]
    fn creation_code_fires_on_either_entry() {
        let mut with_pre = object_slot(0);
        with_pre.record.pre_create_code_id = 5;
        let mut with_cc = object_slot(1);
        with_cc.record.creation_code_id = 3;
        let mut with_neither = object_slot(2);
        with_neither.record.creation_code_id = -1;
        with_neither.record.pre_create_code_id = 0;

        let cache = cache_of(Vec::new(), vec![with_pre, with_cc, with_neither]);
        let mut log = EventLog::default();
        for index in 0..3 {
            inspect(&cache, index, &DetectorConfig::default(), &mut log);
        }
        assert_eq!(kinds(&log), vec![(AnomalyKind::CreationCode, 0), (AnomalyKind::CreationCode, 1)]);
    }

    #[test]
    fn crossing_into_objects_breaks_the_id_chain() {
        // tile 5 then instance 900: wildly different, but no shared sequence
        let cache = cache_of(vec![tile_slot(5)], vec![object_slot(900), object_slot(902)]);
        let mut log = EventLog::default();
        for index in 0..3 {
            inspect(&cache, index, &DetectorConfig::default(), &mut log);
        }
        // only the 900 -> 902 gap inside the object range fires
        assert_eq!(kinds(&log), vec![(AnomalyKind::IdDiscrepancy, 2)]);
    }

    #[test]
    fn unresolved_slots_silence_the_whole_edge() {
        let mut broken = tile_slot(50);
        broken.rect = None;
        let cache = cache_of(vec![tile_slot(10), broken, tile_slot(99)], Vec::new());
        let mut log = EventLog::default();

        inspect(&cache, 1, &DetectorConfig::default(), &mut log); // current unresolved
        inspect(&cache, 2, &DetectorConfig::default(), &mut log); // predecessor unresolved
        assert!(log.is_empty());
    }

    #[test]
    fn several_kinds_can_fire_on_one_edge() {
        let mut slot = object_slot(10);
        {
            let rect = slot.rect.as_mut().unwrap();
            rect.colour = Colour { r: 128, g: 255, b: 255, a: 255 };
            rect.scale_x = 2.0;
            rect.rotation = -45.0;
        }
        let cache = cache_of(Vec::new(), vec![slot]);
        let mut log = EventLog::default();
        inspect(&cache, 0, &DetectorConfig::default(), &mut log);

        let fired = kinds(&log);
        assert_eq!(fired.len(), 3);
        assert!(fired.contains(&(AnomalyKind::Colour, 0)));
        assert!(fired.contains(&(AnomalyKind::ScaledRect, 0)));
        assert!(fired.contains(&(AnomalyKind::ObjectRotation, 0)));
    }

    #[test]
    fn disabled_checks_stay_silent() {
        let mut slot = tile_slot(0);
        slot.rect.as_mut().unwrap().scale_x = 3.0;
        let cache = cache_of(vec![slot], Vec::new());

        let config = DetectorConfig { scaled_rect: false, ..DetectorConfig::default() };
        let mut log = EventLog::default();
        inspect(&cache, 0, &config, &mut log);
        assert!(log.is_empty());
    }

    #[test]
    fn bleeding_rect_fires_uv_bleed() {
        let mut slot = tile_slot(0);
        {
            let rect = slot.rect.as_mut().unwrap();
            rect.local_source_x = 4;
            rect.source.width = 30;
            rect.bound_width = 32;
        }
        let cache = cache_of(vec![slot], Vec::new());
        let mut log = EventLog::default();
        inspect(&cache, 0, &DetectorConfig::default(), &mut log);
        assert_eq!(kinds(&log), vec![(AnomalyKind::UvBleed, 0)]);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let cache = cache_of(vec![tile_slot(0)], Vec::new());
        let mut log = EventLog::default();
        inspect(&cache, 9, &DetectorConfig::default(), &mut log);
        assert!(log.is_empty());
    }
}
