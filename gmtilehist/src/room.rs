//! Materialized per-room entity cache: the ordered tile and instance
//! sequences with their resolved rectangles, rebuilt wholesale on every room
//! change.

use crate::rect::{self, ResolvedRect};
use gmwad::{GameData, Instance, Layer, Room, Tile};
use log::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct EntitySlot<T> {
    pub record: T,
    /// `None` when the record's references don't resolve; downstream
    /// consumers treat such a slot as unrenderable and skip it.
    pub rect: Option<ResolvedRect>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoomCache {
    pub room_id: i32,
    pub tiles: Vec<EntitySlot<Tile>>,
    pub objects: Vec<EntitySlot<Instance>>,
}

/// Where a room's tile sequence lives. Picked once per rebuild so no schema
/// checks leak into resolution.
enum TileSource<'a> {
    Legacy(&'a [Tile]),
    Layered(&'a [Layer]),
}

impl<'a> TileSource<'a> {
    fn select(data: &GameData, room: &'a Room) -> TileSource<'a> {
        if data.is_version_at_least(2) { TileSource::Layered(&room.layers) } else { TileSource::Legacy(&room.tiles) }
    }

    /// Normalizes into a single ordered sequence. Layered rooms merge every
    /// asset layer's tiles with the last-declared layer's tiles first, which
    /// recovers the insertion order the flat legacy list had.
    fn collect(self) -> Vec<Tile> {
        match self {
            TileSource::Legacy(tiles) => tiles.to_vec(),
            TileSource::Layered(layers) => {
                layers.iter().rev().filter_map(|layer| layer.kind.tiles()).flatten().copied().collect()
            },
        }
    }
}

impl RoomCache {
    /// The cache before any room is selected.
    pub fn empty() -> RoomCache {
        RoomCache { room_id: -1, tiles: Vec::new(), objects: Vec::new() }
    }

    /// Clears and repopulates for `room_id`. Returns `None` when the id
    /// doesn't resolve. A resolution failure on one entity never affects the
    /// others, and the rebuild always runs to completion.
    pub fn rebuild(data: &GameData, room_id: i32) -> Option<RoomCache> {
        let room = data.room(room_id)?;

        let tiles: Vec<EntitySlot<Tile>> = TileSource::select(data, room)
            .collect()
            .into_iter()
            .map(|tile| EntitySlot { rect: rect::resolve_tile(data, &tile), record: tile })
            .collect();

        let objects: Vec<EntitySlot<Instance>> = room
            .instances
            .iter()
            .map(|&instance| EntitySlot { rect: rect::resolve_instance(data, &instance), record: instance })
            .collect();

        let unresolved =
            tiles.iter().filter(|slot| slot.rect.is_none()).count() + objects.iter().filter(|slot| slot.rect.is_none()).count();
        if unresolved > 0 {
            debug!("room {}: {} entities did not resolve", room_id, unresolved);
        }
        debug!("room {} cache rebuilt: {} tiles, {} objects", room_id, tiles.len(), objects.len());

        Some(RoomCache { room_id, tiles, objects })
    }

    /// Entity count of the concatenated tiles-then-objects sequence.
    pub fn len(&self) -> usize {
        self.tiles.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.objects.is_empty()
    }
}
