//! Model of a GameMaker data archive ("wad"): typed chunk tables with stable
//! integer IDs, plus a reader that decodes the binary container into them.

pub mod asset;
pub mod reader;

pub use asset::{Background, CodeEntry, Instance, Layer, LayerKind, Object, Room, Sprite, TexturePage, TextureRegion, Tile};
pub use reader::ReaderError;

/// An ordered chunk table. `None` marks a deleted record; indices are stable
/// for the session.
pub type AssetList<T> = Vec<Option<Box<T>>>;

/// Runner version the archive was built for, from the GEN8 chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
    pub build: u32,
}

#[derive(Clone, Default)]
pub struct GameData {
    pub version: FormatVersion,
    pub bytecode_format: u8,
    pub game_id: u32,
    pub guid: [u8; 16],
    pub name: String,
    pub display_name: String,
    pub last_object_id: i32,
    pub last_tile_id: i32,
    pub room_order: Vec<i32>,

    pub texture_pages: AssetList<TexturePage>,
    pub regions: AssetList<TextureRegion>,
    pub backgrounds: AssetList<Background>,
    pub sprites: AssetList<Sprite>,
    pub objects: AssetList<Object>,
    pub rooms: AssetList<Room>,
    pub code: AssetList<CodeEntry>,
}

impl GameData {
    /// Schema gate between the legacy flat-tile-list representation and the
    /// layered one.
    pub fn is_version_at_least(&self, major: u32) -> bool {
        self.version.major >= major
    }

    fn fetch<T>(list: &AssetList<T>, id: i32) -> Option<&T> {
        if id < 0 {
            return None
        }
        list.get(id as usize).and_then(|slot| slot.as_deref())
    }

    pub fn texture_page(&self, id: i32) -> Option<&TexturePage> {
        Self::fetch(&self.texture_pages, id)
    }

    pub fn region(&self, id: i32) -> Option<&TextureRegion> {
        Self::fetch(&self.regions, id)
    }

    pub fn background(&self, id: i32) -> Option<&Background> {
        Self::fetch(&self.backgrounds, id)
    }

    pub fn sprite(&self, id: i32) -> Option<&Sprite> {
        Self::fetch(&self.sprites, id)
    }

    pub fn object(&self, id: i32) -> Option<&Object> {
        Self::fetch(&self.objects, id)
    }

    pub fn room(&self, id: i32) -> Option<&Room> {
        Self::fetch(&self.rooms, id)
    }

    pub fn code_name(&self, id: i32) -> Option<&str> {
        Self::fetch(&self.code, id).map(|c| c.name.as_str())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
