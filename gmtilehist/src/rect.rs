//! Resolves raw tile and instance records into normalized draw-space
//! rectangles, pure over the archive's immutable asset tables.

use gmwad::{GameData, Instance, TextureRegion, Tile};

/// Unpacked tint. The archive packs these with red in the least significant
/// byte and alpha in the most.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    pub const WHITE: Colour = Colour { r: 255, g: 255, b: 255, a: 255 };

    pub fn from_abgr(colour: u32) -> Colour {
        Colour {
            r: (colour & 0xFF) as u8,
            g: ((colour >> 8) & 0xFF) as u8,
            b: ((colour >> 16) & 0xFF) as u8,
            a: ((colour >> 24) & 0xFF) as u8,
        }
    }

    /// Exact comparison, alpha included. Any authored tint at all counts as
    /// non-white.
    pub fn is_opaque_white(self) -> bool {
        self == Colour::WHITE
    }
}

/// What a rectangle draws from: a texture page by table id, or the built-in
/// "missing" marker for entities with nothing to show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRef {
    Page(i32),
    Missing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Side length of the marker rectangle substituted for entities with no
/// resolvable image.
pub const PLACEHOLDER_SIZE: i32 = 16;

/// Normalized draw-space geometry for one entity.
///
/// `source` is the declared sub-rectangle in texture-page space, kept
/// unclamped so an out-of-bounds declaration stays observable;
/// `clamped_source` is what rendering should sample. `rotation` is in
/// degrees, counter-clockwise positive (records store clockwise-positive, so
/// resolution negates).
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRect {
    pub texture: TextureRef,
    pub x: f32,
    pub y: f32,
    /// Inset of the trimmed graphic from the entity position, from the
    /// region's packing offset. Legitimate transparency trimming shows up
    /// here, not as a bleed.
    pub offset_x: f32,
    pub offset_y: f32,
    pub pivot_x: f32,
    pub pivot_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub colour: Colour,
    pub depth: i32,
    pub source: SourceRect,
    /// The tile's own source offset within the packed image; zero for
    /// instances.
    pub local_source_x: i32,
    pub local_source_y: i32,
    pub bound_width: i32,
    pub bound_height: i32,
}

impl ResolvedRect {
    /// True when the declared sub-rectangle extends past the image the
    /// region was packed from.
    pub fn bleeds(&self) -> bool {
        self.local_source_x + self.source.width > self.bound_width
            || self.local_source_y + self.source.height > self.bound_height
    }

    /// The declared sub-rectangle clipped to the packed image's bounds, for
    /// rendering. The raw declaration in `source` is left untouched so
    /// clamping can never hide a bleed.
    pub fn clamped_source(&self) -> SourceRect {
        SourceRect {
            x: self.source.x,
            y: self.source.y,
            width: self.source.width.min((self.bound_width - self.local_source_x).max(0)),
            height: self.source.height.min((self.bound_height - self.local_source_y).max(0)),
        }
    }

    /// Top-left of the whole packed image in texture-page space, the datum a
    /// palette preview pans around.
    pub fn texture_origin(&self) -> (i32, i32) {
        (self.source.x - self.local_source_x, self.source.y - self.local_source_y)
    }

    /// Where the trimmed graphic actually lands, offset from the entity
    /// position.
    pub fn graphic_position(&self) -> (f32, f32) {
        (self.x + self.offset_x, self.y + self.offset_y)
    }

    pub fn is_scaled(&self) -> bool {
        self.scale_x != 1.0 || self.scale_y != 1.0
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation != 0.0
    }
}

/// Marker rectangle for entities with nothing to draw: a recoverable
/// condition, not an error. Centered on the entity position, white, depth 0.
fn placeholder(x: f32, y: f32, rotation: f32, scale_x: f32, scale_y: f32) -> ResolvedRect {
    let half = PLACEHOLDER_SIZE as f32 / 2.0;
    ResolvedRect {
        texture: TextureRef::Missing,
        x,
        y,
        offset_x: 0.0,
        offset_y: 0.0,
        pivot_x: half * scale_x,
        pivot_y: half * scale_y,
        scale_x,
        scale_y,
        rotation,
        colour: Colour::WHITE,
        depth: 0,
        source: SourceRect { x: 0, y: 0, width: PLACEHOLDER_SIZE, height: PLACEHOLDER_SIZE },
        local_source_x: 0,
        local_source_y: 0,
        bound_width: PLACEHOLDER_SIZE,
        bound_height: PLACEHOLDER_SIZE,
    }
}

fn region_rect(region: &TextureRegion) -> ResolvedRect {
    ResolvedRect {
        texture: TextureRef::Page(i32::from(region.texture_page)),
        x: 0.0,
        y: 0.0,
        offset_x: f32::from(region.target_x),
        offset_y: f32::from(region.target_y),
        pivot_x: 0.0,
        pivot_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
        colour: Colour::WHITE,
        depth: 0,
        source: SourceRect {
            x: i32::from(region.source_x),
            y: i32::from(region.source_y),
            width: i32::from(region.source_width),
            height: i32::from(region.source_height),
        },
        local_source_x: 0,
        local_source_y: 0,
        bound_width: i32::from(region.bound_width),
        bound_height: i32::from(region.bound_height),
    }
}

/// Resolves a placed instance against its object type and sprite.
///
/// A type with no sprite, or a sprite with no frames, yields the placeholder
/// marker. A dangling reference yields `None` and the caller skips the slot.
pub fn resolve_instance(data: &GameData, instance: &Instance) -> Option<ResolvedRect> {
    let object = data.object(instance.object_id)?;
    let x = instance.x as f32;
    let y = instance.y as f32;

    if object.sprite_id == -1 {
        return Some(placeholder(x, y, -instance.rotation, instance.scale_x, instance.scale_y))
    }
    let sprite = data.sprite(object.sprite_id)?;
    let frame = match sprite.frames.first() {
        Some(&frame) => frame,
        None => return Some(placeholder(x, y, -instance.rotation, instance.scale_x, instance.scale_y)),
    };
    let region = data.region(frame)?;

    let mut rect = region_rect(region);
    rect.x = x;
    rect.y = y;
    rect.rotation = -instance.rotation;
    rect.scale_x = instance.scale_x;
    rect.scale_y = instance.scale_y;
    // The pivot tracks the instance scale so a non-uniform scale keeps
    // rotating around the authored origin.
    rect.pivot_x = sprite.origin_x as f32 * instance.scale_x;
    rect.pivot_y = sprite.origin_y as f32 * instance.scale_y;
    rect.depth = object.depth;
    rect.colour = Colour::from_abgr(instance.colour);
    Some(rect)
}

/// Resolves a tile placement against the background (legacy schema) or
/// sprite (layered schema) it references.
///
/// The tile's declared width/height override the region's natural size:
/// tiles may intentionally crop the image, or anomalously over-extend it.
pub fn resolve_tile(data: &GameData, tile: &Tile) -> Option<ResolvedRect> {
    if tile.asset_id == -1 {
        // a tile with no asset is degenerate but recoverable
        return Some(placeholder(tile.x as f32, tile.y as f32, 0.0, tile.scale_x, tile.scale_y))
    }

    let region_id = if data.is_version_at_least(2) {
        *data.sprite(tile.asset_id)?.frames.first()?
    } else {
        data.background(tile.asset_id)?.region_id
    };
    let region = data.region(region_id)?;

    let mut rect = region_rect(region);
    rect.x = tile.x as f32;
    rect.y = tile.y as f32;
    rect.scale_x = tile.scale_x;
    rect.scale_y = tile.scale_y;
    rect.depth = tile.depth;
    rect.colour = Colour::from_abgr(tile.colour);
    rect.source.x += tile.source_x as i32;
    rect.source.y += tile.source_y as i32;
    rect.source.width = tile.width as i32;
    rect.source.height = tile.height as i32;
    rect.local_source_x = tile.source_x as i32;
    rect.local_source_y = tile.source_y as i32;
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmwad::{Background, Object, Sprite};

    fn trimmed_region() -> TextureRegion {
        TextureRegion {
            source_x: 64,
            source_y: 0,
            source_width: 30,
            source_height: 28,
            target_x: 1,
            target_y: 2,
            target_width: 30,
            target_height: 28,
            bound_width: 32,
            bound_height: 32,
            texture_page: 0,
        }
    }

    fn sprite_data() -> GameData {
        let mut data = GameData::default();
        data.version.major = 1;
        data.regions.push(Some(Box::new(trimmed_region())));
        data.sprites.push(Some(Box::new(Sprite {
            name: "spr_hero".into(),
            origin_x: 16,
            origin_y: 12,
            frames: vec![0],
            ..Default::default()
        })));
        data.objects.push(Some(Box::new(Object { name: "obj_hero".into(), sprite_id: 0, depth: -7, ..Default::default() })));
        data.backgrounds.push(Some(Box::new(Background { name: "bg_ruins".into(), region_id: 0, ..Default::default() })));
        data
    }

    fn hero_instance() -> Instance {
        Instance {
            x: 100,
            y: 50,
            object_id: 0,
            id: 1,
            creation_code_id: 0,
            scale_x: 2.0,
            scale_y: 3.0,
            colour: 0xFF00_00FF, // opaque red
            rotation: 90.0,
            pre_create_code_id: -1,
        }
    }

    #[test]
    fn colour_unpacks_reversed_channel_order() {
        let c = Colour::from_abgr(0x8040_2010);
        assert_eq!(c, Colour { r: 0x10, g: 0x20, b: 0x40, a: 0x80 });
        assert!(Colour::from_abgr(0xFFFF_FFFF).is_opaque_white());
        assert!(!Colour::from_abgr(0xFEFF_FFFF).is_opaque_white()); // alpha 254
    }

    #[test]
    fn instance_resolution_scales_pivot_and_inverts_rotation() {
        let data = sprite_data();
        let rect = resolve_instance(&data, &hero_instance()).unwrap();

        assert_eq!(rect.texture, TextureRef::Page(0));
        assert_eq!((rect.x, rect.y), (100.0, 50.0));
        assert_eq!((rect.pivot_x, rect.pivot_y), (32.0, 36.0));
        assert_eq!(rect.rotation, -90.0);
        assert_eq!(rect.depth, -7); // from the object type, not the instance
        assert_eq!(rect.colour, Colour { r: 255, g: 0, b: 0, a: 255 });
        assert_eq!(rect.source, SourceRect { x: 64, y: 0, width: 30, height: 28 });
        assert_eq!((rect.offset_x, rect.offset_y), (1.0, 2.0));
        assert_eq!((rect.bound_width, rect.bound_height), (32, 32));
        assert!(!rect.bleeds());
    }

    #[test]
    fn spriteless_object_gets_centered_placeholder() {
        let mut data = sprite_data();
        data.objects.push(Some(Box::new(Object { name: "obj_ctrl".into(), sprite_id: -1, depth: 3, ..Default::default() })));
        let mut instance = hero_instance();
        instance.object_id = 1;

        let rect = resolve_instance(&data, &instance).unwrap();
        assert_eq!(rect.texture, TextureRef::Missing);
        assert_eq!(rect.colour, Colour::WHITE);
        assert_eq!((rect.pivot_x, rect.pivot_y), (16.0, 24.0)); // half size, scaled
        assert_eq!(rect.rotation, -90.0);
        assert_eq!((rect.scale_x, rect.scale_y), (2.0, 3.0));
        assert_eq!(rect.depth, 0);
    }

    #[test]
    fn frameless_sprite_gets_placeholder() {
        let mut data = sprite_data();
        data.sprites.push(Some(Box::new(Sprite { name: "spr_empty".into(), ..Default::default() })));
        data.objects.push(Some(Box::new(Object { name: "obj_empty".into(), sprite_id: 1, ..Default::default() })));
        let mut instance = hero_instance();
        instance.object_id = 1;

        let rect = resolve_instance(&data, &instance).unwrap();
        assert_eq!(rect.texture, TextureRef::Missing);
    }

    #[test]
    fn dangling_references_fail_softly() {
        let data = sprite_data();

        let mut instance = hero_instance();
        instance.object_id = 9;
        assert!(resolve_instance(&data, &instance).is_none());

        let mut data = sprite_data();
        data.objects.push(Some(Box::new(Object { name: "obj_bad".into(), sprite_id: 5, ..Default::default() })));
        let mut instance = hero_instance();
        instance.object_id = 1;
        assert!(resolve_instance(&data, &instance).is_none());
    }

    fn wide_tile() -> Tile {
        Tile {
            x: 8,
            y: 4,
            asset_id: 0,
            source_x: 16,
            source_y: 8,
            width: 48,
            height: 40,
            depth: 1000,
            id: 1,
            scale_x: 1.0,
            scale_y: 1.0,
            colour: 0x80FF_FFFF, // white at half alpha
        }
    }

    #[test]
    fn tile_resolution_offsets_source_and_overrides_size() {
        let data = sprite_data();
        let rect = resolve_tile(&data, &wide_tile()).unwrap();

        assert_eq!((rect.x, rect.y), (8.0, 4.0));
        assert_eq!(rect.source, SourceRect { x: 80, y: 8, width: 48, height: 40 });
        assert_eq!((rect.local_source_x, rect.local_source_y), (16, 8));
        assert_eq!((rect.pivot_x, rect.pivot_y), (0.0, 0.0));
        assert_eq!(rect.depth, 1000);
        assert!(!rect.colour.is_opaque_white());
        assert_eq!(rect.texture_origin(), (64, 0));
        // 16 + 48 > 32: the tile reaches past its background image
        assert!(rect.bleeds());
        assert_eq!(rect.clamped_source(), SourceRect { x: 80, y: 8, width: 16, height: 24 });
        // the raw declaration survives clamping
        assert_eq!(rect.source.width, 48);
    }

    #[test]
    fn layered_schema_resolves_tiles_via_sprites() {
        let mut data = sprite_data();
        data.version.major = 2;
        let mut tile = wide_tile();
        tile.asset_id = 0; // sprite table index under the layered schema
        let rect = resolve_tile(&data, &tile).unwrap();
        assert_eq!(rect.texture, TextureRef::Page(0));

        // under the layered schema a background id means nothing
        data.sprites.clear();
        assert!(resolve_tile(&data, &tile).is_none());
    }

    #[test]
    fn assetless_tile_gets_placeholder() {
        let data = sprite_data();
        let mut tile = wide_tile();
        tile.asset_id = -1;
        let rect = resolve_tile(&data, &tile).unwrap();
        assert_eq!(rect.texture, TextureRef::Missing);
        assert_eq!(rect.colour, Colour::WHITE);
        assert_eq!(rect.rotation, 0.0);
    }

    #[test]
    fn dangling_tile_asset_fails_softly() {
        let data = sprite_data();
        let mut tile = wide_tile();
        tile.asset_id = 3;
        assert!(resolve_tile(&data, &tile).is_none());
    }

    #[test]
    fn bleed_predicate_boundary() {
        let mut rect = resolve_tile(&sprite_data(), &wide_tile()).unwrap();
        rect.local_source_x = 4;
        rect.local_source_y = 4;
        rect.bound_width = 32;
        rect.bound_height = 32;

        rect.source.width = 30;
        rect.source.height = 30;
        assert!(rect.bleeds()); // 4 + 30 > 32

        rect.source.width = 28;
        rect.source.height = 28;
        assert!(!rect.bleeds()); // 4 + 28 == 32, flush is fine
    }
}
