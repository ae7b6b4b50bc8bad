#[derive(Clone, Debug, Default, PartialEq)]
pub struct Room {
    pub name: String,
    pub caption: String,
    pub width: u32,
    pub height: u32,
    pub speed: u32,
    pub persistent: bool,
    pub bg_colour: u32,
    pub draw_bg_colour: bool,
    pub creation_code_id: i32,
    pub flags: u32,
    /// Placed object instances, in authoring order. Present under both room
    /// schemas.
    pub instances: Vec<Instance>,
    /// The flat tile list of the legacy schema. Empty on layered rooms.
    pub tiles: Vec<Tile>,
    /// Layers of the current schema, in declaration order. Empty on legacy
    /// rooms.
    pub layers: Vec<Layer>,
}

/// A placed occurrence of an object type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Instance {
    pub x: i32,
    pub y: i32,
    /// Object table index.
    pub object_id: i32,
    /// Instance ID, expected to be contiguous across a room's instance list.
    pub id: u32,
    /// Code table index, <= 0 when the instance has no creation code.
    pub creation_code_id: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Packed tint, red in the least significant byte, alpha in the most.
    pub colour: u32,
    /// Degrees, increasing clockwise.
    pub rotation: f32,
    /// Code table index, <= 0 when absent. Only carried by bytecode >= 16.
    pub pre_create_code_id: i32,
}

/// A static background-image placement.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    /// Background table index under the legacy schema, sprite table index
    /// under the layered one. -1 for a tile with no asset.
    pub asset_id: i32,
    /// Top-left of the tile's sub-region within the referenced image.
    pub source_x: u32,
    pub source_y: u32,
    pub width: u32,
    pub height: u32,
    pub depth: i32,
    /// Tile ID, expected to be contiguous across a room's tile sequence.
    pub id: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub colour: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub name: String,
    pub id: u32,
    pub depth: i32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub hspeed: f32,
    pub vspeed: f32,
    pub visible: bool,
    pub kind: LayerKind,
}

/// Layer payloads. Only asset layers carry tile placements; the other kinds
/// are recorded so callers can see the room's full layer stack, but their
/// payloads are not retained.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Background,
    Instances,
    Assets { tiles: Vec<Tile> },
    Tiles,
    Effect,
    Unknown(u32),
}

impl LayerKind {
    pub fn tiles(&self) -> Option<&[Tile]> {
        match self {
            LayerKind::Assets { tiles } => Some(tiles),
            _ => None,
        }
    }
}
