/// An object type definition. Placed instances take their depth and sprite
/// from here, not from the room record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    pub name: String,
    /// Sprite table index, -1 for objects with no visual.
    pub sprite_id: i32,
    pub visible: bool,
    pub solid: bool,
    pub depth: i32,
    pub persistent: bool,
    pub parent_id: i32,
    pub mask_id: i32,
}
