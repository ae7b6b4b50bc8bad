#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sprite {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub margin_left: i32,
    pub margin_right: i32,
    pub margin_bottom: i32,
    pub margin_top: i32,
    pub transparent: bool,
    pub smooth: bool,
    pub preload: bool,
    pub bbox_mode: u32,
    pub separate_masks: bool,
    pub origin_x: i32,
    pub origin_y: i32,
    /// Region table indices, one per animation frame. May be empty.
    pub frames: Vec<i32>,
}
