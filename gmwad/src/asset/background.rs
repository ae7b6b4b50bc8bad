/// A background asset. Under the legacy room schema, tiles reference one of
/// these for their texture region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Background {
    pub name: String,
    pub transparent: bool,
    pub smooth: bool,
    pub preload: bool,
    /// Region table index, -1 if the background has no image.
    pub region_id: i32,
}
