/// A code entry. Only the name is retained; bytecode is skipped on read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeEntry {
    pub name: String,
    pub length: u32,
}
