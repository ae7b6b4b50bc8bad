use crate::{
    asset::{Background, CodeEntry, Error, Instance, Layer, LayerKind, Object, Room, Sprite, TexturePage, TextureRegion, Tile},
    AssetList, FormatVersion, GameData,
};
use byteorder::{ReadBytesExt, LE};
use log::{debug, warn};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use std::{
    collections::HashMap,
    fmt::{self, Display},
    io::{self, Read, Seek, SeekFrom},
};

#[derive(Debug)]
pub enum ReaderError {
    AssetError(Error),
    InvalidWadHeader,
    MissingChunk([u8; 4]),
    IO(io::Error),
}
impl std::error::Error for ReaderError {}
impl Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            ReaderError::AssetError(err) => format!("asset data error: {}", err),
            ReaderError::InvalidWadHeader => "invalid wad header".into(),
            ReaderError::MissingChunk(tag) => format!("missing required chunk '{}'", String::from_utf8_lossy(tag)),
            ReaderError::IO(err) => format!("io error: {}", err),
        })
    }
}

macro_rules! from_err {
    ($t: ident, $e: ty, $variant: ident) => {
        impl From<$e> for $t {
            fn from(err: $e) -> Self {
                $t::$variant(err)
            }
        }
    };
}

from_err!(ReaderError, Error, AssetError);
from_err!(ReaderError, io::Error, IO);

const FORM: [u8; 4] = *b"FORM";
const GEN8: [u8; 4] = *b"GEN8";
const TXTR: [u8; 4] = *b"TXTR";
const TPAG: [u8; 4] = *b"TPAG";
const BGND: [u8; 4] = *b"BGND";
const SPRT: [u8; 4] = *b"SPRT";
const OBJT: [u8; 4] = *b"OBJT";
const ROOM: [u8; 4] = *b"ROOM";
const CODE: [u8; 4] = *b"CODE";

/// Reads a string by its absolute pointer. The character length is stored in
/// the 4 bytes preceding the character data; pointer 0 means "no string".
fn read_string(data: &[u8], ptr: u32) -> Result<String, Error> {
    if ptr == 0 {
        return Ok(String::new())
    }
    let ptr = ptr as usize;
    if ptr < 4 {
        return Err(Error::InvalidPointer(ptr as u32))
    }
    let len = data
        .get(ptr - 4..ptr)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .ok_or(Error::InvalidPointer(ptr as u32))?;
    let bytes = ptr.checked_add(len).and_then(|end| data.get(ptr..end)).ok_or(Error::InvalidPointer(ptr as u32))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::NonUtf8String(ptr as u32))
}

fn cursor_at(data: &[u8], ptr: u32) -> io::Cursor<&[u8]> {
    let mut cur = io::Cursor::new(data);
    cur.set_position(u64::from(ptr));
    cur
}

/// A record list: count followed by that many absolute record pointers.
fn pointer_list(data: &[u8], cur: &mut io::Cursor<&[u8]>) -> Result<Vec<u32>, ReaderError> {
    let count = cur.read_u32::<LE>()? as usize;
    if count > data.len() / 4 {
        return Err(ReaderError::AssetError(Error::MalformedData))
    }
    let mut ptrs = Vec::with_capacity(count);
    for _ in 0..count {
        ptrs.push(cur.read_u32::<LE>()?);
    }
    Ok(ptrs)
}

/// Shared state for record deserializers: the raw buffer, the region
/// pointer-to-index map built from TPAG, and the schema knobs read from GEN8.
struct Ctx<'a> {
    data: &'a [u8],
    regions: HashMap<u32, i32>,
    bytecode: u8,
    schema_major: u32,
    strict: bool,
}

impl<'a> Ctx<'a> {
    fn string(&self, ptr: u32) -> Result<String, Error> {
        read_string(self.data, ptr)
    }

    fn at(&self, ptr: u32) -> io::Cursor<&'a [u8]> {
        cursor_at(self.data, ptr)
    }

    /// Resolves an absolute region pointer into a TPAG table index. Pointer 0
    /// means "no region". An unresolvable nonzero pointer is an error in
    /// strict mode and degrades to -1 otherwise.
    fn region_id(&self, ptr: u32) -> Result<i32, Error> {
        if ptr == 0 {
            return Ok(-1)
        }
        match self.regions.get(&ptr) {
            Some(&index) => Ok(index),
            None if self.strict => Err(Error::InvalidPointer(ptr)),
            None => {
                warn!("region pointer 0x{:X} resolves to no TPAG entry, treating as none", ptr);
                Ok(-1)
            },
        }
    }
}

fn get_assets<T, F>(ctx: &Ctx, chunk_pos: u32, deserializer: F, multithread: bool) -> Result<AssetList<T>, ReaderError>
where
    T: Send,
    F: Fn(&Ctx, u32) -> Result<T, ReaderError> + Sync,
{
    let mut cur = ctx.at(chunk_pos);
    let ptrs = pointer_list(ctx.data, &mut cur)?;

    let to_asset = |ptr: &u32| {
        // A null record pointer is a deleted asset, kept as None so later
        // indices stay stable.
        if *ptr == 0 { Ok(None) } else { deserializer(ctx, *ptr).map(|asset| Some(Box::new(asset))) }
    };

    if multithread {
        ptrs.par_iter().map(to_asset).collect::<Result<Vec<_>, ReaderError>>()
    } else {
        ptrs.iter().map(to_asset).collect::<Result<Vec<_>, ReaderError>>()
    }
}

fn background(ctx: &Ctx, ptr: u32) -> Result<Background, ReaderError> {
    let mut cur = ctx.at(ptr);
    Ok(Background {
        name: ctx.string(cur.read_u32::<LE>()?)?,
        transparent: cur.read_u32::<LE>()? != 0,
        smooth: cur.read_u32::<LE>()? != 0,
        preload: cur.read_u32::<LE>()? != 0,
        region_id: ctx.region_id(cur.read_u32::<LE>()?)?,
    })
}

fn sprite(ctx: &Ctx, ptr: u32) -> Result<Sprite, ReaderError> {
    let mut cur = ctx.at(ptr);
    let name = ctx.string(cur.read_u32::<LE>()?)?;
    let width = cur.read_u32::<LE>()?;
    let height = cur.read_u32::<LE>()?;
    let margin_left = cur.read_i32::<LE>()?;
    let margin_right = cur.read_i32::<LE>()?;
    let margin_bottom = cur.read_i32::<LE>()?;
    let margin_top = cur.read_i32::<LE>()?;
    let transparent = cur.read_u32::<LE>()? != 0;
    let smooth = cur.read_u32::<LE>()? != 0;
    let preload = cur.read_u32::<LE>()? != 0;
    let bbox_mode = cur.read_u32::<LE>()?;
    let separate_masks = cur.read_u32::<LE>()? != 0;
    let origin_x = cur.read_i32::<LE>()?;
    let origin_y = cur.read_i32::<LE>()?;

    let frame_count = cur.read_u32::<LE>()? as usize;
    if frame_count > ctx.data.len() / 4 {
        return Err(ReaderError::AssetError(Error::MalformedData))
    }
    let mut frames = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        frames.push(ctx.region_id(cur.read_u32::<LE>()?)?);
    }

    Ok(Sprite {
        name,
        width,
        height,
        margin_left,
        margin_right,
        margin_bottom,
        margin_top,
        transparent,
        smooth,
        preload,
        bbox_mode,
        separate_masks,
        origin_x,
        origin_y,
        frames,
    })
}

fn object(ctx: &Ctx, ptr: u32) -> Result<Object, ReaderError> {
    let mut cur = ctx.at(ptr);
    Ok(Object {
        name: ctx.string(cur.read_u32::<LE>()?)?,
        sprite_id: cur.read_i32::<LE>()?,
        visible: cur.read_u32::<LE>()? != 0,
        solid: cur.read_u32::<LE>()? != 0,
        depth: cur.read_i32::<LE>()?,
        persistent: cur.read_u32::<LE>()? != 0,
        parent_id: cur.read_i32::<LE>()?,
        mask_id: cur.read_i32::<LE>()?,
    })
}

fn code_entry(ctx: &Ctx, ptr: u32) -> Result<CodeEntry, ReaderError> {
    let mut cur = ctx.at(ptr);
    Ok(CodeEntry { name: ctx.string(cur.read_u32::<LE>()?)?, length: cur.read_u32::<LE>()? })
}

fn tile(cur: &mut io::Cursor<&[u8]>) -> Result<Tile, ReaderError> {
    Ok(Tile {
        x: cur.read_i32::<LE>()?,
        y: cur.read_i32::<LE>()?,
        asset_id: cur.read_i32::<LE>()?,
        source_x: cur.read_u32::<LE>()?,
        source_y: cur.read_u32::<LE>()?,
        width: cur.read_u32::<LE>()?,
        height: cur.read_u32::<LE>()?,
        depth: cur.read_i32::<LE>()?,
        id: cur.read_u32::<LE>()?,
        scale_x: cur.read_f32::<LE>()?,
        scale_y: cur.read_f32::<LE>()?,
        colour: cur.read_u32::<LE>()?,
    })
}

fn instance(ctx: &Ctx, ptr: u32) -> Result<Instance, ReaderError> {
    let mut cur = ctx.at(ptr);
    Ok(Instance {
        x: cur.read_i32::<LE>()?,
        y: cur.read_i32::<LE>()?,
        object_id: cur.read_i32::<LE>()?,
        id: cur.read_u32::<LE>()?,
        creation_code_id: cur.read_i32::<LE>()?,
        scale_x: cur.read_f32::<LE>()?,
        scale_y: cur.read_f32::<LE>()?,
        colour: cur.read_u32::<LE>()?,
        rotation: cur.read_f32::<LE>()?,
        // Pre-create code entered the instance record with bytecode 16.
        pre_create_code_id: if ctx.bytecode >= 16 { cur.read_i32::<LE>()? } else { -1 },
    })
}

fn tile_list(ctx: &Ctx, list_ptr: u32) -> Result<Vec<Tile>, ReaderError> {
    if list_ptr == 0 {
        return Ok(Vec::new())
    }
    let mut cur = ctx.at(list_ptr);
    let ptrs = pointer_list(ctx.data, &mut cur)?;
    let mut tiles = Vec::with_capacity(ptrs.len());
    for ptr in ptrs {
        if ptr == 0 {
            continue
        }
        tiles.push(tile(&mut ctx.at(ptr))?);
    }
    Ok(tiles)
}

fn layer(ctx: &Ctx, ptr: u32) -> Result<Layer, ReaderError> {
    let mut cur = ctx.at(ptr);
    let name = ctx.string(cur.read_u32::<LE>()?)?;
    let id = cur.read_u32::<LE>()?;
    let kind = cur.read_u32::<LE>()?;
    let depth = cur.read_i32::<LE>()?;
    let offset_x = cur.read_f32::<LE>()?;
    let offset_y = cur.read_f32::<LE>()?;
    let hspeed = cur.read_f32::<LE>()?;
    let vspeed = cur.read_f32::<LE>()?;
    let visible = cur.read_u32::<LE>()? != 0;

    let kind = match kind {
        1 => LayerKind::Background,
        2 => LayerKind::Instances,
        3 => {
            // Asset layers carry a legacy-format tile pointer list as their
            // payload.
            let ptrs = pointer_list(ctx.data, &mut cur)?;
            let mut tiles = Vec::with_capacity(ptrs.len());
            for ptr in ptrs {
                if ptr == 0 {
                    continue
                }
                tiles.push(tile(&mut ctx.at(ptr))?);
            }
            LayerKind::Assets { tiles }
        },
        4 => LayerKind::Tiles,
        6 => LayerKind::Effect,
        other => LayerKind::Unknown(other),
    };

    Ok(Layer { name, id, depth, offset_x, offset_y, hspeed, vspeed, visible, kind })
}

fn room(ctx: &Ctx, ptr: u32) -> Result<Room, ReaderError> {
    let mut cur = ctx.at(ptr);
    let name = ctx.string(cur.read_u32::<LE>()?)?;
    let caption = ctx.string(cur.read_u32::<LE>()?)?;
    let width = cur.read_u32::<LE>()?;
    let height = cur.read_u32::<LE>()?;
    let speed = cur.read_u32::<LE>()?;
    let persistent = cur.read_u32::<LE>()? != 0;
    let bg_colour = cur.read_u32::<LE>()?;
    let draw_bg_colour = cur.read_u32::<LE>()? != 0;
    let creation_code_id = cur.read_i32::<LE>()?;
    let flags = cur.read_u32::<LE>()?;
    let _backgrounds_ptr = cur.read_u32::<LE>()?;
    let _views_ptr = cur.read_u32::<LE>()?;
    let instances_ptr = cur.read_u32::<LE>()?;
    let tiles_ptr = cur.read_u32::<LE>()?;
    let layers_ptr = if ctx.schema_major >= 2 { cur.read_u32::<LE>()? } else { 0 };

    let instances = {
        let mut out = Vec::new();
        if instances_ptr != 0 {
            let mut lcur = ctx.at(instances_ptr);
            for ptr in pointer_list(ctx.data, &mut lcur)? {
                if ptr == 0 {
                    continue
                }
                out.push(instance(ctx, ptr)?);
            }
        }
        out
    };

    let tiles = tile_list(ctx, tiles_ptr)?;

    let layers = {
        let mut out = Vec::new();
        if layers_ptr != 0 {
            let mut lcur = ctx.at(layers_ptr);
            for ptr in pointer_list(ctx.data, &mut lcur)? {
                if ptr == 0 {
                    continue
                }
                out.push(layer(ctx, ptr)?);
            }
        }
        out
    };

    Ok(Room {
        name,
        caption,
        width,
        height,
        speed,
        persistent,
        bg_colour,
        draw_bg_colour,
        creation_code_id,
        flags,
        instances,
        tiles,
        layers,
    })
}

/// Decodes a wad buffer into chunk tables.
///
/// Load is one-shot: any error yields no `GameData` at all, so a failed load
/// can never leave a caller holding partially-replaced state.
pub fn from_wad<I>(wad: I, strict: bool, multithread: bool) -> Result<GameData, ReaderError>
where
    I: AsRef<[u8]>,
{
    let data = wad.as_ref();
    let mut wad = io::Cursor::new(data);

    // Container header: "FORM" followed by the total payload length.
    let mut magic = [0u8; 4];
    wad.read_exact(&mut magic)?;
    if magic != FORM {
        return Err(ReaderError::InvalidWadHeader)
    }
    let declared = wad.read_u32::<LE>()? as usize;
    let end = match declared.checked_add(8) {
        Some(end) if end <= data.len() => end,
        _ => {
            if strict {
                return Err(ReaderError::InvalidWadHeader)
            }
            warn!("container declares {} payload bytes but the file holds {}", declared, data.len().saturating_sub(8));
            data.len()
        },
    };

    // Chunk directory. Order in the file is not fixed, so scan it all first.
    let mut chunks: Vec<([u8; 4], u32, u32)> = Vec::new();
    while (wad.position() as usize) + 8 <= end {
        let mut tag = [0u8; 4];
        wad.read_exact(&mut tag)?;
        let len = wad.read_u32::<LE>()?;
        let pos = wad.position() as u32;
        if (pos as usize).checked_add(len as usize).map_or(true, |chunk_end| chunk_end > data.len()) {
            return Err(ReaderError::AssetError(Error::MalformedData))
        }
        debug!("chunk '{}' at 0x{:X} ({} bytes)", String::from_utf8_lossy(&tag), pos, len);
        chunks.push((tag, pos, len));
        wad.seek(SeekFrom::Current(i64::from(len)))?;
    }

    let chunk = |tag: [u8; 4]| chunks.iter().find(|(t, _, _)| *t == tag).map(|&(_, pos, _)| pos);

    // GEN8 carries the schema knobs everything else depends on.
    let gen8_pos = chunk(GEN8).ok_or(ReaderError::MissingChunk(GEN8))?;
    let mut cur = cursor_at(data, gen8_pos);
    let debug_disabled = cur.read_u8()? != 0;
    let bytecode_format = cur.read_u8()?;
    let _unknown = cur.read_u16::<LE>()?;
    let filename = read_string(data, cur.read_u32::<LE>()?)?;
    let config = read_string(data, cur.read_u32::<LE>()?)?;
    let last_object_id = cur.read_i32::<LE>()?;
    let last_tile_id = cur.read_i32::<LE>()?;
    let game_id = cur.read_u32::<LE>()?;
    let mut guid = [0u8; 16];
    cur.read_exact(&mut guid)?;
    let name = read_string(data, cur.read_u32::<LE>()?)?;
    let version = FormatVersion {
        major: cur.read_u32::<LE>()?,
        minor: cur.read_u32::<LE>()?,
        release: cur.read_u32::<LE>()?,
        build: cur.read_u32::<LE>()?,
    };
    let window_width = cur.read_u32::<LE>()?;
    let window_height = cur.read_u32::<LE>()?;
    let _info_flags = cur.read_u32::<LE>()?;
    let _licence_crc = cur.read_u32::<LE>()?;
    let mut _licence_md5 = [0u8; 16];
    cur.read_exact(&mut _licence_md5)?;
    let _timestamp = cur.read_u64::<LE>()?;
    let display_name = read_string(data, cur.read_u32::<LE>()?)?;
    let _active_targets = cur.read_u64::<LE>()?;
    let _function_classifications = cur.read_u64::<LE>()?;
    let _steam_app_id = cur.read_u32::<LE>()?;
    if bytecode_format >= 14 {
        let _debugger_port = cur.read_u32::<LE>()?;
    }
    let room_order = {
        let count = cur.read_u32::<LE>()? as usize;
        if count > data.len() / 4 {
            return Err(ReaderError::AssetError(Error::MalformedData))
        }
        let mut order = Vec::with_capacity(count);
        for _ in 0..count {
            order.push(cur.read_i32::<LE>()?);
        }
        order
    };

    debug!("GEN8: '{}' runner {}.{}.{}.{}, bytecode {}", name, version.major, version.minor, version.release, version.build, bytecode_format);
    debug!("game id: {}, window {}x{}, config '{}', filename '{}'", game_id, window_width, window_height, config, filename);
    debug!("debug disabled: {}", debug_disabled);
    debug!("room order: {:?}", room_order);

    // Texture pages
    let texture_pages: AssetList<TexturePage> = match chunk(TXTR) {
        Some(pos) => {
            let mut cur = cursor_at(data, pos);
            let ptrs = pointer_list(data, &mut cur)?;
            let mut pages: AssetList<TexturePage> = Vec::with_capacity(ptrs.len());
            for ptr in ptrs {
                if ptr == 0 {
                    pages.push(None);
                    continue
                }
                let mut ecur = cursor_at(data, ptr);
                let scaled = ecur.read_u32::<LE>()? != 0;
                let len = ecur.read_u32::<LE>()? as usize;
                let dptr = ecur.read_u32::<LE>()? as usize;
                let blob = dptr.checked_add(len).and_then(|blob_end| data.get(dptr..blob_end)).ok_or(Error::MalformedData)?;
                pages.push(Some(Box::new(TexturePage { scaled, data: blob.into() })));
            }
            debug!(" + Loaded {} texture pages", pages.iter().flatten().count());
            pages
        },
        None => {
            debug!("no TXTR chunk, texture page table is empty");
            Vec::new()
        },
    };

    // Texture regions, building the pointer-to-index map that turns the
    // file's cross-references into stable table IDs.
    let mut region_index: HashMap<u32, i32> = HashMap::new();
    let regions: AssetList<TextureRegion> = match chunk(TPAG) {
        Some(pos) => {
            let mut cur = cursor_at(data, pos);
            let ptrs = pointer_list(data, &mut cur)?;
            let mut regions: AssetList<TextureRegion> = Vec::with_capacity(ptrs.len());
            region_index.reserve(ptrs.len());
            for (index, &ptr) in ptrs.iter().enumerate() {
                if ptr == 0 {
                    regions.push(None);
                    continue
                }
                region_index.insert(ptr, index as i32);
                let mut ecur = cursor_at(data, ptr);
                regions.push(Some(Box::new(TextureRegion {
                    source_x: ecur.read_u16::<LE>()?,
                    source_y: ecur.read_u16::<LE>()?,
                    source_width: ecur.read_u16::<LE>()?,
                    source_height: ecur.read_u16::<LE>()?,
                    target_x: ecur.read_u16::<LE>()?,
                    target_y: ecur.read_u16::<LE>()?,
                    target_width: ecur.read_u16::<LE>()?,
                    target_height: ecur.read_u16::<LE>()?,
                    bound_width: ecur.read_u16::<LE>()?,
                    bound_height: ecur.read_u16::<LE>()?,
                    texture_page: ecur.read_i16::<LE>()?,
                })));
            }
            debug!(" + Loaded {} texture regions", regions.iter().flatten().count());
            regions
        },
        None => {
            debug!("no TPAG chunk, region table is empty");
            Vec::new()
        },
    };

    let ctx = Ctx { data, regions: region_index, bytecode: bytecode_format, schema_major: version.major, strict };

    let backgrounds: AssetList<Background> = match chunk(BGND) {
        Some(pos) => get_assets(&ctx, pos, background, multithread)?,
        None => Vec::new(),
    };
    backgrounds.iter().flatten().for_each(|bg| {
        debug!(" + Added background '{}' (region {})", bg.name, bg.region_id);
    });

    let sprites: AssetList<Sprite> = match chunk(SPRT) {
        Some(pos) => get_assets(&ctx, pos, sprite, multithread)?,
        None => Vec::new(),
    };
    sprites.iter().flatten().for_each(|sprite| {
        let framecount = sprite.frames.len();
        debug!(
            " + Added sprite '{}' ({}x{}, origin {},{}, {} frame{})",
            sprite.name,
            sprite.width,
            sprite.height,
            sprite.origin_x,
            sprite.origin_y,
            framecount,
            if framecount == 1 { "" } else { "s" }
        );
    });

    let objects: AssetList<Object> = match chunk(OBJT) {
        Some(pos) => get_assets(&ctx, pos, object, multithread)?,
        None => Vec::new(),
    };
    objects.iter().flatten().for_each(|object| {
        debug!(
            " + Added object {} ({}{}{}depth {})",
            object.name,
            if object.solid { "solid; " } else { "" },
            if object.visible { "visible; " } else { "" },
            if object.persistent { "persistent; " } else { "" },
            object.depth,
        );
    });

    let code: AssetList<CodeEntry> = match chunk(CODE) {
        Some(pos) => get_assets(&ctx, pos, code_entry, multithread)?,
        None => Vec::new(),
    };
    code.iter().flatten().for_each(|entry| {
        debug!(" + Added code entry '{}' ({} bytes)", entry.name, entry.length);
    });

    let rooms: AssetList<Room> = match chunk(ROOM) {
        Some(pos) => get_assets(&ctx, pos, room, multithread)?,
        None => {
            warn!("no ROOM chunk, nothing to inspect");
            Vec::new()
        },
    };
    rooms.iter().flatten().for_each(|room| {
        debug!(
            " + Added room '{}' ({}x{}, {} tiles, {} instances, {} layers)",
            room.name,
            room.width,
            room.height,
            room.tiles.len(),
            room.instances.len(),
            room.layers.len(),
        );
    });

    Ok(GameData {
        version,
        bytecode_format,
        game_id,
        guid,
        name,
        display_name,
        last_object_id,
        last_tile_id,
        room_order,
        texture_pages,
        regions,
        backgrounds,
        sprites,
        objects,
        rooms,
        code,
    })
}
