// Column/post ("patch") graphics and the lazily filled cache the sprite
// projector measures them through. The renderer interacts through
// `PatchId` only; where the bytes come from is a `PatchSource` concern.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use byteorder::{ByteOrder, LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Runtime handle for a patch lump.
///
/// *Guaranteed* to remain stable for the lifetime of the cache.
pub type PatchId = u16;

/// Post list terminator.
const END_OF_COLUMN: u8 = 0xFF;
/// `width` value of a size record that was never measured.
pub const UNMEASURED: u16 = 0xffff;

/// Header of a patch: dimensions and drawing offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchSize {
    pub width: u16,
    pub height: u16,
    pub left_offset: i16,
    pub top_offset: i16,
}

impl PatchSize {
    pub const UNMEASURED: Self = Self { width: UNMEASURED, height: 0, left_offset: 0, top_offset: 0 };

    #[inline]
    pub fn is_measured(&self) -> bool {
        self.width != UNMEASURED
    }
}

/// Things that can go wrong decoding or caching a patch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch lump {0} not found")]
    Missing(PatchId),

    #[error("patch lump is {len} bytes, too short for its header")]
    ShortHeader { len: usize },

    #[error("patch is {width}x{height}, which is not drawable")]
    BadSize { width: i16, height: i16 },

    #[error("column {column} offset {offset} lies outside the lump")]
    ColumnOffset { column: usize, offset: u32 },

    #[error("column {column} runs past the end of the lump")]
    Unterminated { column: usize },
}

/// A decoded patch: the header plus the raw lump, with every column
/// offset validated so iteration never leaves the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    pub size: PatchSize,
    column_ofs: Vec<u32>,
    data: Vec<u8>,
}

impl Patch {
    pub fn decode(bytes: &[u8]) -> Result<Self, PatchError> {
        let short = || PatchError::ShortHeader { len: bytes.len() };
        let mut cur = Cursor::new(bytes);
        let width = cur.read_i16::<LE>().map_err(|_| short())?;
        let height = cur.read_i16::<LE>().map_err(|_| short())?;
        let left_offset = cur.read_i16::<LE>().map_err(|_| short())?;
        let top_offset = cur.read_i16::<LE>().map_err(|_| short())?;
        if width <= 0 || height < 0 {
            return Err(PatchError::BadSize { width, height });
        }

        let mut column_ofs = Vec::with_capacity(width as usize);
        for _ in 0..width {
            column_ofs.push(cur.read_u32::<LE>().map_err(|_| short())?);
        }

        for (column, &offset) in column_ofs.iter().enumerate() {
            let start = offset as usize;
            if start >= bytes.len() {
                return Err(PatchError::ColumnOffset { column, offset });
            }
            if !column_terminates(&bytes[start..]) {
                return Err(PatchError::Unterminated { column });
            }
        }

        Ok(Self {
            size: PatchSize { width: width as u16, height: height as u16, left_offset, top_offset },
            column_ofs,
            data: bytes.to_vec(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.size.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.size.height as usize
    }

    /// Column `x`, or `None` outside `0..width`.
    #[inline]
    pub fn column(&self, x: usize) -> Option<PatchColumn<'_>> {
        let start = *self.column_ofs.get(x)? as usize;
        Some(PatchColumn { data: self.data.get(start..)? })
    }
}

fn column_terminates(mut data: &[u8]) -> bool {
    loop {
        match data.first() {
            Some(&END_OF_COLUMN) => return true,
            Some(_) => {
                let Some(&len) = data.get(1) else { return false };
                let next = len as usize + 4;
                if data.len() < next {
                    return false;
                }
                data = &data[next..];
            }
            None => return false,
        }
    }
}

/// One column's run-length post list.
#[derive(Clone, Copy, Debug)]
pub struct PatchColumn<'a> {
    data: &'a [u8],
}

/// A vertical run of opaque texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Post<'a> {
    /// Row of the first texel. Tall patches are resolved already: a
    /// topdelta not above the running top is relative to it.
    pub top: i32,
    pub pixels: &'a [u8],
}

impl<'a> PatchColumn<'a> {
    pub fn posts(&self) -> Posts<'a> {
        Posts { data: self.data, top: -1 }
    }
}

pub struct Posts<'a> {
    data: &'a [u8],
    top: i32,
}

impl<'a> Iterator for Posts<'a> {
    type Item = Post<'a>;

    fn next(&mut self) -> Option<Post<'a>> {
        let delta = *self.data.first()?;
        if delta == END_OF_COLUMN {
            return None;
        }
        let len = *self.data.get(1)? as usize;
        let pixels = self.data.get(3..3 + len)?;
        self.data = self.data.get(len + 4..)?;

        let delta = delta as i32;
        if delta <= self.top {
            self.top += delta;
        } else {
            self.top = delta;
        }
        Some(Post { top: self.top, pixels })
    }
}

/// Supplies raw patch lumps by id.
pub trait PatchSource {
    fn num_lumps(&self) -> usize;
    fn lump_name(&self, id: PatchId) -> Option<&str>;
    fn lump_bytes(&self, id: PatchId) -> Option<&[u8]>;
}

/// In-memory lump list, in insertion order.
#[derive(Default)]
pub struct MemorySource {
    lumps: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, bytes: Vec<u8>) -> PatchId {
        self.lumps.push((name.to_ascii_uppercase(), bytes));
        (self.lumps.len() - 1) as PatchId
    }
}

impl PatchSource for MemorySource {
    fn num_lumps(&self) -> usize {
        self.lumps.len()
    }

    fn lump_name(&self, id: PatchId) -> Option<&str> {
        self.lumps.get(id as usize).map(|(n, _)| n.as_str())
    }

    fn lump_bytes(&self, id: PatchId) -> Option<&[u8]> {
        self.lumps.get(id as usize).map(|(_, b)| b.as_slice())
    }
}

/// Lazily decoding patch cache.
///
/// * Sizes start out [`PatchSize::UNMEASURED`]; asking for the size of an
///   unmeasured lump decodes it.
/// * Stores exactly one decoded copy per lump.
pub struct PatchCache {
    source: Box<dyn PatchSource>,
    sizes: Vec<PatchSize>,
    patches: Vec<Option<Patch>>,
    by_name: HashMap<String, PatchId>,
}

impl PatchCache {
    pub fn new(source: Box<dyn PatchSource>) -> Self {
        let n = source.num_lumps();
        let mut by_name = HashMap::with_capacity(n);
        for id in 0..n {
            if let Some(name) = source.lump_name(id as PatchId) {
                // Later lumps override earlier ones, as in a WAD directory.
                by_name.insert(name.to_string(), id as PatchId);
            }
        }
        Self { source, sizes: vec![PatchSize::UNMEASURED; n], patches: vec![None; n], by_name }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<PatchId> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn name(&self, id: PatchId) -> Option<&str> {
        self.source.lump_name(id)
    }

    /// Recorded size; may still be [`PatchSize::UNMEASURED`].
    #[inline]
    pub fn size(&self, id: PatchId) -> PatchSize {
        self.sizes.get(id as usize).copied().unwrap_or(PatchSize::UNMEASURED)
    }

    /// Size of `id`, decoding the lump first if it was never measured.
    pub fn measure(&mut self, id: PatchId) -> Result<PatchSize, PatchError> {
        let size = self.size(id);
        if size.is_measured() {
            return Ok(size);
        }
        Ok(self.cache(id)?.size)
    }

    /// Decode `id` if needed and return it.
    pub fn cache(&mut self, id: PatchId) -> Result<&Patch, PatchError> {
        let slot = id as usize;
        if slot >= self.patches.len() {
            return Err(PatchError::Missing(id));
        }
        if self.patches[slot].is_none() {
            let bytes = self.source.lump_bytes(id).ok_or(PatchError::Missing(id))?;
            let patch = Patch::decode(bytes)?;
            self.sizes[slot] = patch.size;
            self.patches[slot] = Some(patch);
        }
        self.patches[slot].as_ref().ok_or(PatchError::Missing(id))
    }

    /// Already decoded patch, without touching the source.
    #[inline]
    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(id as usize)?.as_ref()
    }

    /// `(id, name)` of every lump, in directory order.
    pub fn lump_names(&self) -> impl DoubleEndedIterator<Item = (PatchId, &str)> + '_ {
        (0..self.len()).filter_map(|i| Some((i as PatchId, self.source.lump_name(i as PatchId)?)))
    }
}

/// Encoder for the column/post lump format.
#[derive(Clone, Debug)]
pub struct PatchBuilder {
    size: PatchSize,
    columns: Vec<Vec<(u8, Vec<u8>)>>,
}

impl PatchBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            size: PatchSize { width, height, left_offset: 0, top_offset: 0 },
            columns: vec![Vec::new(); width as usize],
        }
    }

    pub fn offsets(mut self, left: i16, top: i16) -> Self {
        self.size.left_offset = left;
        self.size.top_offset = top;
        self
    }

    /// Append a raw post to column `x`. `topdelta` is written as given.
    pub fn post(mut self, x: usize, topdelta: u8, pixels: &[u8]) -> Self {
        if let Some(col) = self.columns.get_mut(x) {
            col.push((topdelta, pixels.to_vec()));
        }
        self
    }

    /// Opaque where `f(x, y)` returns a colour, transparent elsewhere.
    pub fn from_fn(width: u16, height: u16, mut f: impl FnMut(usize, usize) -> Option<u8>) -> Self {
        let mut b = Self::new(width, height);
        for x in 0..width as usize {
            let mut run: Option<(usize, Vec<u8>)> = None;
            for y in 0..height as usize {
                let texel = f(x, y);
                let extend = texel.is_some() && matches!(&run, Some((_, px)) if px.len() < 254);
                if extend {
                    if let (Some(c), Some((_, px))) = (texel, run.as_mut()) {
                        px.push(c);
                    }
                    continue;
                }
                if let Some((top, px)) = run.take() {
                    b.columns[x].push((top as u8, px));
                }
                run = texel.map(|c| (y, vec![c]));
            }
            if let Some((top, px)) = run {
                b.columns[x].push((top as u8, px));
            }
        }
        b
    }

    pub fn solid(width: u16, height: u16, color: u8) -> Self {
        Self::from_fn(width, height, |_, _| Some(color))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.write_i16::<LE>(self.size.width as i16)?;
        out.write_i16::<LE>(self.size.height as i16)?;
        out.write_i16::<LE>(self.size.left_offset)?;
        out.write_i16::<LE>(self.size.top_offset)?;

        let table = out.len();
        out.resize(table + 4 * self.columns.len(), 0);
        for (x, posts) in self.columns.iter().enumerate() {
            let ofs = out.len() as u32;
            LE::write_u32(&mut out[table + 4 * x..], ofs);
            for (topdelta, pixels) in posts {
                out.write_all(&[*topdelta, pixels.len() as u8, 0])?;
                out.write_all(pixels)?;
                out.write_u8(0)?;
            }
            out.write_u8(END_OF_COLUMN)?;
        }
        Ok(())
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
