// Sprite definition tables: for every sprite name, which patch lump (and
// mirror bit) to show for each frame letter and each of 16 view rotations.
// Built once at load time from the lump directory.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;
use thiserror::Error;

use super::patch::{PatchCache, PatchId};

pub const MAX_SPRITE_FRAMES: usize = 29;
pub const NUM_ROTATIONS: usize = 16;

/// `NNNN` + frame + rotation, optionally followed by a mirrored
/// frame + rotation pair.
static SPRITE_LUMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<name>.{4})(?P<frame>.)(?P<rot>.)(?:(?P<frame2>.)(?P<rot2>.))?$")
        .expect("static sprite lump pattern")
});

/// Fatal content errors found while building sprite definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpriteError {
    #[error("bad frame characters in lump {lump}")]
    BadFrameChars { lump: String },

    #[error("no patches found for {sprite} frame {frame}")]
    NoPatches { sprite: String, frame: char },

    #[error("sprite {sprite} frame {frame} is missing rotations")]
    MissingRotations { sprite: String, frame: char },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteFrame {
    /// `false`: `lumps[0]` is used from every angle.
    pub rotate: bool,
    pub lumps: [PatchId; NUM_ROTATIONS],
    /// Bit `r` set: rotation `r` is drawn mirrored.
    pub flip: u16,
}

impl SpriteFrame {
    /// Lump and mirror bit for rotation slot `rot` (ignored when the frame
    /// does not rotate).
    #[inline]
    pub fn pick(&self, rot: usize) -> (PatchId, bool) {
        let r = if self.rotate { rot % NUM_ROTATIONS } else { 0 };
        (self.lumps[r], self.flip & (1 << r) != 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpriteDef {
    pub name: String,
    pub frames: SmallVec<[SpriteFrame; 8]>,
}

#[derive(Clone, Copy, Default)]
struct FrameSlot {
    rotate: Option<bool>,
    lumps: [Option<PatchId>; NUM_ROTATIONS],
    flip: u16,
}

/// Collects the lumps of one sprite name; [`SpriteDefBuilder::finish`]
/// validates them into a [`SpriteDef`].
pub struct SpriteDefBuilder {
    name: String,
    slots: [FrameSlot; MAX_SPRITE_FRAMES],
    max_frame: Option<usize>,
}

impl SpriteDefBuilder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), slots: [FrameSlot::default(); MAX_SPRITE_FRAMES], max_frame: None }
    }

    /// Record `lump` under frame character `frame` and rotation character
    /// `rot`. Rotation `0` fills every even slot still empty; `1`..`8`
    /// map to even slots, `9`..`G` to the odd slots between them. A slot
    /// that is already taken keeps its first lump.
    pub fn install_lump(
        &mut self,
        lump: PatchId,
        lump_name: &str,
        frame: char,
        rot: char,
        flipped: bool,
    ) -> Result<(), SpriteError> {
        let bad = || SpriteError::BadFrameChars { lump: lump_name.to_string() };

        let frame = (frame as u32).checked_sub('A' as u32).ok_or_else(bad)? as usize;
        let rotation = match rot {
            '0'..='9' => rot as u32 - '0' as u32,
            r if r >= 'A' => r as u32 - 'A' as u32 + 10,
            _ => 17,
        };
        if frame >= MAX_SPRITE_FRAMES || rotation > 16 {
            return Err(bad());
        }

        self.max_frame = Some(self.max_frame.map_or(frame, |m| m.max(frame)));
        let slot = &mut self.slots[frame];

        if rotation == 0 {
            for r in (0..NUM_ROTATIONS).step_by(2).rev() {
                if slot.lumps[r].is_none() {
                    slot.lumps[r] = Some(lump);
                    if flipped {
                        slot.flip |= 1 << r;
                    }
                    slot.rotate = Some(false);
                }
            }
        } else {
            let r = (if rotation <= 8 { (rotation - 1) * 2 } else { (rotation - 9) * 2 + 1 }) as usize;
            if slot.lumps[r].is_none() {
                slot.lumps[r] = Some(lump);
                if flipped {
                    slot.flip |= 1 << r;
                }
                slot.rotate = Some(true);
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<SpriteDef, SpriteError> {
        let mut frames = SmallVec::new();
        let Some(max_frame) = self.max_frame else {
            return Ok(SpriteDef { name: self.name, frames });
        };

        for (index, slot) in self.slots.iter_mut().enumerate().take(max_frame + 1) {
            let frame_char = (b'A' + index as u8) as char;
            match slot.rotate {
                None => {
                    return Err(SpriteError::NoPatches { sprite: self.name.clone(), frame: frame_char });
                }
                Some(false) => {}
                Some(true) => {
                    for pair in 0..NUM_ROTATIONS / 2 {
                        let (even, odd) = (pair * 2, pair * 2 + 1);
                        if slot.lumps[odd].is_none() {
                            slot.lumps[odd] = slot.lumps[even];
                            if slot.flip & (1 << even) != 0 {
                                slot.flip |= 1 << odd;
                            }
                        }
                        if slot.lumps[even].is_none() {
                            slot.lumps[even] = slot.lumps[odd];
                            if slot.flip & (1 << odd) != 0 {
                                slot.flip |= 1 << even;
                            }
                        }
                    }
                    if slot.lumps.iter().any(Option::is_none) {
                        return Err(SpriteError::MissingRotations {
                            sprite: self.name.clone(),
                            frame: frame_char,
                        });
                    }
                }
            }

            let first = slot.lumps.iter().flatten().next().copied().unwrap_or(0);
            frames.push(SpriteFrame {
                rotate: slot.rotate == Some(true),
                lumps: slot.lumps.map(|l| l.unwrap_or(first)),
                flip: slot.flip,
            });
        }
        Ok(SpriteDef { name: self.name, frames })
    }
}

/// Build a definition for each of `names` from the lumps in `patches`.
///
/// Lumps are scanned from last to first so that later (patch) lumps win
/// slots over earlier ones.
pub fn init_sprite_defs(names: &[&str], patches: &PatchCache) -> Result<Vec<SpriteDef>, SpriteError> {
    let mut defs = Vec::with_capacity(names.len());
    for name in names {
        let prefix = name.to_ascii_uppercase();
        let mut builder = SpriteDefBuilder::new(&prefix);

        for (lump, lump_name) in patches.lump_names().rev() {
            if !lump_name.starts_with(&prefix) {
                continue;
            }
            let caps = SPRITE_LUMP
                .captures(lump_name)
                .ok_or_else(|| SpriteError::BadFrameChars { lump: lump_name.to_string() })?;
            let ch = |key: &str| caps.name(key).and_then(|m| m.as_str().chars().next());

            if let (Some(frame), Some(rot)) = (ch("frame"), ch("rot")) {
                builder.install_lump(lump, lump_name, frame, rot, false)?;
            }
            if let (Some(frame), Some(rot)) = (ch("frame2"), ch("rot2")) {
                builder.install_lump(lump, lump_name, frame, rot, true)?;
            }
        }

        let def = builder.finish()?;
        log::debug!("sprite {} has {} frames", def.name, def.frames.len());
        defs.push(def);
    }
    Ok(defs)
}
