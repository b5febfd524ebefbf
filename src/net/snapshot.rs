//! Per-viewer snapshot encoding and decoding
//!
//! Layout: `[tick: u32][count: u16]` followed by `count` items, each
//! `[type: u16][size: u16][id: u32]` plus `size` bytes of i32 fields.
//! A record that does not fit is skipped whole; earlier records stay intact.

use crate::game::clock::Tick;
use crate::game::constants::net::{MAX_SNAPSHOT_ITEMS, MAX_SNAPSHOT_SIZE};
use crate::net::framing::{FieldReader, FieldWriter, ShortRead};
use crate::net::protocol::{EntityClassTag, LayerTag, NetObjType};

/// Snapshot header size in bytes
pub const HEADER_SIZE: usize = 4 + 2;
/// Item header size in bytes
pub const ITEM_HEADER_SIZE: usize = 2 + 2 + 4;

// ============================================================================
// Records
// ============================================================================

/// Positioned segment; turrets and plasma send both endpoints equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord {
    pub x: i32,
    pub y: i32,
    pub from_x: i32,
    pub from_y: i32,
    pub start_tick: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityExtraRecord {
    pub switch_number: i32,
    pub layer: LayerTag,
    pub entity_class: EntityClassTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterRecord {
    pub x: i32,
    pub y: i32,
    pub team: i32,
    pub flags: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapItem {
    Segment(SegmentRecord),
    EntityExtra(EntityExtraRecord),
    Character(CharacterRecord),
}

impl SnapItem {
    pub fn obj_type(&self) -> NetObjType {
        match self {
            SnapItem::Segment(_) => NetObjType::Segment,
            SnapItem::EntityExtra(_) => NetObjType::EntityExtra,
            SnapItem::Character(_) => NetObjType::Character,
        }
    }

    /// Encoded size including the item header
    pub fn encoded_len(&self) -> usize {
        ITEM_HEADER_SIZE + self.obj_type().payload_size()
    }

    fn write_payload(&self, out: &mut FieldWriter<'_>) {
        match *self {
            SnapItem::Segment(r) => out.i32s(&[r.x, r.y, r.from_x, r.from_y, r.start_tick]),
            SnapItem::EntityExtra(r) => out.i32s(&[r.switch_number, r.layer as i32, r.entity_class as i32]),
            SnapItem::Character(r) => out.i32s(&[r.x, r.y, r.team, r.flags]),
        };
    }

    fn read_payload(ty: NetObjType, reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        let item = match ty {
            NetObjType::Segment => {
                let [x, y, from_x, from_y, start_tick] = reader.i32s()?;
                SnapItem::Segment(SegmentRecord {
                    x,
                    y,
                    from_x,
                    from_y,
                    start_tick,
                })
            }
            NetObjType::EntityExtra => {
                let [switch_number, layer, class] = reader.i32s()?;
                let layer = LayerTag::from_i32(layer).ok_or(DecodeError::InvalidField("layer", layer))?;
                let entity_class =
                    EntityClassTag::from_i32(class).ok_or(DecodeError::InvalidField("entity_class", class))?;
                SnapItem::EntityExtra(EntityExtraRecord {
                    switch_number,
                    layer,
                    entity_class,
                })
            }
            NetObjType::Character => {
                let [x, y, team, flags] = reader.i32s()?;
                SnapItem::Character(CharacterRecord { x, y, team, flags })
            }
        };
        Ok(item)
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    /// Total encoded size including the snapshot header
    pub max_size: usize,
    pub max_items: usize,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self {
            max_size: MAX_SNAPSHOT_SIZE,
            max_items: MAX_SNAPSHOT_ITEMS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot buffer full: {needed} bytes needed, {remaining} left")]
    BufferFull { needed: usize, remaining: usize },
    #[error("Snapshot item limit of {0} reached")]
    ItemLimit(usize),
}

/// Append-only record buffer for one viewer and one tick
pub struct SnapshotBuilder {
    tick: Tick,
    body: Vec<u8>,
    items: usize,
    limits: SnapshotLimits,
    dropped: usize,
}

impl SnapshotBuilder {
    pub fn new(tick: Tick, limits: SnapshotLimits) -> Self {
        Self {
            tick,
            body: Vec::with_capacity(limits.max_size.min(4096)),
            items: 0,
            limits,
            dropped: 0,
        }
    }

    pub fn push(&mut self, id: u32, item: SnapItem) -> Result<(), SnapshotError> {
        if self.items >= self.limits.max_items || self.items >= u16::MAX as usize {
            self.dropped += 1;
            return Err(SnapshotError::ItemLimit(self.items));
        }

        let needed = item.encoded_len();
        let remaining = self.limits.max_size.saturating_sub(HEADER_SIZE + self.body.len());
        if needed > remaining {
            self.dropped += 1;
            return Err(SnapshotError::BufferFull { needed, remaining });
        }

        let ty = item.obj_type();
        let mut out = FieldWriter::new(&mut self.body);
        out.u16(ty as u16).u16(ty.payload_size() as u16).u32(id);
        item.write_payload(&mut out);
        debug_assert_eq!(out.written(), needed);
        self.items += 1;
        Ok(())
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn item_count(&self) -> usize {
        self.items
    }

    /// Encoded size so far, header included
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Records rejected because a limit was hit
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.body.len());
        FieldWriter::new(&mut out)
            .u32(self.tick as u32)
            .u16(self.items as u16)
            .bytes(&self.body);
        out
    }
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Snapshot truncated at byte {0}")]
    Truncated(usize),
    #[error("Unknown item type {0}")]
    UnknownType(u16),
    #[error("Item type {ty:?} declares {declared} bytes, expected {expected}")]
    LengthMismatch {
        ty: NetObjType,
        declared: usize,
        expected: usize,
    },
    #[error("Invalid {0} value {1}")]
    InvalidField(&'static str, i32),
    #[error("{0} trailing bytes after last item")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedItem {
    pub id: u32,
    pub item: SnapItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: u32,
    pub items: Vec<DecodedItem>,
}

impl Snapshot {
    /// Items carrying `id`, in wire order
    pub fn items_for(&self, id: u32) -> impl Iterator<Item = &SnapItem> + '_ {
        self.items
            .iter()
            .filter(move |item| item.id == id)
            .map(|item| &item.item)
    }
}

impl From<ShortRead> for DecodeError {
    fn from(err: ShortRead) -> Self {
        DecodeError::Truncated(err.offset)
    }
}

pub fn decode(data: &[u8]) -> Result<Snapshot, DecodeError> {
    let mut reader = FieldReader::new(data);
    if reader.remaining() < HEADER_SIZE {
        return Err(DecodeError::Truncated(0));
    }
    let tick = reader.u32()?;
    let count = reader.u16()?;

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = reader.offset();
        if reader.remaining() < ITEM_HEADER_SIZE {
            return Err(DecodeError::Truncated(start));
        }

        let raw_type = reader.u16()?;
        let declared = reader.u16()? as usize;
        let id = reader.u32()?;

        let ty = NetObjType::from_u16(raw_type).ok_or(DecodeError::UnknownType(raw_type))?;
        if declared != ty.payload_size() {
            return Err(DecodeError::LengthMismatch {
                ty,
                declared,
                expected: ty.payload_size(),
            });
        }
        // Report a short payload against the item, not the field
        if reader.remaining() < declared {
            return Err(DecodeError::Truncated(start));
        }

        let item = SnapItem::read_payload(ty, &mut reader)?;
        items.push(DecodedItem { id, item });
    }

    if !reader.is_exhausted() {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    Ok(Snapshot { tick, items })
}
