//! Field tables for every heap kind.
//!
//! Each [`HeapObject`] declares a [`TypeSchema`] listing its fields in order
//! without committing to a word width. [`TypeLayout::compute`] turns a schema
//! into byte offsets for a given [`LayoutSettings`], so the same description
//! yields the native layout, the 32-bit layout and the 64-bit layout. Tables
//! for other widths are what an image writer or a cross compiler needs.

use serde::Serialize;

use crate::align::{DATA_ALIGNMENT, align, alignment_for};
use crate::error::LayoutError;
use crate::objects::{
    Alien, Array, Bignum, BoxedFloat, ByteArray, Callstack, Dll, HeapObject, Quotation, Tuple,
    TupleLayout, VMString, Word, Wrapper,
};
use crate::types::TypeCode;
use crate::value::{CELL_SIZE, Cell, TAG_MASK};

const DOUBLE_SIZE: usize = 8;

/// One entry in a schema's field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    Header,
    /// A tagged cell the collector traces.
    Tagged(&'static str),
    /// An untagged cell (code address, native handle). Never traced.
    Native(&'static str),
    Double(&'static str),
    /// Padding up to the data alignment. Empty on builds that need none.
    PadToData,
    /// Padding so the next double starts on an 8-byte boundary.
    PadToDouble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    Tagged,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Cell,
    Bytes(usize),
}

impl ElementSize {
    pub const fn bytes(self, cell_size: usize) -> usize {
        match self {
            ElementSize::Cell => cell_size,
            ElementSize::Bytes(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSpec {
    pub name: &'static str,
    pub kind: PayloadKind,
    pub element_size: ElementSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSchema {
    pub name: &'static str,
    pub ty: TypeCode,
    pub fields: &'static [FieldSpec],
    pub payload: Option<PayloadSpec>,
}

/// Schemas of all heap kinds, plus the tuple layout which is an array with
/// named leading elements.
pub const SCHEMAS: [TypeSchema; 13] = [
    Array::SCHEMA,
    BoxedFloat::SCHEMA,
    Quotation::SCHEMA,
    Bignum::SCHEMA,
    Alien::SCHEMA,
    Tuple::SCHEMA,
    Wrapper::SCHEMA,
    ByteArray::SCHEMA,
    Callstack::SCHEMA,
    VMString::SCHEMA,
    Word::SCHEMA,
    Dll::SCHEMA,
    TupleLayout::SCHEMA,
];

/// The build geometry a table is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutSettings {
    /// Bytes per cell: 4 on narrow builds, 8 on wide builds.
    pub cell_size: usize,
    /// Alignment of every heap object.
    pub data_alignment: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            cell_size: CELL_SIZE,
            data_alignment: DATA_ALIGNMENT,
        }
    }
}

impl LayoutSettings {
    pub const fn narrow() -> Self {
        Self {
            cell_size: 4,
            data_alignment: DATA_ALIGNMENT,
        }
    }

    pub const fn wide() -> Self {
        Self {
            cell_size: 8,
            data_alignment: DATA_ALIGNMENT,
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.cell_size != 4 && self.cell_size != 8 {
            return Err(LayoutError::InvalidSettings(format!(
                "cell size must be 4 or 8 bytes, got {}",
                self.cell_size
            )));
        }
        if !self.data_alignment.is_power_of_two() {
            return Err(LayoutError::InvalidSettings(format!(
                "data alignment {} is not a power of two",
                self.data_alignment
            )));
        }
        // The tag must fit below the lowest address bit of an object.
        if self.data_alignment <= TAG_MASK {
            return Err(LayoutError::InvalidSettings(format!(
                "data alignment {} leaves no room for a {}-bit tag",
                self.data_alignment,
                TAG_MASK.count_ones()
            )));
        }
        if self.data_alignment < self.cell_size {
            return Err(LayoutError::InvalidSettings(format!(
                "data alignment {} is smaller than a cell",
                self.data_alignment
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Header,
    Tagged,
    Native,
    Double,
    Padding,
}

impl FieldKind {
    pub const fn is_traced(self) -> bool {
        matches!(self, FieldKind::Tagged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub size: usize,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadLayout {
    pub name: &'static str,
    pub offset: usize,
    pub element_size: usize,
    pub kind: PayloadKind,
}

/// Byte offsets of one kind under one [`LayoutSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeLayout {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: TypeCode,
    pub code: u8,
    pub fields: Vec<FieldLayout>,
    /// Size of the fixed fields, where the payload starts.
    pub fixed_size: usize,
    /// End of the fixed fields the collector traces; the tagged fields form
    /// the contiguous range `[cell_size, traced_end)`.
    pub traced_end: usize,
    pub payload: Option<PayloadLayout>,
    #[serde(skip)]
    data_alignment: usize,
}

impl TypeLayout {
    pub fn compute(schema: &TypeSchema, settings: &LayoutSettings) -> TypeLayout {
        let cell = settings.cell_size;
        let mut offset = 0;
        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut traced_end = cell;

        for spec in schema.fields {
            let (name, size, kind) = match *spec {
                FieldSpec::Header => ("header", cell, FieldKind::Header),
                FieldSpec::Tagged(name) => (name, cell, FieldKind::Tagged),
                FieldSpec::Native(name) => (name, cell, FieldKind::Native),
                FieldSpec::Double(name) => (name, DOUBLE_SIZE, FieldKind::Double),
                FieldSpec::PadToData => (
                    "padding",
                    alignment_for(offset, settings.data_alignment),
                    FieldKind::Padding,
                ),
                FieldSpec::PadToDouble => {
                    ("padding", alignment_for(offset, DOUBLE_SIZE), FieldKind::Padding)
                }
            };
            if size == 0 {
                continue;
            }
            if kind.is_traced() {
                traced_end = offset + size;
            }
            fields.push(FieldLayout {
                name,
                offset,
                size,
                kind,
            });
            offset += size;
        }

        let payload = schema.payload.map(|p| PayloadLayout {
            name: p.name,
            offset,
            element_size: p.element_size.bytes(cell),
            kind: p.kind,
        });

        TypeLayout {
            name: schema.name,
            ty: schema.ty,
            code: schema.ty as u8,
            fields,
            fixed_size: offset,
            traced_end,
            payload,
            data_alignment: settings.data_alignment,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Allocation size of an object with `count` payload elements.
    pub fn object_size(&self, count: Cell) -> usize {
        let element_size = self.payload.as_ref().map_or(0, |p| p.element_size);
        debug_assert!(count == 0 || element_size != 0, "{} has no payload", self.name);
        align(self.fixed_size + count * element_size, self.data_alignment)
    }
}

/// Layouts of every heap kind under `settings`.
pub fn layout_table(settings: &LayoutSettings) -> Result<Vec<TypeLayout>, LayoutError> {
    settings.validate()?;
    log::debug!(
        "computing layout table for {}-byte cells, {}-byte alignment",
        settings.cell_size,
        settings.data_alignment
    );
    Ok(SCHEMAS
        .iter()
        .map(|schema| TypeLayout::compute(schema, settings))
        .collect())
}
