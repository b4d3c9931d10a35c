//! Canonical types.
//!
//! A C type is stored as a chain of single layers: each entry wraps an
//! `inner` type index, terminated at the NONE sentinel (index 0). The
//! table is append-only and uniquing: for any `(inner, layer, flags)`
//! triple at most one entry exists, so type equality is index equality.
//!
//! Storage class is deliberately not part of the type; it lives on the
//! declaration's scope entry.

use crate::intern::Symbol;
use std::fmt;

/// Index into the translation unit's type table. Index 0 is the
/// reserved NONE sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const NONE: TypeId = TypeId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

bitflags::bitflags! {
    /// Type qualifiers, function specifiers, and the alignas field.
    ///
    /// Bits 6..10 hold log2 of an `alignas` requirement; `alignas(32)`
    /// is stored as `5 << ALIGNAS_SHIFT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeFlags: u16 {
        const ATOMIC = 1 << 0;
        const CONST = 1 << 1;
        const VOLATILE = 1 << 2;
        const RESTRICT = 1 << 3;
        const INLINE = 1 << 4;
        const NORETURN = 1 << 5;
        const ALIGNAS_MASK = 0xf << TypeFlags::ALIGNAS_SHIFT;
    }
}

impl TypeFlags {
    pub const ALIGNAS_SHIFT: u16 = 6;

    /// Store an alignment requirement of `1 << log2` bytes.
    pub fn with_alignas_log2(self, log2: u16) -> TypeFlags {
        let bits = (self.bits() & !Self::ALIGNAS_MASK.bits()) | ((log2 & 0xf) << Self::ALIGNAS_SHIFT);
        TypeFlags::from_bits_retain(bits)
    }

    /// The alignas requirement in bytes, if one was set.
    pub fn alignas_bytes(self) -> Option<u64> {
        let log2 = (self.bits() & Self::ALIGNAS_MASK.bits()) >> Self::ALIGNAS_SHIFT;
        if log2 == 0 { None } else { Some(1 << log2) }
    }
}

/// A named member of a struct or union layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Symbol,
    pub ty: TypeId,
}

/// One layer of a type chain.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeLayer {
    Void,
    SignedChar,
    SignedShort,
    SignedInt,
    SignedLong,
    SignedLongLong,
    UnsignedChar,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    UnsignedLongLong,
    Bool,
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
    /// `auto` in a declaration; must be replaced before sizing.
    Auto,
    Pointer,
    Array,
    Function {
        params: Vec<TypeId>,
    },
    /// The inner type is the enum's integer base.
    Enum,
    Struct {
        fields: Vec<Field>,
    },
    Union {
        fields: Vec<Field>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    pub layer: TypeLayer,
    pub flags: TypeFlags,
    pub inner: TypeId,
}

#[derive(Debug)]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
}

impl TypeTable {
    pub fn new() -> Self {
        // Entry 0 is the NONE sentinel and never returned by lookup.
        TypeTable {
            entries: vec![TypeEntry {
                layer: TypeLayer::Void,
                flags: TypeFlags::empty(),
                inner: TypeId::NONE,
            }],
        }
    }

    pub fn entry(&self, id: TypeId) -> &TypeEntry {
        &self.entries[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the unique id for `(inner, layer, flags)`, appending a new
    /// entry only if the triple has not been seen before.
    pub fn find_or_create(&mut self, inner: TypeId, layer: TypeLayer, flags: TypeFlags) -> TypeId {
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.inner == inner && entry.flags == flags && entry.layer == layer {
                return TypeId(i as u32);
            }
        }
        self.entries.push(TypeEntry {
            layer,
            flags,
            inner,
        });
        TypeId(self.entries.len() as u32 - 1)
    }

    /// True if any entry with this layer exists (regardless of inner or
    /// flags).
    pub fn contains_layer(&self, layer: &TypeLayer) -> bool {
        self.entries.iter().skip(1).any(|e| e.layer == *layer)
    }

    /// Object size in bytes, ILP64-like.
    pub fn size_of(&self, id: TypeId) -> Result<u64, String> {
        let entry = self.entry(id);
        match &entry.layer {
            TypeLayer::ComplexDouble | TypeLayer::ComplexLongDouble => Ok(16),
            TypeLayer::Pointer
            | TypeLayer::SignedLong
            | TypeLayer::UnsignedLong
            | TypeLayer::SignedLongLong
            | TypeLayer::UnsignedLongLong
            | TypeLayer::Double
            | TypeLayer::LongDouble
            | TypeLayer::ComplexFloat => Ok(8),
            TypeLayer::SignedInt | TypeLayer::UnsignedInt | TypeLayer::Float => Ok(4),
            TypeLayer::SignedShort | TypeLayer::UnsignedShort => Ok(2),
            TypeLayer::SignedChar | TypeLayer::UnsignedChar | TypeLayer::Bool => Ok(1),
            TypeLayer::Void => Ok(0),
            TypeLayer::Enum => self.size_of(entry.inner),
            TypeLayer::Struct { .. } | TypeLayer::Union { .. } => {
                Err("struct and union type sizes are not implemented".to_string())
            }
            TypeLayer::Array => Err("array type sizes are not implemented".to_string()),
            TypeLayer::Function { .. } => Err("function types do not have a size".to_string()),
            TypeLayer::Auto => Err("auto must be resolved before sizing".to_string()),
        }
    }

    /// Alignment in bytes.
    pub fn align_of(&self, id: TypeId) -> Result<u64, String> {
        let entry = self.entry(id);
        match &entry.layer {
            TypeLayer::ComplexDouble
            | TypeLayer::ComplexLongDouble
            | TypeLayer::ComplexFloat
            | TypeLayer::Pointer
            | TypeLayer::SignedLong
            | TypeLayer::UnsignedLong
            | TypeLayer::SignedLongLong
            | TypeLayer::UnsignedLongLong
            | TypeLayer::Double
            | TypeLayer::LongDouble => Ok(8),
            TypeLayer::SignedInt | TypeLayer::UnsignedInt | TypeLayer::Float => Ok(4),
            TypeLayer::SignedShort | TypeLayer::UnsignedShort => Ok(2),
            TypeLayer::SignedChar | TypeLayer::UnsignedChar | TypeLayer::Bool => Ok(1),
            TypeLayer::Void => Ok(0),
            TypeLayer::Enum | TypeLayer::Array => self.align_of(entry.inner),
            TypeLayer::Struct { .. } | TypeLayer::Union { .. } => {
                Err("struct and union type alignments are not implemented".to_string())
            }
            TypeLayer::Function { .. } => {
                Err("function types do not have an alignment".to_string())
            }
            TypeLayer::Auto => Err("auto must be resolved before sizing".to_string()),
        }
    }

    /// Prefix-qualifier rendering, read outside-in:
    /// `const pointer to array [] of int`.
    pub fn render(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: TypeId, out: &mut String) {
        if id.is_none() {
            out.push_str("(none)");
            return;
        }
        let entry = self.entry(id);

        for (flag, name) in [
            (TypeFlags::ATOMIC, "atomic "),
            (TypeFlags::CONST, "const "),
            (TypeFlags::VOLATILE, "volatile "),
            (TypeFlags::RESTRICT, "restrict "),
            (TypeFlags::INLINE, "inline "),
            (TypeFlags::NORETURN, "noreturn "),
        ] {
            if entry.flags.contains(flag) {
                out.push_str(name);
            }
        }

        let keyword = match &entry.layer {
            TypeLayer::Void => "void",
            TypeLayer::SignedChar => "char",
            TypeLayer::SignedShort => "short",
            TypeLayer::SignedInt => "int",
            TypeLayer::SignedLong => "long",
            TypeLayer::SignedLongLong => "long long",
            TypeLayer::UnsignedChar => "unsigned char",
            TypeLayer::UnsignedShort => "unsigned short",
            TypeLayer::UnsignedInt => "unsigned int",
            TypeLayer::UnsignedLong => "unsigned long",
            TypeLayer::UnsignedLongLong => "unsigned long long",
            TypeLayer::Bool => "bool",
            TypeLayer::Float => "float",
            TypeLayer::Double => "double",
            TypeLayer::LongDouble => "long double",
            TypeLayer::ComplexFloat => "complex float",
            TypeLayer::ComplexDouble => "complex double",
            TypeLayer::ComplexLongDouble => "complex long double",
            TypeLayer::Auto => "auto",
            TypeLayer::Pointer => "pointer to",
            TypeLayer::Array => "array [] of",
            TypeLayer::Function { .. } => "function () returning",
            TypeLayer::Enum => "(enum)",
            TypeLayer::Struct { .. } => "(struct)",
            TypeLayer::Union { .. } => "(union)",
        };
        out.push_str(keyword);

        if let Some(bytes) = entry.flags.alignas_bytes() {
            let _ = fmt::Write::write_fmt(out, format_args!(" alignas({})", bytes));
        }

        if !entry.inner.is_none() {
            out.push(' ');
            self.render_into(entry.inner, out);
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage-class specifiers. Not part of type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Auto,
    Constexpr,
    Extern,
    Register,
    Static,
    ThreadLocal,
    Typedef,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageClass::Auto => "auto",
            StorageClass::Constexpr => "constexpr",
            StorageClass::Extern => "extern",
            StorageClass::Register => "register",
            StorageClass::Static => "static",
            StorageClass::ThreadLocal => "thread_local",
            StorageClass::Typedef => "typedef",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_is_idempotent() {
        let mut table = TypeTable::new();
        let a = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let b = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        assert_eq!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_distinct_triples_get_distinct_ids() {
        let mut table = TypeTable::new();
        let int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let const_int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::CONST);
        let ptr = table.find_or_create(int, TypeLayer::Pointer, TypeFlags::empty());
        assert_ne!(int, const_int);
        assert_ne!(int, ptr);
        assert_ne!(const_int, ptr);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_sentinel_is_never_returned() {
        let mut table = TypeTable::new();
        // Plain void must not collide with the zeroed sentinel entry.
        let void = table.find_or_create(TypeId::NONE, TypeLayer::Void, TypeFlags::empty());
        assert!(!void.is_none());
    }

    #[test]
    fn test_chain_render() {
        let mut table = TypeTable::new();
        let int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let arr = table.find_or_create(int, TypeLayer::Array, TypeFlags::empty());
        let ptr = table.find_or_create(arr, TypeLayer::Pointer, TypeFlags::CONST);
        assert_eq!(table.render(ptr), "const pointer to array [] of int");
    }

    #[test]
    fn test_alignas_flags_roundtrip() {
        let flags = TypeFlags::CONST.with_alignas_log2(5);
        assert_eq!(flags.alignas_bytes(), Some(32));
        assert!(flags.contains(TypeFlags::CONST));
    }

    #[test]
    fn test_alignas_render() {
        let mut table = TypeTable::new();
        let flags = TypeFlags::empty().with_alignas_log2(4);
        let int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, flags);
        assert_eq!(table.render(int), "int alignas(16)");
    }

    #[test]
    fn test_primitive_sizes() {
        let mut table = TypeTable::new();
        let cases = [
            (TypeLayer::SignedChar, 1),
            (TypeLayer::Bool, 1),
            (TypeLayer::SignedShort, 2),
            (TypeLayer::SignedInt, 4),
            (TypeLayer::Float, 4),
            (TypeLayer::SignedLong, 8),
            (TypeLayer::SignedLongLong, 8),
            (TypeLayer::Double, 8),
            (TypeLayer::LongDouble, 8),
            (TypeLayer::ComplexFloat, 8),
            (TypeLayer::ComplexDouble, 16),
        ];
        for (layer, size) in cases {
            let id = table.find_or_create(TypeId::NONE, layer, TypeFlags::empty());
            assert_eq!(table.size_of(id).unwrap(), size);
        }
    }

    #[test]
    fn test_pointer_size() {
        let mut table = TypeTable::new();
        let ch = table.find_or_create(TypeId::NONE, TypeLayer::SignedChar, TypeFlags::empty());
        let ptr = table.find_or_create(ch, TypeLayer::Pointer, TypeFlags::empty());
        assert_eq!(table.size_of(ptr).unwrap(), 8);
        assert_eq!(table.align_of(ptr).unwrap(), 8);
    }

    #[test]
    fn test_enum_size_defers_to_base() {
        let mut table = TypeTable::new();
        let int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let en = table.find_or_create(int, TypeLayer::Enum, TypeFlags::empty());
        assert_eq!(table.size_of(en).unwrap(), 4);
    }

    #[test]
    fn test_struct_size_is_unimplemented() {
        let mut table = TypeTable::new();
        let st = table.find_or_create(
            TypeId::NONE,
            TypeLayer::Struct { fields: Vec::new() },
            TypeFlags::empty(),
        );
        assert!(table.size_of(st).is_err());
    }

    #[test]
    fn test_array_align_defers_to_element() {
        let mut table = TypeTable::new();
        let short = table.find_or_create(TypeId::NONE, TypeLayer::SignedShort, TypeFlags::empty());
        let arr = table.find_or_create(short, TypeLayer::Array, TypeFlags::empty());
        assert_eq!(table.align_of(arr).unwrap(), 2);
        assert!(table.size_of(arr).is_err());
    }

    #[test]
    fn test_function_layers_with_different_params_are_distinct() {
        let mut table = TypeTable::new();
        let int = table.find_or_create(TypeId::NONE, TypeLayer::SignedInt, TypeFlags::empty());
        let ch = table.find_or_create(TypeId::NONE, TypeLayer::SignedChar, TypeFlags::empty());
        let f1 = table.find_or_create(int, TypeLayer::Function { params: vec![ch] }, TypeFlags::empty());
        let f2 = table.find_or_create(int, TypeLayer::Function { params: vec![int] }, TypeFlags::empty());
        let f3 = table.find_or_create(int, TypeLayer::Function { params: vec![ch] }, TypeFlags::empty());
        assert_ne!(f1, f2);
        assert_eq!(f1, f3);
    }
}
