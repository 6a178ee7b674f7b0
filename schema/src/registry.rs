//! Append-only registry of serializers and classes.

use std::collections::{BTreeMap, HashMap};

use crate::field::{EncoderFlags, FieldEncoding, FieldKind, FieldType};
use crate::path::{FieldPath, MAX_PATH_DEPTH};
use crate::serializer::{ClassInfo, Serializer};

/// A resolved, addressable property of a class.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PropertyDescriptor {
    /// Flattened dotted name, e.g. `m_pWeaponServices.m_hMyWeapons.0002`.
    pub name: String,
    pub path: FieldPath,
    pub type_tag: FieldType,
    pub bit_width: u8,
    pub encoder_flags: EncoderFlags,
    pub encoding: FieldEncoding,
}

/// Result of resolving a property by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(PropertyDescriptor),
    NotFound,
}

impl Lookup {
    /// Returns the descriptor if the property exists.
    #[must_use]
    pub fn found(self) -> Option<PropertyDescriptor> {
        match self {
            Self::Found(descriptor) => Some(descriptor),
            Self::NotFound => None,
        }
    }

    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// The flattened property list of a class.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClassSchema {
    pub class_id: u32,
    pub class_name: String,
    pub serializer: String,
    /// Properties in path order. Fixed arrays are expanded; dynamic vectors
    /// contribute only their length property.
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassSchema {
    /// Finds a property by its flattened name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Value shape at the end of a path walk.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    encoding: FieldEncoding,
    field_type: FieldType,
}

impl Leaf {
    const fn value(encoding: FieldEncoding) -> Self {
        Self {
            encoding,
            field_type: encoding.field_type(),
        }
    }

    const fn length() -> Self {
        Self {
            encoding: FieldEncoding::VarUInt,
            field_type: FieldType::Array,
        }
    }

    fn describe(self, name: String, path: FieldPath) -> PropertyDescriptor {
        PropertyDescriptor {
            name,
            path,
            type_tag: self.field_type,
            bit_width: if self.field_type == FieldType::Array {
                0
            } else {
                self.encoding.bit_width()
            },
            encoder_flags: self.encoding.encoder_flags(),
            encoding: self.encoding,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment<'a> {
    Field(&'a str),
    Index(u32),
}

/// Registry of serializers and classes seen so far in a recording.
///
/// Entries are only ever added. A serializer or class declared a second
/// time keeps its first definition.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    serializers: Vec<Serializer>,
    serializer_index: HashMap<String, usize>,
    classes: BTreeMap<u32, ClassInfo>,
    class_names: HashMap<String, u32>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds serializers, returning how many were new.
    pub fn add_serializers(&mut self, serializers: impl IntoIterator<Item = Serializer>) -> usize {
        let mut added = 0;
        for serializer in serializers {
            if self.serializer_index.contains_key(&serializer.name) {
                continue;
            }
            self.serializer_index
                .insert(serializer.name.clone(), self.serializers.len());
            self.serializers.push(serializer);
            added += 1;
        }
        added
    }

    /// Adds classes, returning how many were new.
    pub fn add_classes(&mut self, classes: impl IntoIterator<Item = ClassInfo>) -> usize {
        let mut added = 0;
        for class in classes {
            if self.classes.contains_key(&class.class_id) {
                continue;
            }
            self.class_names
                .entry(class.name.clone())
                .or_insert(class.class_id);
            self.classes.insert(class.class_id, class);
            added += 1;
        }
        added
    }

    /// Returns a serializer by name.
    #[must_use]
    pub fn serializer(&self, name: &str) -> Option<&Serializer> {
        self.serializer_index
            .get(name)
            .map(|&index| &self.serializers[index])
    }

    /// Returns serializers in the order they were added.
    pub fn serializers(&self) -> impl Iterator<Item = &Serializer> {
        self.serializers.iter()
    }

    #[must_use]
    pub fn class(&self, class_id: u32) -> Option<&ClassInfo> {
        self.classes.get(&class_id)
    }

    #[must_use]
    pub fn class_by_name(&self, name: &str) -> Option<&ClassInfo> {
        self.class_names
            .get(name)
            .and_then(|id| self.classes.get(id))
    }

    /// Returns classes in id order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn serializer_count(&self) -> usize {
        self.serializers.len()
    }

    /// Returns the serializer bound to a class.
    #[must_use]
    pub fn class_serializer(&self, class_id: u32) -> Option<&Serializer> {
        self.class(class_id)
            .and_then(|class| self.serializer(&class.serializer))
    }

    /// Returns the value encoding at `path`, or `None` if the path does not
    /// address a value of this class.
    #[must_use]
    pub fn encoding(&self, class_id: u32, path: &FieldPath) -> Option<FieldEncoding> {
        let root = self.class_serializer(class_id)?;
        self.walk(root, path.as_slice(), &mut |_| {})
            .map(|leaf| leaf.encoding)
    }

    /// Returns the full descriptor of the property at `path`.
    #[must_use]
    pub fn descriptor_for_path(&self, class_id: u32, path: &FieldPath) -> Option<PropertyDescriptor> {
        let root = self.class_serializer(class_id)?;
        let mut name = String::new();
        let leaf = self.walk(root, path.as_slice(), &mut |segment| {
            push_segment(&mut name, segment);
        })?;
        Some(leaf.describe(name, *path))
    }

    /// Returns the flattened name of the property at `path`.
    #[must_use]
    pub fn path_name(&self, class_id: u32, path: &FieldPath) -> Option<String> {
        self.descriptor_for_path(class_id, path).map(|d| d.name)
    }

    /// Resolves a flattened property name for a class.
    ///
    /// Index segments may be written with or without zero padding.
    #[must_use]
    pub fn resolve(&self, class_id: u32, name: &str) -> Lookup {
        self.resolve_path(class_id, name)
            .and_then(|path| self.descriptor_for_path(class_id, &path))
            .map_or(Lookup::NotFound, Lookup::Found)
    }

    fn resolve_path(&self, class_id: u32, name: &str) -> Option<FieldPath> {
        let mut serializer = self.class_serializer(class_id)?;
        let mut components = Vec::with_capacity(MAX_PATH_DEPTH);
        let mut segments = name.split('.');
        loop {
            let index = serializer.field_index(segments.next()?)?;
            components.push(index);
            let field = serializer.field(index)?;
            match &field.kind {
                FieldKind::Value => break,
                FieldKind::FixedArray(_) => {
                    components.push(parse_index(segments.next()?)?);
                    break;
                }
                FieldKind::Vector => {
                    if let Some(segment) = segments.next() {
                        components.push(parse_index(segment)?);
                    }
                    break;
                }
                FieldKind::Table(child) => {
                    serializer = self.serializer(child)?;
                }
                FieldKind::TableVector(child) => match segments.next() {
                    Some(segment) => {
                        components.push(parse_index(segment)?);
                        serializer = self.serializer(child)?;
                    }
                    None => break,
                },
            }
        }
        if segments.next().is_some() {
            return None;
        }
        FieldPath::new(&components)
    }

    /// Lists every statically addressable property of a class.
    #[must_use]
    pub fn class_schema(&self, class_id: u32) -> Option<ClassSchema> {
        let class = self.class(class_id)?;
        let root = self.serializer(&class.serializer)?;
        let mut properties = Vec::new();
        let mut prefix = Vec::with_capacity(MAX_PATH_DEPTH);
        self.collect(root, &mut prefix, "", &mut properties);
        Some(ClassSchema {
            class_id,
            class_name: class.name.clone(),
            serializer: class.serializer.clone(),
            properties,
        })
    }

    fn collect(
        &self,
        serializer: &Serializer,
        prefix: &mut Vec<u32>,
        name_prefix: &str,
        out: &mut Vec<PropertyDescriptor>,
    ) {
        for (index, field) in serializer.fields().iter().enumerate() {
            prefix.push(index as u32);
            let name = if name_prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{name_prefix}.{}", field.name)
            };
            match &field.kind {
                FieldKind::Value => {
                    if let Some(path) = FieldPath::new(prefix) {
                        out.push(Leaf::value(field.encoding).describe(name, path));
                    }
                }
                FieldKind::FixedArray(len) => {
                    for element in 0..*len {
                        prefix.push(element);
                        if let Some(path) = FieldPath::new(prefix) {
                            out.push(
                                Leaf::value(field.encoding)
                                    .describe(format!("{name}.{element:04}"), path),
                            );
                        }
                        prefix.pop();
                    }
                }
                FieldKind::Vector | FieldKind::TableVector(_) => {
                    if let Some(path) = FieldPath::new(prefix) {
                        out.push(Leaf::length().describe(name, path));
                    }
                }
                FieldKind::Table(child) => {
                    if prefix.len() < MAX_PATH_DEPTH {
                        if let Some(child) = self.serializer(child) {
                            self.collect(child, prefix, &name, out);
                        }
                    }
                }
            }
            prefix.pop();
        }
    }

    fn walk<'s>(
        &'s self,
        root: &'s Serializer,
        path: &[u32],
        visit: &mut dyn FnMut(Segment<'s>),
    ) -> Option<Leaf> {
        let mut serializer = root;
        let mut rest = path;
        loop {
            let (&index, tail) = rest.split_first()?;
            let field = serializer.field(index)?;
            visit(Segment::Field(&field.name));
            rest = tail;
            match &field.kind {
                FieldKind::Value => return rest.is_empty().then(|| Leaf::value(field.encoding)),
                FieldKind::FixedArray(len) => {
                    let [element] = rest else { return None };
                    if element >= len {
                        return None;
                    }
                    visit(Segment::Index(*element));
                    return Some(Leaf::value(field.encoding));
                }
                FieldKind::Vector => {
                    return match rest {
                        [] => Some(Leaf::length()),
                        [element] => {
                            visit(Segment::Index(*element));
                            Some(Leaf::value(field.encoding))
                        }
                        _ => None,
                    };
                }
                FieldKind::Table(child) => {
                    if rest.is_empty() {
                        return None;
                    }
                    serializer = self.serializer(child)?;
                }
                FieldKind::TableVector(child) => {
                    let (&element, tail) = match rest.split_first() {
                        Some(split) => split,
                        None => return Some(Leaf::length()),
                    };
                    if tail.is_empty() {
                        return None;
                    }
                    visit(Segment::Index(element));
                    rest = tail;
                    serializer = self.serializer(child)?;
                }
            }
        }
    }
}

fn push_segment(name: &mut String, segment: Segment<'_>) {
    use std::fmt::Write;

    if !name.is_empty() {
        name.push('.');
    }
    match segment {
        Segment::Field(field) => name.push_str(field),
        Segment::Index(index) => {
            let _ = write!(name, "{index:04}");
        }
    }
}

fn parse_index(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDecl, FloatEncoding};

    fn registry() -> SchemaRegistry {
        let pawn = Serializer::builder("CCSPlayerPawn")
            .field(FieldDecl::value("m_iHealth", FieldEncoding::VarInt))
            .field(FieldDecl::value(
                "m_vecOrigin",
                FieldEncoding::Vector {
                    dims: 3,
                    element: FloatEncoding::Coord,
                },
            ))
            .field(FieldDecl::array("m_iAmmo", 4, FieldEncoding::VarUInt))
            .field(FieldDecl::table("m_pWeaponServices", "CWeaponServices"))
            .build()
            .unwrap();
        let services = Serializer::builder("CWeaponServices")
            .field(FieldDecl::vector("m_hMyWeapons", FieldEncoding::Bits(21)))
            .field(FieldDecl::table_vector("m_Slots", "CSlot"))
            .build()
            .unwrap();
        let slot = Serializer::builder("CSlot")
            .field(FieldDecl::value("m_nCount", FieldEncoding::VarUInt))
            .build()
            .unwrap();

        let mut registry = SchemaRegistry::new();
        assert_eq!(registry.add_serializers([pawn, services, slot]), 3);
        assert_eq!(
            registry.add_classes([ClassInfo::new(40, "CCSPlayerPawn", "CCSPlayerPawn")]),
            1
        );
        registry
    }

    fn path(components: &[u32]) -> FieldPath {
        FieldPath::new(components).unwrap()
    }

    #[test]
    fn resolve_simple_value() {
        let registry = registry();
        let found = registry.resolve(40, "m_iHealth").found().unwrap();
        assert_eq!(found.path, path(&[0]));
        assert_eq!(found.type_tag, FieldType::Int);
        assert_eq!(found.encoding, FieldEncoding::VarInt);
    }

    #[test]
    fn resolve_array_element_accepts_unpadded_index() {
        let registry = registry();
        let padded = registry.resolve(40, "m_iAmmo.0002").found().unwrap();
        let bare = registry.resolve(40, "m_iAmmo.2").found().unwrap();
        assert_eq!(padded, bare);
        assert_eq!(padded.path, path(&[2, 2]));
        assert_eq!(padded.name, "m_iAmmo.0002");
    }

    #[test]
    fn resolve_out_of_range_element_is_not_found() {
        let registry = registry();
        assert_eq!(registry.resolve(40, "m_iAmmo.0004"), Lookup::NotFound);
        assert_eq!(registry.resolve(40, "m_iAmmo"), Lookup::NotFound);
        assert_eq!(registry.resolve(40, "m_iAmmo.+1"), Lookup::NotFound);
    }

    #[test]
    fn resolve_nested_tables() {
        let registry = registry();
        let length = registry
            .resolve(40, "m_pWeaponServices.m_hMyWeapons")
            .found()
            .unwrap();
        assert_eq!(length.type_tag, FieldType::Array);
        assert_eq!(length.path, path(&[3, 0]));

        let element = registry
            .resolve(40, "m_pWeaponServices.m_hMyWeapons.0001")
            .found()
            .unwrap();
        assert_eq!(element.encoding, FieldEncoding::Bits(21));
        assert_eq!(element.bit_width, 21);

        let slot = registry
            .resolve(40, "m_pWeaponServices.m_Slots.0003.m_nCount")
            .found()
            .unwrap();
        assert_eq!(slot.path, path(&[3, 1, 3, 0]));
    }

    #[test]
    fn resolve_unknowns() {
        let registry = registry();
        assert!(!registry.resolve(40, "m_nope").is_found());
        assert!(!registry.resolve(41, "m_iHealth").is_found());
        assert!(!registry.resolve(40, "m_iHealth.0000").is_found());
        assert!(!registry.resolve(40, "m_pWeaponServices").is_found());
    }

    #[test]
    fn path_name_matches_resolve() {
        let registry = registry();
        let name = registry.path_name(40, &path(&[3, 1, 12, 0])).unwrap();
        assert_eq!(name, "m_pWeaponServices.m_Slots.0012.m_nCount");
        let back = registry.resolve(40, &name).found().unwrap();
        assert_eq!(back.path, path(&[3, 1, 12, 0]));
    }

    #[test]
    fn encoding_rejects_non_values() {
        let registry = registry();
        assert!(registry.encoding(40, &path(&[3])).is_none());
        assert!(registry.encoding(40, &path(&[0, 1])).is_none());
        assert!(registry.encoding(40, &path(&[9])).is_none());
        assert_eq!(
            registry.encoding(40, &path(&[3, 1])),
            Some(FieldEncoding::VarUInt)
        );
    }

    #[test]
    fn class_schema_flattens() {
        let registry = registry();
        let schema = registry.class_schema(40).unwrap();
        let names: Vec<_> = schema.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "m_iHealth",
                "m_vecOrigin",
                "m_iAmmo.0000",
                "m_iAmmo.0001",
                "m_iAmmo.0002",
                "m_iAmmo.0003",
                "m_pWeaponServices.m_hMyWeapons",
                "m_pWeaponServices.m_Slots",
            ]
        );
        assert_eq!(
            schema.property("m_vecOrigin").unwrap().type_tag,
            FieldType::Vector
        );
    }

    #[test]
    fn redeclaration_keeps_first() {
        let mut registry = registry();
        let replacement = Serializer::builder("CCSPlayerPawn")
            .field(FieldDecl::value("m_bOther", FieldEncoding::Bool))
            .build()
            .unwrap();
        assert_eq!(registry.add_serializers([replacement]), 0);
        assert_eq!(
            registry.add_classes([ClassInfo::new(40, "Other", "CSlot")]),
            0
        );
        assert!(registry.resolve(40, "m_iHealth").is_found());
        assert_eq!(registry.class(40).unwrap().name, "CCSPlayerPawn");
        assert_eq!(registry.class_by_name("CCSPlayerPawn").unwrap().class_id, 40);
    }

    #[test]
    fn self_referencing_table_terminates() {
        let node = Serializer::builder("Node")
            .field(FieldDecl::value("v", FieldEncoding::Bool))
            .field(FieldDecl::table("next", "Node"))
            .build()
            .unwrap();
        let mut registry = SchemaRegistry::new();
        registry.add_serializers([node]);
        registry.add_classes([ClassInfo::new(1, "Node", "Node")]);
        let schema = registry.class_schema(1).unwrap();
        assert_eq!(schema.properties.len(), MAX_PATH_DEPTH);
    }
}
