use num_enum::{IntoPrimitive, TryFromPrimitive};

/// "Kaydara FBX Binary  \0" followed by 0x1A 0x00
pub const FBX_MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";
pub const FBX_HEADER_SIZE: usize = 27;
/// Starting with 7.5, node records use 64-bit offsets and counts.
pub const FBX_VERSION_WIDE_OFFSETS: u32 = 7500;
pub const FBX_MIN_VERSION: u32 = 7000;
pub const FBX_MAX_VERSION: u32 = 7999;

/// Separates the name and class part of object names, e.g. "Cube\0\x01Model".
pub const NAME_CLASS_SEPARATOR: &str = "\x00\x01";

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PropertyType {
    I16 = b'Y',
    Bool = b'C',
    I32 = b'I',
    F32 = b'F',
    F64 = b'D',
    I64 = b'L',
    String = b'S',
    Raw = b'R',
    F32Array = b'f',
    F64Array = b'd',
    I64Array = b'l',
    I32Array = b'i',
    BoolArray = b'b',
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum ArrayEncoding {
    Raw = 0,
    Zlib = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FbxProperty {
    I16(i16),
    Bool(bool),
    I32(i32),
    F32(f32),
    F64(f64),
    I64(i64),
    String(String),
    Raw(Vec<u8>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    I32Array(Vec<i32>),
    BoolArray(Vec<bool>),
}

impl FbxProperty {
    pub fn property_type(&self) -> PropertyType {
        match self {
            FbxProperty::I16(_) => PropertyType::I16,
            FbxProperty::Bool(_) => PropertyType::Bool,
            FbxProperty::I32(_) => PropertyType::I32,
            FbxProperty::F32(_) => PropertyType::F32,
            FbxProperty::F64(_) => PropertyType::F64,
            FbxProperty::I64(_) => PropertyType::I64,
            FbxProperty::String(_) => PropertyType::String,
            FbxProperty::Raw(_) => PropertyType::Raw,
            FbxProperty::F32Array(_) => PropertyType::F32Array,
            FbxProperty::F64Array(_) => PropertyType::F64Array,
            FbxProperty::I64Array(_) => PropertyType::I64Array,
            FbxProperty::I32Array(_) => PropertyType::I32Array,
            FbxProperty::BoolArray(_) => PropertyType::BoolArray,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FbxProperty::String(value) => Some(value),
            _ => None,
        }
    }

    /// Any integer scalar, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FbxProperty::I16(value) => Some(*value as i64),
            FbxProperty::I32(value) => Some(*value as i64),
            FbxProperty::I64(value) => Some(*value),
            _ => None,
        }
    }

    /// Any numeric scalar, widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FbxProperty::F32(value) => Some(*value as f64),
            FbxProperty::F64(value) => Some(*value),
            _ => self.as_i64().map(|value| value as f64),
        }
    }

    /// Float arrays of either precision.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            FbxProperty::F64Array(values) => Some(values.clone()),
            FbxProperty::F32Array(values) => Some(values.iter().map(|&v| v as f64).collect()),
            _ => None,
        }
    }

    /// Integer arrays of either width, narrowed to i32 (FBX indices always fit).
    pub fn to_i32_vec(&self) -> Option<Vec<i32>> {
        match self {
            FbxProperty::I32Array(values) => Some(values.clone()),
            FbxProperty::I64Array(values) => Some(values.iter().map(|&v| v as i32).collect()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<FbxProperty>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: &str, properties: Vec<FbxProperty>, children: Vec<FbxNode>) -> Self {
        Self {
            name: name.to_string(),
            properties,
            children,
        }
    }

    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&FbxProperty> {
        self.properties.get(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    pub fn node(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Children of the top-level `Objects` node with the given record name (`Geometry`, `Model`, ...).
    pub fn objects<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.node("Objects")
            .into_iter()
            .flat_map(move |objects| objects.children_named(kind))
    }
}

/// Strips the class suffix from an object name: "Cube\0\x01Model" becomes "Cube".
/// Older exporters write "Model::Cube" instead.
pub fn object_display_name(raw: &str) -> &str {
    if let Some((name, _class)) = raw.split_once(NAME_CLASS_SEPARATOR) {
        return name;
    }

    raw.split_once("::").map_or(raw, |(_class, name)| name)
}
