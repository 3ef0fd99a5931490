//! SOME/IP payload datatypes and method parameters.

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::discriminator::{Discriminator, Variant};
use crate::builder::reader::{int_literal, literal, BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::util::diagnostic::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Endianness {
    #[default]
    #[serde(rename = "BE")]
    Big,
    #[serde(rename = "LE")]
    Little,
}

impl FromNode for Endianness {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        literal(node, path, errs, &[("BE", Endianness::Big), ("LE", Endianness::Little)])
    }
}

/// A fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Primitive {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endianness: Endianness,
}

fn primitive(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Primitive> {
    let mut map = MapReader::open(node, path, errs)?;
    let name = map.optional::<String>("name", errs);
    let description = map.optional::<String>("description", errs);
    let endianness = map.optional::<Endianness>("endianness", errs);
    map.finish(errs)?;
    Some(Primitive {
        name,
        description,
        endianness: endianness.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<Datatype>,
}

/// One array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimension {
    Fixed { length: u32 },
    /// Length carried on the wire in a field of this many bits
    Dynamic { length_of_length_field: u8 },
}

fn fixed_dimension(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Dimension> {
    let mut map = MapReader::open(node, path, errs)?;
    let length = map.required_in("length", 1..=u32::MAX, errs);
    map.finish(errs)?;
    Some(Dimension::Fixed { length: length? })
}

fn dynamic_dimension(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Dimension> {
    let mut map = MapReader::open(node, path, errs)?;
    let bits = map.required_with("length_of_length_field", errs, |n, p, e| int_literal(n, p, e, &[8u8, 16, 32]));
    map.finish(errs)?;
    Some(Dimension::Dynamic {
        length_of_length_field: bits?,
    })
}

pub const DIMENSION: Discriminator<Dimension> = Discriminator {
    subject: "array dimension",
    tag_field: "kind",
    variants: &[
        Variant {
            tag: "fixed",
            build: fixed_dimension,
        },
        Variant {
            tag: "dynamic",
            build: dynamic_dimension,
        },
    ],
};

impl FromNode for Dimension {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        DIMENSION.resolve(node, path, errs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub dimensions: Vec<Dimension>,
    pub element_type: Box<Datatype>,
}

/// A SOME/IP serializable type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Datatype {
    Uint8(Primitive),
    Uint16(Primitive),
    Uint32(Primitive),
    Sint8(Primitive),
    Sint16(Primitive),
    Sint32(Primitive),
    Struct(StructType),
    Array(ArrayType),
}

impl Datatype {
    pub fn name(&self) -> Option<&str> {
        match self {
            Datatype::Uint8(p)
            | Datatype::Uint16(p)
            | Datatype::Uint32(p)
            | Datatype::Sint8(p)
            | Datatype::Sint16(p)
            | Datatype::Sint32(p) => p.name.as_deref(),
            Datatype::Struct(s) => Some(&s.name),
            Datatype::Array(a) => Some(&a.name),
        }
    }
}

macro_rules! primitive_builders {
    ($($builder:ident => $variant:ident),*) => {
        $(
            fn $builder(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Datatype> {
                primitive(node, path, errs).map(Datatype::$variant)
            }
        )*
    };
}

primitive_builders!(
    uint8 => Uint8,
    uint16 => Uint16,
    uint32 => Uint32,
    sint8 => Sint8,
    sint16 => Sint16,
    sint32 => Sint32
);

fn struct_type(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Datatype> {
    let mut map = MapReader::open(node, path, errs)?;
    let name = map.required::<String>("name", errs);
    let description = map.optional::<String>("description", errs);
    let members_path = map.field("members");
    let members = map.required::<Vec<Datatype>>("members", errs);
    map.finish(errs)?;

    let members = members?;
    if members.is_empty() {
        errs.error(
            DiagnosticKind::ValueError,
            &members_path,
            "List should have at least 1 item after validation, not 0",
        );
        return None;
    }
    Some(Datatype::Struct(StructType {
        name: name?,
        description,
        members,
    }))
}

fn array_type(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Datatype> {
    let mut map = MapReader::open(node, path, errs)?;
    let name = map.required::<String>("name", errs);
    let description = map.optional::<String>("description", errs);
    let dimensions_path = map.field("dimensions");
    let dimensions = map.required::<Vec<Dimension>>("dimensions", errs);
    let element_type = map.required::<Datatype>("element_type", errs);
    map.finish(errs)?;

    let dimensions = dimensions?;
    if dimensions.is_empty() {
        errs.error(
            DiagnosticKind::ValueError,
            &dimensions_path,
            "List should have at least 1 item after validation, not 0",
        );
        return None;
    }
    Some(Datatype::Array(ArrayType {
        name: name?,
        description,
        dimensions,
        element_type: Box::new(element_type?),
    }))
}

pub const DATATYPE: Discriminator<Datatype> = Discriminator {
    subject: "datatype",
    tag_field: "type",
    variants: &[
        Variant { tag: "uint8", build: uint8 },
        Variant { tag: "uint16", build: uint16 },
        Variant { tag: "uint32", build: uint32 },
        Variant { tag: "sint8", build: sint8 },
        Variant { tag: "sint16", build: sint16 },
        Variant { tag: "sint32", build: sint32 },
        Variant { tag: "struct", build: struct_type },
        Variant { tag: "array", build: array_type },
    ],
};

impl FromNode for Datatype {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        DATATYPE.resolve(node, path, errs)
    }
}

/// A named method argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub datatype: Datatype,
}

impl FromNode for Parameter {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let name = map.required::<String>("name", errs);
        let description = map.optional::<String>("description", errs);
        let datatype = map.required::<Datatype>("datatype", errs);
        map.finish(errs)?;
        Some(Parameter {
            name: name?,
            description,
            datatype: datatype?,
        })
    }
}

/// Report parameters that reuse a name from earlier in the same list.
pub fn unique_parameter_names(params: &[Parameter], list: &FieldPath, errs: &mut BuildErrors) {
    for (i, param) in params.iter().enumerate() {
        if params[..i].iter().any(|p| p.name == param.name) {
            errs.report(
                &list.index(i).key("name"),
                Diagnostic::error(
                    DiagnosticKind::InvariantViolation,
                    format!("parameter `{}` is declared more than once", param.name),
                ),
            );
        }
    }
}
