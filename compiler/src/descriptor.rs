//! Descriptor pool: a thin, id-addressed view over the descriptors the
//! schema compiler produces.
//!
//! Parsing and type-name resolution are protox's job; this module only
//! flattens its linked `FileDescriptorSet` into arenas addressed by
//! copyable ids and serves lookups by full name. References between
//! messages (including mutual ones, legal at the schema level) are ids, so
//! there are no shared-ownership cycles.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type as ProtoType};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorSet};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
    Group,
    Message(MessageId),
    Enum(EnumId),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: i32,
    pub label: Label,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_optional(&self) -> bool {
        self.label == Label::Optional
    }
}

impl FieldKind {
    /// The type keyword as written in a schema; `message` / `enum` for the
    /// composite kinds.
    pub fn proto_name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Uint32 => "uint32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sint64 => "sint64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Group => "group",
            FieldKind::Message(_) => "message",
            FieldKind::Enum(_) => "enum",
        }
    }
}

#[derive(Debug)]
pub struct MessageDescriptor {
    pub name: String,
    /// Package-qualified dotted name, without a leading dot.
    pub full_name: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug)]
pub struct EnumDescriptor {
    pub name: String,
    pub full_name: String,
    pub values: Vec<(String, i32)>,
}

#[derive(Debug)]
pub struct DescriptorPool {
    pub file_name: String,
    pub package: Option<String>,
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    message_ids: HashMap<String, MessageId>,
    enum_ids: HashMap<String, EnumId>,
}

impl DescriptorPool {
    /// Flattens a linked descriptor set. Every message and enum in the set
    /// (imports included) is registered first, then fields are converted;
    /// compiled type references are fully qualified, so conversion is a
    /// plain map lookup.
    pub fn from_file_set(set: &FileDescriptorSet, file_name: &str) -> Result<DescriptorPool, Error> {
        let target = set
            .file
            .iter()
            .find(|file| file.name() == file_name)
            .ok_or_else(|| Error::Link(format!("descriptor set does not contain {}", file_name)))?;

        let mut pool = DescriptorPool {
            file_name: file_name.to_string(),
            package: target.package.clone().filter(|p| !p.is_empty()),
            messages: Vec::new(),
            enums: Vec::new(),
            message_ids: HashMap::new(),
            enum_ids: HashMap::new(),
        };

        for file in &set.file {
            let prefix = match file.package() {
                "" => String::new(),
                package => format!("{}.", package),
            };
            for message in &file.message_type {
                pool.register_message(message, &prefix);
            }
            for decl in &file.enum_type {
                pool.register_enum(decl, &prefix);
            }
        }
        for file in &set.file {
            let prefix = match file.package() {
                "" => String::new(),
                package => format!("{}.", package),
            };
            for message in &file.message_type {
                pool.convert_message(message, &prefix)?;
            }
        }

        Ok(pool)
    }

    /// Looks up a message by fully qualified name; a leading dot is allowed.
    pub fn message_by_name(&self, full_name: &str) -> Option<MessageId> {
        let key = full_name.strip_prefix('.').unwrap_or(full_name);
        self.message_ids.get(key).copied()
    }

    pub fn message(&self, id: MessageId) -> &MessageDescriptor {
        &self.messages[id.0]
    }

    pub fn enum_desc(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0]
    }

    pub fn messages_iter(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.iter()
    }

    fn register_message(&mut self, decl: &DescriptorProto, prefix: &str) {
        let full_name = format!("{}{}", prefix, decl.name());
        let id = MessageId(self.messages.len());
        self.messages.push(MessageDescriptor {
            name: decl.name().to_string(),
            full_name: full_name.clone(),
            fields: Vec::new(),
        });
        self.message_ids.insert(full_name.clone(), id);

        let nested_prefix = format!("{}.", full_name);
        for nested in &decl.nested_type {
            self.register_message(nested, &nested_prefix);
        }
        for nested in &decl.enum_type {
            self.register_enum(nested, &nested_prefix);
        }
    }

    fn register_enum(&mut self, decl: &EnumDescriptorProto, prefix: &str) {
        let full_name = format!("{}{}", prefix, decl.name());
        let id = EnumId(self.enums.len());
        self.enums.push(EnumDescriptor {
            name: decl.name().to_string(),
            full_name: full_name.clone(),
            values: decl
                .value
                .iter()
                .map(|value| (value.name().to_string(), value.number()))
                .collect(),
        });
        self.enum_ids.insert(full_name, id);
    }

    fn convert_message(&mut self, decl: &DescriptorProto, prefix: &str) -> Result<(), Error> {
        let full_name = format!("{}{}", prefix, decl.name());
        let id = self.message_ids[&full_name];

        let mut fields = Vec::with_capacity(decl.field.len());
        for field in &decl.field {
            fields.push(self.convert_field(field)?);
        }
        self.messages[id.0].fields = fields;

        let nested_prefix = format!("{}.", full_name);
        for nested in &decl.nested_type {
            self.convert_message(nested, &nested_prefix)?;
        }
        Ok(())
    }

    fn convert_field(&self, field: &FieldDescriptorProto) -> Result<FieldDescriptor, Error> {
        let label = match field.label() {
            ProtoLabel::Optional => Label::Optional,
            ProtoLabel::Required => Label::Required,
            ProtoLabel::Repeated => Label::Repeated,
        };
        let kind = match field.r#type() {
            ProtoType::Bool => FieldKind::Bool,
            ProtoType::Int32 => FieldKind::Int32,
            ProtoType::Int64 => FieldKind::Int64,
            ProtoType::Uint32 => FieldKind::Uint32,
            ProtoType::Uint64 => FieldKind::Uint64,
            ProtoType::Sint32 => FieldKind::Sint32,
            ProtoType::Sint64 => FieldKind::Sint64,
            ProtoType::Fixed32 => FieldKind::Fixed32,
            ProtoType::Fixed64 => FieldKind::Fixed64,
            ProtoType::Sfixed32 => FieldKind::Sfixed32,
            ProtoType::Sfixed64 => FieldKind::Sfixed64,
            ProtoType::Float => FieldKind::Float,
            ProtoType::Double => FieldKind::Double,
            ProtoType::String => FieldKind::String,
            ProtoType::Bytes => FieldKind::Bytes,
            ProtoType::Group => FieldKind::Group,
            ProtoType::Message => FieldKind::Message(self.message_ref(field)?),
            ProtoType::Enum => FieldKind::Enum(self.enum_ref(field)?),
        };
        Ok(FieldDescriptor {
            name: field.name().to_string(),
            number: field.number(),
            label,
            kind,
        })
    }

    fn message_ref(&self, field: &FieldDescriptorProto) -> Result<MessageId, Error> {
        let name = field.type_name().trim_start_matches('.');
        self.message_ids.get(name).copied().ok_or_else(|| {
            Error::Link(format!(
                "field {} references unknown message {}",
                field.name(),
                field.type_name()
            ))
        })
    }

    fn enum_ref(&self, field: &FieldDescriptorProto) -> Result<EnumId, Error> {
        let name = field.type_name().trim_start_matches('.');
        self.enum_ids.get(name).copied().ok_or_else(|| {
            Error::Link(format!(
                "field {} references unknown enum {}",
                field.name(),
                field.type_name()
            ))
        })
    }
}

/// Loads a schema file and resolves the target message: the front half of
/// the generation pipeline. The file is handed to the protox compiler with
/// its own directory as the include path, so the descriptor's file name is
/// the basename of the input.
pub fn load_message(path: &Path, message_name: &str) -> Result<(DescriptorPool, MessageId), Error> {
    // An unreadable file is its own failure; everything protox diagnoses
    // beyond that is a schema error.
    fs::metadata(path).map_err(|source| Error::SchemaOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let include = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let set = protox::compile([path], [include.as_path()])?;
    let pool = DescriptorPool::from_file_set(&set, &file_name)?;

    debug!("loaded {} with the following messages:", pool.file_name);
    for msg in pool.messages_iter() {
        debug!(">> {}", msg.full_name);
    }

    let id = pool
        .message_by_name(message_name)
        .ok_or_else(|| Error::MessageNotFound(message_name.to_string()))?;
    Ok((pool, id))
}

/// Compiles an inline schema through the real pipeline for tests. Callers
/// pass distinct file names so parallel tests do not clash on fixtures.
#[cfg(test)]
pub(crate) fn pool_from_source(file_name: &str, source: &str) -> DescriptorPool {
    let dir = std::env::temp_dir().join("protog-compiler-tests");
    fs::create_dir_all(&dir).expect("create fixture dir");
    let path = dir.join(file_name);
    fs::write(&path, source).expect("write fixture");
    let set = protox::compile([path.as_path()], [dir.as_path()]).expect("compile fixture");
    DescriptorPool::from_file_set(&set, file_name).expect("link fixture")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_references_resolve_to_ids() {
        let pool = pool_from_source(
            "descriptor_nested.proto",
            r#"
            syntax = "proto2";
            package some.ns;
            message Outer {
                message Inner {
                    optional int32 id = 1;
                }
                optional Inner inner = 1;
            }
            message Other {
                optional Outer.Inner borrowed = 1;
            }
            "#,
        );

        let outer = pool.message_by_name("some.ns.Outer").unwrap();
        let inner = pool.message_by_name("some.ns.Outer.Inner").unwrap();
        assert_eq!(
            pool.message(outer).fields[0].kind,
            FieldKind::Message(inner)
        );
        let other = pool.message_by_name(".some.ns.Other").unwrap();
        assert_eq!(
            pool.message(other).fields[0].kind,
            FieldKind::Message(inner)
        );
    }

    #[test]
    fn test_innermost_scope_wins() {
        let pool = pool_from_source(
            "descriptor_shadow.proto",
            r#"
            syntax = "proto2";
            message Thing {
                optional int32 a = 1;
            }
            message Holder {
                message Thing {
                    optional int32 b = 1;
                }
                optional Thing thing = 1;
            }
            "#,
        );

        let holder = pool.message_by_name("Holder").unwrap();
        let nested = pool.message_by_name("Holder.Thing").unwrap();
        assert_eq!(
            pool.message(holder).fields[0].kind,
            FieldKind::Message(nested)
        );
    }

    #[test]
    fn test_map_fields_arrive_as_repeated_entries() {
        let pool = pool_from_source(
            "descriptor_map.proto",
            r#"
            syntax = "proto3";
            message Dict {
                map<string, int64> counts = 1;
            }
            "#,
        );

        let field = &pool.message(pool.message_by_name("Dict").unwrap()).fields[0];
        assert_eq!(field.label, Label::Repeated);
        let entry_id = match field.kind {
            FieldKind::Message(id) => id,
            ref other => panic!("expected a message kind, got {:?}", other),
        };
        let entry = pool.message(entry_id);
        assert_eq!(entry.full_name, "Dict.CountsEntry");
        assert_eq!(entry.fields[0].name, "key");
        assert_eq!(entry.fields[0].kind, FieldKind::String);
        assert_eq!(entry.fields[1].name, "value");
        assert_eq!(entry.fields[1].kind, FieldKind::Int64);
    }

    #[test]
    fn test_oneof_members_are_plain_optional_fields() {
        let pool = pool_from_source(
            "descriptor_oneof.proto",
            r#"
            syntax = "proto2";
            message Shape {
                oneof kind {
                    int32 circle = 1;
                    string label = 2;
                }
                optional bool filled = 3;
            }
            "#,
        );

        let shape = pool.message(pool.message_by_name("Shape").unwrap());
        assert_eq!(shape.fields.len(), 3);
        assert_eq!(shape.fields[0].name, "circle");
        assert_eq!(shape.fields[0].label, Label::Optional);
        assert_eq!(shape.fields[1].name, "label");
        assert_eq!(shape.fields[1].label, Label::Optional);
    }

    #[test]
    fn test_enum_fields_resolve() {
        let pool = pool_from_source(
            "descriptor_enum.proto",
            r#"
            syntax = "proto2";
            enum Mode {
                MODE_OFF = 0;
                MODE_ON = 1;
            }
            message M {
                optional Mode mode = 1;
            }
            "#,
        );

        let m = pool.message_by_name("M").unwrap();
        match pool.message(m).fields[0].kind {
            FieldKind::Enum(id) => {
                assert_eq!(pool.enum_desc(id).full_name, "Mode");
                assert_eq!(pool.enum_desc(id).values[1], ("MODE_ON".to_string(), 1));
            }
            ref other => panic!("expected an enum kind, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let path = std::env::temp_dir().join("protog-compiler-tests/no_such_file.proto");
        let err = load_message(&path, "M").unwrap_err();
        assert!(matches!(err, Error::SchemaOpen { .. }));
    }

    #[test]
    fn test_load_rejects_bad_schema() {
        let dir = std::env::temp_dir().join("protog-compiler-tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("descriptor_bad.proto");
        fs::write(
            &path,
            "syntax = \"proto2\"; message M { optional Missing x = 1; }",
        )
        .unwrap();
        let err = load_message(&path, "M").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_load_rejects_unknown_message() {
        let dir = std::env::temp_dir().join("protog-compiler-tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("descriptor_lookup.proto");
        fs::write(&path, "syntax = \"proto2\"; message M { }").unwrap();
        let err = load_message(&path, "Missing").unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(_)));
    }
}
