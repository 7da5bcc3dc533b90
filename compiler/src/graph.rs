//! The parser state machine: a numbered tree of nodes describing every
//! legal JSON event at every point of a document for one target message.
//!
//! States are allocated pre-order from a monotonic counter; state 0 is
//! reserved for "before the document starts / after it ends" and never
//! belongs to a node. The categorized `NodeIndex` views are what the
//! emitters iterate to lay out each event handler's switch.

use crate::descriptor::{DescriptorPool, FieldDescriptor, FieldKind, MessageId};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Bool,
    Long,
    Double,
    String,
    /// A message-typed field has just been named; the next event must be `{`.
    KeyOfMessage,
    /// Inside that object, awaiting a key or `}`.
    InsideObject,
    Array,
}

#[derive(Debug)]
pub struct Node {
    pub state: usize,
    pub kind: NodeKind,
    /// Field name as written in the schema; `"."` for the synthetic root.
    pub name: String,
    /// Path from the root, `.` for descent and `[]` for array element.
    /// Diagnostics only.
    pub full_name: String,
    pub type_name: String,
    /// The message whose accessors the emitted code calls for this node.
    pub message: MessageId,
    /// Index of the field within `message`; `None` only on the root.
    pub field: Option<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn field_in<'a>(&self, pool: &'a DescriptorPool) -> Option<&'a FieldDescriptor> {
        self.field.map(|index| &pool.message(self.message).fields[index])
    }
}

#[derive(Debug, Default)]
pub struct NodeIndex {
    pub all: Vec<NodeId>,
    pub nullable: Vec<NodeId>,
    pub bools: Vec<NodeId>,
    pub longs: Vec<NodeId>,
    pub doubles: Vec<NodeId>,
    pub strings: Vec<NodeId>,
    pub objects: Vec<NodeId>,
    pub keys: Vec<NodeId>,
    pub arrays: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    state_counter: usize,
    pub index: NodeIndex,
    pub target: MessageId,
}

impl Graph {
    pub fn build(pool: &DescriptorPool, target: MessageId) -> Result<Graph, Error> {
        let mut graph = Graph {
            nodes: Vec::new(),
            state_counter: 1,
            index: NodeIndex::default(),
            target,
        };

        let desc = pool.message(target);
        graph.nodes.push(Node {
            state: 1,
            kind: NodeKind::InsideObject,
            name: ".".to_string(),
            full_name: ".".to_string(),
            type_name: desc.name.clone(),
            message: target,
            field: None,
            parent: None,
            children: Vec::new(),
        });
        graph.register(pool, graph.root());

        let mut stack = vec![target];
        graph.walk_message(pool, target, graph.root(), &mut stack)?;

        Ok(graph)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    fn walk_message(
        &mut self,
        pool: &DescriptorPool,
        message: MessageId,
        node: NodeId,
        stack: &mut Vec<MessageId>,
    ) -> Result<(), Error> {
        for f in 0..pool.message(message).fields.len() {
            let field = &pool.message(message).fields[f];
            let full_name = format!("{}{}", self.nodes[node.0].full_name, field.name);
            let (kind, sub_message) = element_kind(field, &full_name)?;
            let element_type = type_display(pool, field);

            if !field.is_repeated() {
                let child = self.add_child(
                    node,
                    kind,
                    field.name.clone(),
                    full_name,
                    element_type,
                    message,
                    Some(f),
                );
                self.register(pool, child);
                if let Some(sub) = sub_message {
                    let obj = self.inject_object_node(pool, child);
                    self.descend(pool, sub, obj, stack)?;
                }
            } else {
                let array = self.add_child(
                    node,
                    NodeKind::Array,
                    field.name.clone(),
                    full_name,
                    format!("[{}]", element_type),
                    message,
                    Some(f),
                );
                self.register(pool, array);
                let element = self.inject_array_node(pool, array, kind, element_type);
                if let Some(sub) = sub_message {
                    let obj = self.inject_object_node(pool, element);
                    self.descend(pool, sub, obj, stack)?;
                }
            }
        }
        Ok(())
    }

    fn descend(
        &mut self,
        pool: &DescriptorPool,
        sub: MessageId,
        obj: NodeId,
        stack: &mut Vec<MessageId>,
    ) -> Result<(), Error> {
        // The graph is a finite tree: a message already on the recursion
        // stack cannot be expanded again.
        if stack.contains(&sub) {
            return Err(Error::RecursiveMessage(pool.message(sub).full_name.clone()));
        }
        stack.push(sub);
        self.walk_message(pool, sub, obj, stack)?;
        stack.pop();
        Ok(())
    }

    /// The array's single child: the state every element value event lands
    /// on. Its path carries the `[]` marker.
    fn inject_array_node(
        &mut self,
        pool: &DescriptorPool,
        array: NodeId,
        kind: NodeKind,
        type_name: String,
    ) -> NodeId {
        let name = self.nodes[array.0].name.clone();
        let full_name = format!("{}[]", self.nodes[array.0].full_name);
        let message = self.nodes[array.0].message;
        let field = self.nodes[array.0].field;
        let element = self.add_child(array, kind, name, full_name, type_name, message, field);
        self.register(pool, element);
        element
    }

    /// The `InsideObject` beneath a `KeyOfMessage`: entered on `{`, left on
    /// `}`. Keeping the two apart forces the brace between them.
    fn inject_object_node(&mut self, pool: &DescriptorPool, key: NodeId) -> NodeId {
        let name = self.nodes[key.0].name.clone();
        let full_name = format!("{}.", self.nodes[key.0].full_name);
        let type_name = self.nodes[key.0].type_name.clone();
        let message = self.nodes[key.0].message;
        let field = self.nodes[key.0].field;
        let object = self.add_child(
            key,
            NodeKind::InsideObject,
            name,
            full_name,
            type_name,
            message,
            field,
        );
        self.register(pool, object);
        object
    }

    fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: String,
        full_name: String,
        type_name: String,
        message: MessageId,
        field: Option<usize>,
    ) -> NodeId {
        self.state_counter += 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            state: self.state_counter,
            kind,
            name,
            full_name,
            type_name,
            message,
            field,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn register(&mut self, pool: &DescriptorPool, id: NodeId) {
        let node = &self.nodes[id.0];
        debug_assert!(node.state > 0);
        let kind = node.kind;
        let nullable = node.field_in(pool).map_or(false, |f| f.is_optional());

        self.index.all.push(id);
        if nullable {
            self.index.nullable.push(id);
        }
        match kind {
            NodeKind::Bool => {
                self.index.bools.push(id);
                // 1/0 are accepted as true/false, so the integer event
                // dispatcher covers this state too.
                self.index.longs.push(id);
            }
            NodeKind::Long => {
                self.index.longs.push(id);
            }
            NodeKind::Double => {
                self.index.doubles.push(id);
                // Integer literals are accepted as doubles.
                self.index.longs.push(id);
            }
            NodeKind::String => {
                self.index.strings.push(id);
            }
            NodeKind::InsideObject => {
                self.index.objects.push(id);
            }
            NodeKind::KeyOfMessage => {
                self.index.keys.push(id);
            }
            NodeKind::Array => {
                self.index.arrays.push(id);
            }
        }
    }

    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        self.dump_rec(self.root(), 0, &mut out);
        out
    }

    fn dump_rec(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        out.push_str(&format!(
            "{}>> {} (type={}, kind={:?}, state={})\n",
            "  ".repeat(depth),
            node.full_name,
            node.type_name,
            node.kind,
            node.state
        ));
        for &child in &node.children {
            self.dump_rec(child, depth + 1, out);
        }
    }
}

/// The fixed protobuf-type-to-node-kind mapping, plus the referenced message
/// for message fields. `uint64` and `bytes` have no JSON story here yet.
fn element_kind(
    field: &FieldDescriptor,
    full_name: &str,
) -> Result<(NodeKind, Option<MessageId>), Error> {
    let kind = match &field.kind {
        FieldKind::Bool => NodeKind::Bool,
        FieldKind::Int32
        | FieldKind::Int64
        | FieldKind::Uint32
        | FieldKind::Sint32
        | FieldKind::Sint64
        | FieldKind::Fixed32
        | FieldKind::Fixed64
        | FieldKind::Sfixed32
        | FieldKind::Sfixed64 => NodeKind::Long,
        FieldKind::Float | FieldKind::Double => NodeKind::Double,
        FieldKind::String => NodeKind::String,
        FieldKind::Enum(_) => NodeKind::Long,
        FieldKind::Message(id) => return Ok((NodeKind::KeyOfMessage, Some(*id))),
        FieldKind::Uint64 | FieldKind::Bytes | FieldKind::Group => {
            return Err(Error::UnsupportedType {
                field: full_name.to_string(),
                type_name: field.kind.proto_name().to_string(),
            })
        }
    };
    Ok((kind, None))
}

fn type_display(pool: &DescriptorPool, field: &FieldDescriptor) -> String {
    match &field.kind {
        FieldKind::Message(id) => pool.message(*id).name.clone(),
        FieldKind::Enum(id) => pool.enum_desc(*id).name.clone(),
        other => other.proto_name().to_string(),
    }
}
