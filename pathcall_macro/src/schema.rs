//! Data structures representing a parsed interface schema.

/// A namespace in the schema: nested modules plus leaf remote methods.
///
/// Sibling names are unique across modules and methods together; the
/// parser rejects collisions. The root node of a role has an empty segment
/// path, so its methods dispatch under their bare names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceNode {
    pub name: Identifier,
    pub modules: Vec<InterfaceNode>,
    pub methods: Vec<MethodSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: Identifier,
    pub mode: BindingMode,
    /// Ordered parameter list; order is the wire order.
    pub params: Vec<(Identifier, ValueType)>,
    /// None means the method replies with nothing (wire `null`).
    pub return_type: Option<ValueType>,
}

/// Declared with `fn` (Handler) or `callback` (CallbackFunction). The two
/// registration modes are structurally identical and dispatch identically;
/// the tag survives into the runtime's `register` call for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Handler,
    Callback,
}

/// The payload type universe: JSON-representable scalars, free-form
/// objects, and sequences thereof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Object,
    List(Box<ValueType>),
}

/// One role of the interface: the construct trees generated for it and the
/// role identity exchanged during connection establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDef {
    pub name: Identifier,
    pub root: InterfaceNode,
}

/// The entire schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub roles: Vec<RoleDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);
