//! Dispatch path resolution.
//!
//! A method's dispatch path is its module segments joined with `/` followed
//! by the method name. Methods declared directly in a role body have no
//! segments, so their paths are the bare method names.

use std::collections::HashSet;
use std::fmt;

use crate::schema::{InterfaceNode, MethodSignature, RoleDef};

/// Structural errors not expressible as parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two bindings in one role resolve to the same dispatch path.
    DuplicatePath { role: String, path: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::DuplicatePath { role, path } => write!(
                f,
                "two bindings in role {role:?} resolve to the same dispatch path {path:?}"
            ),
        }
    }
}

/// A method paired with its resolved dispatch path.
#[derive(Debug)]
pub struct ResolvedMethod<'a> {
    pub path: String,
    pub method: &'a MethodSignature,
}

/// Walks a role's construct tree and resolves every method's dispatch path,
/// rejecting paths that collide within the role.
pub fn resolve_role_paths(role: &RoleDef) -> Result<Vec<ResolvedMethod<'_>>, SchemaError> {
    let mut resolved = Vec::new();
    walk(&role.root, "", &mut resolved);

    let mut taken = HashSet::new();
    for entry in &resolved {
        if !taken.insert(entry.path.as_str()) {
            return Err(SchemaError::DuplicatePath {
                role: role.name.0.clone(),
                path: entry.path.clone(),
            });
        }
    }
    Ok(resolved)
}

fn walk<'a>(node: &'a InterfaceNode, prefix: &str, out: &mut Vec<ResolvedMethod<'a>>) {
    for method in &node.methods {
        out.push(ResolvedMethod {
            path: join(prefix, &method.name.0),
            method,
        });
    }
    for child in &node.modules {
        let child_prefix = join(prefix, &child.name.0);
        walk(child, &child_prefix, out);
    }
}

/// Joins a path prefix and a segment. An empty prefix yields the bare segment.
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}
