//! Method, type and field references
//!
//! Loader-agnostic view of managed metadata. Signatures follow the
//! `ReturnType DeclaringType::Name(Param1,Param2)` shape so that two
//! references to the same method always produce the same key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reference to a type by its full name (`Namespace.Type`, `T[]`, `T&`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub full_name: String,

    /// Value types are copied on assignment; reference types are shared
    #[serde(default)]
    pub is_value_type: bool,
}

impl TypeRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            is_value_type: false,
        }
    }

    pub fn value_type(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            is_value_type: true,
        }
    }

    pub fn void() -> Self {
        Self::value_type("System.Void")
    }

    pub fn object() -> Self {
        Self::new("System.Object")
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.full_name == "System.Void"
    }

    /// Managed pointer (`ref`/`out` parameter)
    #[inline]
    pub fn is_by_ref(&self) -> bool {
        self.full_name.ends_with('&')
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.full_name.ends_with("[]")
    }

    /// Type behind a managed pointer or array, `self` otherwise
    pub fn element_type(&self) -> TypeRef {
        if let Some(inner) = self.full_name.strip_suffix('&') {
            TypeRef {
                full_name: inner.to_string(),
                is_value_type: self.is_value_type,
            }
        } else if let Some(inner) = self.full_name.strip_suffix("[]") {
            TypeRef::new(inner)
        } else {
            self.clone()
        }
    }

    /// Pointer type to `self` (`T&`)
    pub fn by_ref(&self) -> TypeRef {
        TypeRef {
            full_name: format!("{}&", self.full_name),
            is_value_type: self.is_value_type,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Unique method signature string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature(Arc<str>);

impl MethodSignature {
    pub fn new(signature: impl AsRef<str>) -> Self {
        Self(Arc::from(signature.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `DeclaringType::Name` part of the signature (no return type, no parameters)
    pub fn qualified_name(&self) -> &str {
        let without_params = self.0.split('(').next().unwrap_or(&self.0);
        without_params
            .rsplit_once(' ')
            .map(|(_, name)| name)
            .unwrap_or(without_params)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodSignature {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MethodSignature {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Reference to a method as seen at a call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub parameters: Vec<TypeRef>,
    pub return_type: TypeRef,

    /// Instance method (an implicit `this` precedes the parameters)
    pub has_this: bool,
}

impl MethodRef {
    pub fn new(
        declaring_type: TypeRef,
        name: impl Into<String>,
        parameters: Vec<TypeRef>,
        return_type: TypeRef,
        has_this: bool,
    ) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            parameters,
            return_type,
            has_this,
        }
    }

    pub fn signature(&self) -> MethodSignature {
        let params: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.full_name.as_str())
            .collect();
        MethodSignature::new(format!(
            "{} {}::{}({})",
            self.return_type.full_name,
            self.declaring_type.full_name,
            self.name,
            params.join(",")
        ))
    }

    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor"
    }

    #[inline]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Formal parameter types with `this` first for instance methods
    pub fn formal_types(&self) -> Vec<TypeRef> {
        let mut formals = Vec::with_capacity(self.parameters.len() + 1);
        if self.has_this {
            let this_type = if self.declaring_type.is_value_type {
                self.declaring_type.by_ref()
            } else {
                self.declaring_type.clone()
            };
            formals.push(this_type);
        }
        formals.extend(self.parameters.iter().cloned());
        formals
    }

    #[inline]
    pub fn formal_count(&self) -> usize {
        self.parameters.len() + usize::from(self.has_this)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// Name of an entity field: a managed field, an array element or a pointer target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey(Arc<str>);

impl FieldKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Single abstract cell standing for every array element
    pub fn array_element() -> Self {
        Self::new("[]")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a field (instance or static)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub field_type: TypeRef,
}

impl FieldRef {
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            field_type,
        }
    }

    pub fn key(&self) -> FieldKey {
        FieldKey::new(format!("{}::{}", self.declaring_type.full_name, self.name))
    }
}
