//! Simple types
//!
//! Values of these types cannot carry an object graph, so loads and stores
//! of them bypass the symbolic heap and produce fake values.

use crate::shared::models::TypeRef;
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

static SIMPLE_TYPES: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    let mut set = FxHashSet::default();
    set.insert("System.Void");
    set.insert("System.Boolean");
    set.insert("System.Char");
    set.insert("System.SByte");
    set.insert("System.Byte");
    set.insert("System.Int16");
    set.insert("System.UInt16");
    set.insert("System.Int32");
    set.insert("System.UInt32");
    set.insert("System.Int64");
    set.insert("System.UInt64");
    set.insert("System.IntPtr");
    set.insert("System.UIntPtr");
    set.insert("System.Single");
    set.insert("System.Double");
    set.insert("System.Decimal");
    set.insert("System.String");
    set.insert("System.DateTime");
    set
});

/// Primitive, string or `DateTime` (also behind a managed pointer)
pub fn is_simple_type(ty: &TypeRef) -> bool {
    let name = ty.full_name.strip_suffix('&').unwrap_or(&ty.full_name);
    SIMPLE_TYPES.contains(name)
}
