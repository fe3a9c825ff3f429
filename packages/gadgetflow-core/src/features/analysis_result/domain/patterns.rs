//! High-priority attack-trigger patterns

use crate::shared::models::MethodSignature;
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Trigger calls that almost always mean code execution or arbitrary
    /// object creation when reached by deserialized data.
    ///
    /// Keyed by `DeclaringType::Name` (overloads share one entry).
    pub static ref HIGH_PRIORITY_TRIGGERS: HashSet<&'static str> = {
        let mut s = HashSet::with_capacity(32);

        // ═══════════════════════════════════════════════════════════
        // Reflection invocation
        // ═══════════════════════════════════════════════════════════
        s.insert("System.Reflection.MethodBase::Invoke");
        s.insert("System.Reflection.MethodInfo::Invoke");
        s.insert("System.Reflection.ConstructorInfo::Invoke");
        s.insert("System.Reflection.PropertyInfo::SetValue");
        s.insert("System.Reflection.PropertyInfo::GetValue");
        s.insert("System.Reflection.FieldInfo::SetValue");
        s.insert("System.Type::InvokeMember");
        s.insert("System.Activator::CreateInstance");
        s.insert("System.AppDomain::CreateInstance");
        s.insert("System.AppDomain::CreateInstanceAndUnwrap");

        // ═══════════════════════════════════════════════════════════
        // Delegates
        // ═══════════════════════════════════════════════════════════
        s.insert("System.Delegate::DynamicInvoke");
        s.insert("System.Delegate::DynamicInvokeImpl");
        s.insert("System.MulticastDelegate::DynamicInvokeImpl");

        // ═══════════════════════════════════════════════════════════
        // Code loading and processes
        // ═══════════════════════════════════════════════════════════
        s.insert("System.Reflection.Assembly::Load");
        s.insert("System.Reflection.Assembly::LoadFrom");
        s.insert("System.Reflection.Assembly::LoadFile");
        s.insert("System.Diagnostics.Process::Start");
        s.insert("System.Runtime.InteropServices.Marshal::GetDelegateForFunctionPointer");

        s
    };
}

/// `Invoke`/`BeginInvoke` on any type: compiler-generated delegate entry points
pub fn is_delegate_invoke(signature: &MethodSignature) -> bool {
    let name = signature.qualified_name();
    name.ends_with("::Invoke") || name.ends_with("::BeginInvoke")
}

pub fn is_high_priority(signature: &MethodSignature) -> bool {
    HIGH_PRIORITY_TRIGGERS.contains(signature.qualified_name()) || is_delegate_invoke(signature)
}
