//! # Declarative Model
//!
//! The input the generator consumes. Rust has no runtime reflection, so a
//! declarer describes each type structurally: its module path, visibility,
//! and invocable members. Properties and events are expected to already be
//! lowered to accessor methods by the declarer.

/// Rust visibility, simplified to the two levels generated code needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Crate,
}

/// Where a generated type's visibility comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Follow the declaring context type.
    InheritContext,
    /// Follow the capability contract (public when there is none).
    InheritBase,
    Public,
    Internal,
    /// Follow the implementation type's own declaration.
    #[default]
    InheritImplementation,
}

/// One level of delegate signature.
///
/// Delegates nested inside delegates are a documented limitation: the
/// selector reports such members as unsupported rather than recursing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateShape {
    /// The delegate type's name, used to name its invoke member.
    pub name: String,
    pub params: Vec<ParamModel>,
    pub result: Option<String>,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamModel {
    pub name: String,
    /// Rust type as source text, e.g. `"String"` or `"Vec<u8>"`.
    pub ty: String,
    /// Present when the parameter is delegate-typed; its invoke signature
    /// then also needs boundary support.
    pub delegate: Option<DelegateShape>,
}

impl ParamModel {
    pub fn plain(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            delegate: None,
        }
    }
}

/// What kind of invocable a member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Method,
    /// The invoke signature of a delegate-typed parameter. Participates in
    /// pack synthesis only; no forwarding member is emitted for it.
    DelegateInvoke,
}

/// One declared method or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberModel {
    pub name: String,
    pub params: Vec<ParamModel>,
    /// Rust result type as source text; `None` for unit.
    pub result: Option<String>,
    pub kind: MemberKind,
}

impl MemberModel {
    pub fn constructor(name: impl Into<String>, params: Vec<ParamModel>) -> Self {
        Self {
            name: name.into(),
            params,
            result: None,
            kind: MemberKind::Constructor,
        }
    }

    pub fn method(
        name: impl Into<String>,
        params: Vec<ParamModel>,
        result: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            result: result.map(str::to_string),
            kind: MemberKind::Method,
        }
    }
}

/// A declared type: implementation, capability contract, or context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeModel {
    pub name: String,
    /// Module path ("namespace"), e.g. `"demo::greeting"`.
    pub module_path: String,
    pub visibility: Visibility,
    pub members: Vec<MemberModel>,
}

impl TypeModel {
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.module_path, self.name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MemberModel> {
        self.members
            .iter()
            .filter(|m| m.kind == MemberKind::Constructor)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MemberModel> {
        self.members.iter().filter(|m| m.kind == MemberKind::Method)
    }
}

/// One requested proxy.
///
/// At most one definition may exist per (implementation, capability)
/// pair; duplicates are reported, never merged.
#[derive(Debug, Clone)]
pub struct ProxyDefinition {
    pub implementation: TypeModel,
    /// Narrows the exposed members when present. Construction always goes
    /// through the implementation type's constructors regardless.
    pub capability: Option<TypeModel>,
    /// Explicit generated type name; `None` derives one.
    pub generated_name: Option<String>,
    pub accessibility: AccessPolicy,
}

/// The declaring context: a named scope carrying proxy definitions.
#[derive(Debug, Clone)]
pub struct ContextModel {
    pub name: String,
    pub module_path: String,
    pub visibility: Visibility,
    pub definitions: Vec<ProxyDefinition>,
}

/// A selected, boundary-eligible member. Identity is structural: name plus
/// ordered parameter types, never source identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMember {
    pub name: String,
    pub params: Vec<ParamModel>,
    pub result: Option<String>,
    pub kind: MemberKind,
}

impl ProxyMember {
    /// The ordered parameter-type sequence driving pack de-duplication.
    /// Delegate-typed parameters are carried as callback ids on the wire,
    /// so they contribute the callback-id type here.
    pub fn signature(&self) -> Vec<String> {
        self.params.iter().map(param_wire_type).collect()
    }

    /// Structural identity for member de-duplication.
    pub fn identity(&self) -> (String, Vec<String>) {
        (self.name.clone(), self.signature())
    }
}

/// The wire-side type of one parameter.
pub fn param_wire_type(param: &ParamModel) -> String {
    if param.delegate.is_some() {
        "::mirage::message::CallbackId".to_string()
    } else {
        param.ty.clone()
    }
}
