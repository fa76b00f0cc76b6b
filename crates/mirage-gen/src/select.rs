//! # Member Selector
//!
//! Resolves which members of a definition are eligible for remote
//! forwarding: the capability contract's methods, the invoke signatures of
//! their delegate-typed parameters, and the implementation type's
//! constructors (construction always happens through the concrete type,
//! whichever capability is exposed).
//!
//! De-duplication is structural: two members with the same name and
//! ordered parameter types are one member, first occurrence wins.
//!
//! Delegate support is exactly one level deep. A delegate whose own
//! signature contains another delegate makes the surrounding member
//! unsupported; the member is skipped with a diagnostic rather than
//! silently narrowed.

use std::collections::HashSet;

use crate::diag::Diagnostic;
use crate::model::DelegateShape;
use crate::model::MemberKind;
use crate::model::MemberModel;
use crate::model::ProxyDefinition;
use crate::model::ProxyMember;

/// The (implementation, capability) pairs already claimed in this pass.
pub type SeenPairs = HashSet<(String, Option<String>)>;

/// Selects the ordered, de-duplicated member set for one definition.
///
/// Returns `None` (after reporting) when the definition's pair is already
/// claimed; no partial output is produced for a duplicate.
pub fn select_members(
    def: &ProxyDefinition,
    seen: &mut SeenPairs,
    diags: &mut Vec<Diagnostic>,
) -> Option<Vec<ProxyMember>> {
    let pair = (
        def.implementation.full_name(),
        def.capability.as_ref().map(|c| c.full_name()),
    );
    if !seen.insert(pair) {
        diags.push(Diagnostic::multiple_proxy_definition(
            &def.implementation.full_name(),
            def.capability.as_ref().map(|c| c.full_name()).as_deref(),
        ));
        return None;
    }

    let contract = def.capability.as_ref().unwrap_or(&def.implementation);

    let mut selected: Vec<ProxyMember> = Vec::new();
    let mut identities: HashSet<(String, Vec<String>)> = HashSet::new();
    let mut push = |member: ProxyMember, selected: &mut Vec<ProxyMember>| {
        if identities.insert(member.identity()) {
            selected.push(member);
        }
    };

    // Contract methods, plus the invoke signature of every delegate-typed
    // parameter they carry.
    let mut delegates: Vec<DelegateShape> = Vec::new();
    for member in contract.methods() {
        if let Some(reason) = unsupported_shape(member) {
            diags.push(Diagnostic::unsupported_member_shape(
                &contract.full_name(),
                &member.name,
                &reason,
            ));
            continue;
        }
        for param in &member.params {
            if let Some(shape) = &param.delegate {
                delegates.push(shape.clone());
            }
        }
        push(
            ProxyMember {
                name: member.name.clone(),
                params: member.params.clone(),
                result: member.result.clone(),
                kind: MemberKind::Method,
            },
            &mut selected,
        );
    }

    for shape in delegates {
        push(
            ProxyMember {
                name: shape.name.clone(),
                params: shape.params.clone(),
                result: shape.result.clone(),
                kind: MemberKind::DelegateInvoke,
            },
            &mut selected,
        );
    }

    // Implementation constructors, whichever capability is exposed.
    for member in def.implementation.constructors() {
        if let Some(reason) = unsupported_shape(member) {
            diags.push(Diagnostic::unsupported_member_shape(
                &def.implementation.full_name(),
                &member.name,
                &reason,
            ));
            continue;
        }
        push(
            ProxyMember {
                name: member.name.clone(),
                params: member.params.clone(),
                result: member.result.clone(),
                kind: MemberKind::Constructor,
            },
            &mut selected,
        );
    }

    Some(selected)
}

/// Returns the reason a member cannot cross the boundary, if any.
fn unsupported_shape(member: &MemberModel) -> Option<String> {
    for param in &member.params {
        let Some(shape) = &param.delegate else {
            continue;
        };
        if shape.params.iter().any(|p| p.delegate.is_some()) {
            return Some(format!(
                "delegate parameter '{}' nests another delegate; \
                 delegate support is one level deep",
                param.name
            ));
        }
    }
    None
}
