//! # Generation Driver
//!
//! The two-phase pass over a context: collect and validate every proxy
//! definition, then emit artifacts. Parameter-pack artifacts come first,
//! one per namespace, so identical signatures across all of a namespace's
//! definitions share one carrier; proxy artifacts follow, one per
//! definition.

use crate::diag::Diagnostic;
use crate::emit;
use crate::model::ContextModel;
use crate::model::ProxyDefinition;
use crate::model::ProxyMember;
use crate::pack;
use crate::proxy;
use crate::select;
use crate::select::SeenPairs;

/// One emitted source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArtifact {
    /// Stable, unique name for the artifact, e.g.
    /// `demo.GreeterIllusion.illusion.g.rs`.
    pub hint_name: String,
    pub source: String,
}

/// Everything one pass produced.
#[derive(Debug, Default)]
pub struct Generation {
    pub artifacts: Vec<SourceArtifact>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A definition that survived selection.
struct Planned<'a> {
    def: &'a ProxyDefinition,
    name: proxy::ProxyName,
    members: Vec<ProxyMember>,
}

/// Runs the full pass for one context.
///
/// Never fails: definition-time problems surface as diagnostics and the
/// offending definition or member is skipped while the rest proceed.
pub fn generate(context: &ContextModel) -> Generation {
    let mut generation = Generation::default();

    // Phase 1: selection. Duplicate (implementation, capability) pairs
    // are claimed first-come; later duplicates produce no output at all.
    let mut seen: SeenPairs = SeenPairs::new();
    let mut planned: Vec<Planned> = Vec::new();
    for def in &context.definitions {
        let Some(members) = select::select_members(def, &mut seen, &mut generation.diagnostics)
        else {
            continue;
        };
        planned.push(Planned {
            def,
            name: proxy::resolve_name(def),
            members,
        });
    }

    // Phase 2: emission, namespace by namespace in declaration order.
    let mut namespaces: Vec<&str> = Vec::new();
    for plan in &planned {
        if !namespaces.contains(&plan.name.module_path.as_str()) {
            namespaces.push(&plan.name.module_path);
        }
    }

    for namespace in namespaces {
        let group: Vec<&Planned> = planned
            .iter()
            .filter(|p| p.name.module_path == namespace)
            .collect();

        let members: Vec<&ProxyMember> =
            group.iter().flat_map(|p| p.members.iter()).collect();
        let packs = pack::synthesize(namespace, &members, &mut generation.diagnostics);

        generation.artifacts.push(SourceArtifact {
            hint_name: format!("{}.parameter_packs.g.rs", dotted(namespace)),
            source: emit::render(pack::emit(&packs)),
        });

        for plan in group {
            let tokens = proxy::emit(
                plan.def,
                context,
                &plan.members,
                &packs,
                &mut generation.diagnostics,
            );
            generation.artifacts.push(SourceArtifact {
                hint_name: format!("{}.illusion.g.rs", dotted(&plan.name.full_name())),
                source: emit::render(tokens),
            });
        }
    }

    generation
}

fn dotted(path: &str) -> String {
    path.replace("::", ".")
}
