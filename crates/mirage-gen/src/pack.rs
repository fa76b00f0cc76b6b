//! # Parameter Pack Synthesizer
//!
//! One carrier struct per distinct structural signature. Two members with
//! identical ordered parameter types map to the same carrier, whatever
//! type or member they came from; this is both a space optimization and
//! the hook point for wire-serialization reuse.
//!
//! Packs are grouped by namespace and named from the signature's sanitized
//! description plus an FNV-1a hash of (namespace, signature), so identical
//! inputs always regenerate identically-named output.

use std::collections::HashMap;

use proc_macro2::TokenStream;
use quote::format_ident;
use quote::quote;

use crate::diag::Diagnostic;
use crate::emit;
use crate::model::ProxyMember;

/// How much of the readable signature description survives in the name.
const DESC_LIMIT: usize = 32;

/// One synthesized carrier.
#[derive(Debug, Clone)]
pub struct PackModel {
    pub name: String,
    /// Ordered wire types, one field per entry.
    pub signature: Vec<String>,
}

/// The carriers for one namespace, keyed by structural signature.
#[derive(Debug, Default)]
pub struct PackSet {
    packs: Vec<PackModel>,
    by_signature: HashMap<Vec<String>, usize>,
}

impl PackSet {
    /// The carrier name for a signature, if one was synthesized.
    pub fn name_for(&self, signature: &[String]) -> Option<&str> {
        self.by_signature
            .get(signature)
            .map(|i| self.packs[*i].name.as_str())
    }

    pub fn packs(&self) -> &[PackModel] {
        &self.packs
    }
}

/// Synthesizes the carriers for every distinct signature in `members`.
///
/// Members whose parameter types do not parse are reported and excluded;
/// generation continues for the rest.
pub fn synthesize(
    namespace: &str,
    members: &[&ProxyMember],
    diags: &mut Vec<Diagnostic>,
) -> PackSet {
    let mut set = PackSet::default();

    for member in members {
        let signature = member.signature();
        if set.by_signature.contains_key(&signature) {
            continue;
        }
        if let Some(bad) = signature.iter().find(|ty| emit::parse_type(ty).is_err()) {
            diags.push(Diagnostic::unsupported_member_shape(
                namespace,
                &member.name,
                &format!("parameter type `{}` is not a valid Rust type", bad),
            ));
            continue;
        }
        let name = pack_name(namespace, &signature);
        set.by_signature.insert(signature.clone(), set.packs.len());
        set.packs.push(PackModel { name, signature });
    }

    set
}

/// Deterministic carrier name for one signature within one namespace.
fn pack_name(namespace: &str, signature: &[String]) -> String {
    let desc = if signature.is_empty() {
        "Empty".to_string()
    } else {
        let mut desc = signature
            .iter()
            .map(|ty| emit::sanitize(ty))
            .collect::<Vec<_>>()
            .join("_");
        desc.truncate(DESC_LIMIT);
        desc
    };
    let hash = emit::fnv1a64(format!("{}|{}", namespace, signature.join(",")).as_bytes());
    format!("ParameterPack_{}_{:016x}", desc, hash)
}

/// Emits the carrier structs for one namespace group.
///
/// Field names are positional (`arg0..argN`): carriers are shared across
/// members, so no single member's parameter names apply.
pub fn emit(set: &PackSet) -> TokenStream {
    let mut out = TokenStream::new();

    for pack in &set.packs {
        let name = format_ident!("{}", pack.name);
        // Types were validated during synthesis; a failure here would mean
        // the set was built outside `synthesize`.
        let types: Result<Vec<syn::Type>, _> =
            pack.signature.iter().map(|ty| emit::parse_type(ty)).collect();
        let Ok(types) = types else { continue };
        let fields = types.iter().enumerate().map(|(index, ty)| {
            let field = format_ident!("arg{}", index);
            quote! { pub #field: #ty }
        });

        out.extend(quote! {
            #[allow(non_camel_case_types)]
            #[derive(Debug, Clone, ::mirage::serde::Serialize, ::mirage::serde::Deserialize)]
            #[serde(crate = "mirage::serde")]
            pub struct #name {
                #(#fields,)*
            }
        });
    }

    out
}
