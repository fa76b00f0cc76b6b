//! # Emission Helpers
//!
//! Shared plumbing for turning model strings into tokens and for naming
//! generated items deterministically.

use proc_macro2::TokenStream;
use quote::quote;

use crate::model::AccessPolicy;
use crate::model::ContextModel;
use crate::model::ProxyDefinition;
use crate::model::Visibility;

/// Marker prepended to every emitted artifact.
pub const GENERATED_HEADER: &str =
    "// <auto-generated> produced by mirage-gen; do not edit </auto-generated>\n";

/// Parses a model type string into a syn type.
pub fn parse_type(src: &str) -> Result<syn::Type, String> {
    syn::parse_str(src).map_err(|e| format!("cannot parse type `{}`: {}", src, e))
}

/// Reduces a type string to identifier-safe characters.
pub fn sanitize(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut last_underscore = false;
    for ch in src.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// FNV-1a, 64 bit. Stable across platforms and recompilation, which is
/// what keeps generated pack names reproducible.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Renders a finished token stream into artifact text.
pub fn render(tokens: TokenStream) -> String {
    format!("{}{}\n", GENERATED_HEADER, tokens)
}

/// Resolves the effective visibility of a generated proxy.
pub fn resolve_visibility(context: &ContextModel, def: &ProxyDefinition) -> Visibility {
    match def.accessibility {
        AccessPolicy::InheritContext => context.visibility,
        AccessPolicy::InheritBase => def
            .capability
            .as_ref()
            .map(|c| c.visibility)
            .unwrap_or(Visibility::Public),
        AccessPolicy::Public => Visibility::Public,
        AccessPolicy::Internal => Visibility::Crate,
        AccessPolicy::InheritImplementation => def.implementation.visibility,
    }
}

/// Visibility as tokens.
pub fn vis_tokens(vis: Visibility) -> TokenStream {
    match vis {
        Visibility::Public => quote! { pub },
        Visibility::Crate => quote! { pub(crate) },
    }
}
