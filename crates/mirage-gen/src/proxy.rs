//! # Proxy Synthesizer
//!
//! Emits the illusion type for one proxy definition: the construction
//! paths (deprecated blocking constructor, asynchronous factory, low-level
//! `from_raw`), one forwarding member per selected method, and the
//! disposal surface. The emitted type is a pure forwarding shell over
//! `mirage::shell::IllusionShell`; it holds no remote state of its own.

use proc_macro2::TokenStream;
use quote::format_ident;
use quote::quote;

use crate::diag::Diagnostic;
use crate::emit;
use crate::model::ContextModel;
use crate::model::MemberKind;
use crate::model::ProxyDefinition;
use crate::model::ProxyMember;
use crate::model::param_wire_type;
use crate::pack::PackSet;

/// The resolved name and module of a generated proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyName {
    pub type_name: String,
    pub module_path: String,
}

impl ProxyName {
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.module_path, self.type_name)
    }
}

/// Resolves the generated type name for a definition.
///
/// Defaults to `{Implementation}Illusion`, or
/// `{Implementation}As{Capability}Illusion` when a capability narrows the
/// surface, in the implementation's namespace. An explicit name wins
/// verbatim; a `::`-qualified one also relocates the type.
pub fn resolve_name(def: &ProxyDefinition) -> ProxyName {
    match &def.generated_name {
        Some(explicit) if !explicit.trim().is_empty() => match explicit.rfind("::") {
            Some(split) => ProxyName {
                type_name: explicit[split + 2..].to_string(),
                module_path: explicit[..split].to_string(),
            },
            None => ProxyName {
                type_name: explicit.clone(),
                module_path: def.implementation.module_path.clone(),
            },
        },
        _ => {
            let type_name = match &def.capability {
                Some(capability) => format!(
                    "{}As{}Illusion",
                    def.implementation.name, capability.name
                ),
                None => format!("{}Illusion", def.implementation.name),
            };
            ProxyName {
                type_name,
                module_path: def.implementation.module_path.clone(),
            }
        }
    }
}

/// Emits the proxy type for one definition.
pub fn emit(
    def: &ProxyDefinition,
    context: &ContextModel,
    members: &[ProxyMember],
    packs: &PackSet,
    diags: &mut Vec<Diagnostic>,
) -> TokenStream {
    let name = resolve_name(def);
    let vis = emit::vis_tokens(emit::resolve_visibility(context, def));
    let type_ident = format_ident!("{}", name.type_name);
    let impl_full_name = def.implementation.full_name();
    let type_doc = format!(
        "Client-side stand-in for a `{}` living in a remote host process.",
        impl_full_name
    );

    let mut items = TokenStream::new();
    for member in members {
        match member.kind {
            MemberKind::Constructor => {
                items.extend(emit_constructor(&vis, member, packs, &name, diags));
            }
            MemberKind::Method => {
                items.extend(emit_forwarding(&vis, member, packs, &name, diags));
            }
            // Pack synthesis only; callback dispatch lives host-side.
            MemberKind::DelegateInvoke => {}
        }
    }

    quote! {
        #[doc = #type_doc]
        #vis struct #type_ident {
            shell: ::mirage::shell::IllusionShell,
        }

        impl #type_ident {
            const CREATION_CONTEXT: ::mirage::provider::CreationContext =
                ::mirage::provider::CreationContext::constructor(#impl_full_name);

            /// Wraps an already established remote instance without
            /// re-running creation.
            #vis fn from_raw(
                owner: ::mirage::owner::ExecutorOwner,
                instance_id: ::mirage::message::InstanceId,
            ) -> Self {
                Self { shell: ::mirage::shell::IllusionShell::new(owner, instance_id) }
            }

            #items

            /// Transitions this proxy to disposed. Idempotent.
            #vis fn dispose(&self) {
                self.shell.dispose();
            }
        }

        impl ::mirage::shell::Illusion for #type_ident {
            fn instance_id(&self) -> ::mirage::message::InstanceId {
                self.shell.instance_id()
            }
            fn executor(&self) -> &::std::sync::Arc<::mirage::executor::Executor> {
                self.shell.executor()
            }
            fn is_available(&self) -> bool {
                self.shell.is_available()
            }
        }
    }
}

/// Parameter list, argument idents, and pack construction for one member.
struct CallSurface {
    params: Vec<TokenStream>,
    pack_build: TokenStream,
}

/// Builds the call surface, or reports why the member cannot be emitted.
fn call_surface(
    member: &ProxyMember,
    packs: &PackSet,
    owner: &ProxyName,
    diags: &mut Vec<Diagnostic>,
) -> Option<CallSurface> {
    // A missing carrier means pack synthesis already reported this
    // signature; skip the member without a second diagnostic.
    let pack_name = packs.name_for(&member.signature())?;
    let pack_ident = format_ident!("{}", pack_name);

    let mut params = Vec::new();
    let mut fields = Vec::new();
    for (index, param) in member.params.iter().enumerate() {
        let arg = format_ident!("{}", param.name);
        let field = format_ident!("arg{}", index);
        let ty = match emit::parse_type(&param_wire_type(param)) {
            Ok(ty) => ty,
            Err(reason) => {
                diags.push(Diagnostic::unsupported_member_shape(
                    &owner.full_name(),
                    &member.name,
                    &reason,
                ));
                return None;
            }
        };
        params.push(quote! { #arg: #ty });
        fields.push(quote! { #field: #arg });
    }

    let pack_build = quote! {
        let pack = #pack_ident { #(#fields,)* };
        let pack = ::mirage::message::encode_pack(&pack)?;
    };

    Some(CallSurface { params, pack_build })
}

/// Emits the three construction paths for one implementation constructor.
fn emit_constructor(
    vis: &TokenStream,
    member: &ProxyMember,
    packs: &PackSet,
    owner: &ProxyName,
    diags: &mut Vec<Diagnostic>,
) -> TokenStream {
    let Some(surface) = call_surface(member, packs, owner, diags) else {
        return TokenStream::new();
    };
    let CallSurface { params, pack_build } = surface;

    let blocking_ident = format_ident!("{}", member.name);
    let async_ident = format_ident!("{}_async", member.name);
    let args: Vec<_> = member
        .params
        .iter()
        .map(|p| format_ident!("{}", p.name))
        .collect();

    let deprecation = format!(
        "blocks the calling thread until the remote round trip completes; \
         use `{}` instead",
        async_ident
    );
    let blocking_doc = "Synchronous construction path, kept for call-site compatibility.";
    let async_doc = format!(
        "Creates the remote instance and returns its local stand-in. \
         The instance id is allocated before the creation message is sent; \
         on failure the acquired executor owner is disposed and the error \
         is re-raised. A `cancel` token cancelled before the message is \
         sent fails the factory without registering anything. \
         (remote constructor: `{}`)",
        member.name
    );

    quote! {
        #[doc = #blocking_doc]
        #[deprecated(note = #deprecation)]
        #vis fn #blocking_ident(
            provider: &dyn ::mirage::provider::OwnerProvider,
            #(#params,)*
        ) -> ::mirage::shell::Result<Self> {
            ::mirage::shell::block_on(Self::#async_ident(
                provider,
                #(#args,)*
                ::mirage::cancel::CancelToken::never(),
            ))
        }

        #[doc = #async_doc]
        #vis async fn #async_ident(
            provider: &dyn ::mirage::provider::OwnerProvider,
            #(#params,)*
            cancel: ::mirage::cancel::CancelToken,
        ) -> ::mirage::shell::Result<Self> {
            #pack_build
            let (owner, instance_id) = ::mirage::shell::create_object(
                provider,
                &Self::CREATION_CONTEXT,
                pack,
                &cancel,
            )
            .await?;
            Ok(Self::from_raw(owner, instance_id))
        }
    }
}

/// Emits one forwarding member.
fn emit_forwarding(
    vis: &TokenStream,
    member: &ProxyMember,
    packs: &PackSet,
    owner: &ProxyName,
    diags: &mut Vec<Diagnostic>,
) -> TokenStream {
    let Some(surface) = call_surface(member, packs, owner, diags) else {
        return TokenStream::new();
    };
    let CallSurface { params, pack_build } = surface;

    let method_ident = format_ident!("{}", member.name);
    let method_name = member.name.clone();
    let doc = format!("Forwards `{}` to the remote instance.", member.name);

    let (return_ty, unwrap_reply) = match &member.result {
        Some(result) => match emit::parse_type(result) {
            Ok(ty) => (
                quote! { #ty },
                quote! { Ok(::mirage::message::decode_pack(&reply)?) },
            ),
            Err(reason) => {
                diags.push(Diagnostic::unsupported_member_shape(
                    &owner.full_name(),
                    &member.name,
                    &reason,
                ));
                return TokenStream::new();
            }
        },
        None => (
            quote! { () },
            quote! {
                let _ = reply;
                Ok(())
            },
        ),
    };

    quote! {
        #[doc = #doc]
        #vis async fn #method_ident(
            &self,
            #(#params,)*
        ) -> ::mirage::shell::Result<#return_ty> {
            let reply = {
                #pack_build
                self.shell
                    .invoke(#method_name, pack, &::mirage::cancel::CancelToken::never())
                    .await?
            };
            #unwrap_reply
        }
    }
}
