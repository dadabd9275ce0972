//! Code generation: turns a parsed schema into the Registrar and Proxy
//! construct trees plus the Server/Target transport roots for each role.
//!
//! Generated type names are derived from the role name and the camel-cased
//! module segments. For a role `Backend` with module path `api/roles`, the
//! registration-side node is `BackendApiRoles` and the call-side node is
//! `BackendApiRolesProxy`. The root constructs are `BackendRegistrar`,
//! `BackendProxy`, `BackendServer`, and `BackendTarget`.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};

use crate::paths::{join, resolve_role_paths, SchemaError};
use crate::schema::{BindingMode, InterfaceNode, MethodSignature, RoleDef, Schema, ValueType};

pub fn code_for_schema(schema: &Schema) -> Result<TokenStream, SchemaError> {
    // Path collisions across modules are structural errors, not parse
    // errors; reject them before emitting anything.
    for role in &schema.roles {
        resolve_role_paths(role)?;
    }

    let role_enum = code_for_role_enum(schema);
    let roles = schema.roles.iter().map(|role| {
        let counterparts: Vec<&RoleDef> = schema
            .roles
            .iter()
            .filter(|other| other.name != role.name)
            .collect();
        code_for_role(role, &counterparts)
    });
    Ok(quote! {
        #role_enum
        #(#roles)*
    })
}

/// One variant per declared role. Connecting endpoints pass a variant to
/// `connect` as the identity announced during the handshake.
fn code_for_role_enum(schema: &Schema) -> TokenStream {
    let variants: Vec<syn::Ident> = schema
        .roles
        .iter()
        .map(|role| syn::Ident::new(&role.name.0, Span::call_site()))
        .collect();
    let names: Vec<&str> = schema.roles.iter().map(|role| role.name.0.as_str()).collect();
    quote! {
        /// The role identities declared in the schema file.
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::std::marker::Copy,
            ::std::cmp::PartialEq,
            ::std::cmp::Eq,
        )]
        pub enum Role {
            #(#variants,)*
        }
        impl Role {
            pub fn as_str(self) -> &'static str {
                match self {
                    #(Role::#variants => #names,)*
                }
            }
        }
    }
}

fn code_for_role(role: &RoleDef, counterparts: &[&RoleDef]) -> TokenStream {
    let mut registrar_nodes = Vec::new();
    registrar_structs(&role.name.0, &role.root, &[], &mut registrar_nodes);
    let mut proxy_nodes = Vec::new();
    proxy_structs(&role.name.0, &role.root, &[], &mut proxy_nodes);

    let server = code_for_server_root(role, counterparts);
    let target = code_for_target_root(role);
    quote! {
        #(#registrar_nodes)*
        #(#proxy_nodes)*
        #server
        #target
    }
}

fn registrar_ident(role: &str, segments: &[&str]) -> syn::Ident {
    if segments.is_empty() {
        format_ident!("{role}Registrar")
    } else {
        format_ident!("{role}{}", camel_join(segments))
    }
}

fn proxy_ident(role: &str, segments: &[&str]) -> syn::Ident {
    if segments.is_empty() {
        format_ident!("{role}Proxy")
    } else {
        format_ident!("{role}{}Proxy", camel_join(segments))
    }
}

fn camel_join(segments: &[&str]) -> String {
    let mut joined = String::new();
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            joined.extend(first.to_uppercase());
            joined.push_str(chars.as_str());
        }
    }
    joined
}

/// Emits the registration-side node for `node` and, recursively, for all of
/// its descendants.
fn registrar_structs(role: &str, node: &InterfaceNode, segments: &[&str], out: &mut Vec<TokenStream>) {
    let struct_ident = registrar_ident(role, segments);
    let prefix = segments.iter().fold(String::new(), |acc, s| join(&acc, s));

    let child_fields: Vec<syn::Ident> = node
        .modules
        .iter()
        .map(|child| syn::Ident::new(&child.name.0, Span::call_site()))
        .collect();
    let child_types: Vec<syn::Ident> = node
        .modules
        .iter()
        .map(|child| {
            let mut child_segments = segments.to_vec();
            child_segments.push(&child.name.0);
            registrar_ident(role, &child_segments)
        })
        .collect();

    let bind_methods = node
        .methods
        .iter()
        .map(|method| code_for_bind_method(method, &prefix));

    let doc = if segments.is_empty() {
        format!("Registration-side root for the `{role}` role.")
    } else {
        format!(
            "Registration-side node for module `{}` of the `{role}` role.",
            prefix
        )
    };
    out.push(quote! {
        #[doc = #doc]
        pub struct #struct_ident {
            core: ::pathcall_lib::internal_for_macro::RegistrarCore,
            #(pub #child_fields: #child_types,)*
        }
        impl #struct_ident {
            pub fn new() -> Self {
                Self {
                    core: ::pathcall_lib::internal_for_macro::RegistrarCore::new(),
                    #(#child_fields: #child_types::new(),)*
                }
            }

            /// Attaches this node and every descendant to a dispatcher,
            /// flushing bindings buffered before attachment.
            pub fn attach(&mut self, dispatcher: &::pathcall_lib::Dispatcher) {
                self.core.attach(dispatcher);
                #(self.#child_fields.attach(dispatcher);)*
            }

            #(#bind_methods)*
        }
        impl ::std::default::Default for #struct_ident {
            fn default() -> Self {
                Self::new()
            }
        }
    });

    for child in &node.modules {
        let mut child_segments = segments.to_vec();
        child_segments.push(&child.name.0);
        registrar_structs(role, child, &child_segments, out);
    }
}

fn code_for_bind_method(method: &MethodSignature, prefix: &str) -> TokenStream {
    let bind_ident = format_ident!("bind_{}", method.name.0);
    let path = join(prefix, &method.name.0);
    let mode = match method.mode {
        BindingMode::Handler => {
            quote! { ::pathcall_lib::internal_for_macro::BindingMode::Handler }
        }
        BindingMode::Callback => {
            quote! { ::pathcall_lib::internal_for_macro::BindingMode::Callback }
        }
    };
    let param_types: Vec<TokenStream> = method
        .params
        .iter()
        .map(|(_, value_type)| value_type_tokens(value_type))
        .collect();
    let output = match &method.return_type {
        Some(value_type) => value_type_tokens(value_type),
        None => quote! { () },
    };
    let doc = format!("Binds the handler dispatched at path `{path}`.");
    quote! {
        #[doc = #doc]
        pub fn #bind_ident<H, Fut>(&mut self, handler: H) -> ::pathcall_lib::BindStatus
        where
            H: ::std::ops::Fn(#(#param_types),*) -> Fut
                + ::std::marker::Send
                + ::std::marker::Sync
                + ::std::clone::Clone
                + 'static,
            Fut: ::std::future::Future<Output = #output> + ::std::marker::Send + 'static,
        {
            self.core.bind(
                #mode,
                #path,
                ::pathcall_lib::internal_for_macro::raw_handler(handler),
            )
        }
    }
}

/// Emits the call-side node for `node` and, recursively, for all of its
/// descendants. Root methods are left to the Target root, which owns the
/// call channel directly.
fn proxy_structs(role: &str, node: &InterfaceNode, segments: &[&str], out: &mut Vec<TokenStream>) {
    let struct_ident = proxy_ident(role, segments);
    let prefix = segments.iter().fold(String::new(), |acc, s| join(&acc, s));

    let child_fields: Vec<syn::Ident> = node
        .modules
        .iter()
        .map(|child| syn::Ident::new(&child.name.0, Span::call_site()))
        .collect();
    let child_types: Vec<syn::Ident> = node
        .modules
        .iter()
        .map(|child| {
            let mut child_segments = segments.to_vec();
            child_segments.push(&child.name.0);
            proxy_ident(role, &child_segments)
        })
        .collect();

    let call_methods = node
        .methods
        .iter()
        .map(|method| code_for_proxy_method(method, &prefix));

    let doc = if segments.is_empty() {
        format!("Call-side root for the `{role}` role.")
    } else {
        format!("Call-side node for module `{}` of the `{role}` role.", prefix)
    };
    out.push(quote! {
        #[doc = #doc]
        pub struct #struct_ident {
            channel: ::pathcall_lib::CallChannel,
            #(pub #child_fields: #child_types,)*
        }
        impl #struct_ident {
            pub fn new(channel: ::pathcall_lib::CallChannel) -> Self {
                Self {
                    #(#child_fields: #child_types::new(channel.clone()),)*
                    channel,
                }
            }

            #(#call_methods)*
        }
    });

    for child in &node.modules {
        let mut child_segments = segments.to_vec();
        child_segments.push(&child.name.0);
        proxy_structs(role, child, &child_segments, out);
    }
}

fn code_for_proxy_method(method: &MethodSignature, prefix: &str) -> TokenStream {
    let method_ident = syn::Ident::new(&method.name.0, Span::call_site());
    let path = join(prefix, &method.name.0);
    let param_names: Vec<syn::Ident> = method
        .params
        .iter()
        .map(|(name, _)| syn::Ident::new(&name.0, Span::call_site()))
        .collect();
    let param_types: Vec<TokenStream> = method
        .params
        .iter()
        .map(|(_, value_type)| value_type_tokens(value_type))
        .collect();

    let doc = format!("Invokes the peer's binding at path `{path}`.");
    match &method.return_type {
        Some(return_type) => {
            let return_tokens = value_type_tokens(return_type);
            quote! {
                #[doc = #doc]
                pub async fn #method_ident(
                    &self,
                    #(#param_names: #param_types),*
                ) -> ::std::result::Result<#return_tokens, ::pathcall_lib::CallError> {
                    let params = ::std::vec![
                        #(::pathcall_lib::internal_for_macro::to_value(#param_names)?),*
                    ];
                    let value = self.channel.call(#path, params).await?;
                    ::pathcall_lib::internal_for_macro::from_value(value)
                        .map_err(::pathcall_lib::CallError::from)
                }
            }
        }
        None => quote! {
            #[doc = #doc]
            pub async fn #method_ident(
                &self,
                #(#param_names: #param_types),*
            ) -> ::std::result::Result<(), ::pathcall_lib::CallError> {
                let params = ::std::vec![
                    #(::pathcall_lib::internal_for_macro::to_value(#param_names)?),*
                ];
                let _ = self.channel.call(#path, params).await?;
                Ok(())
            }
        },
    }
}

fn code_for_server_root(role: &RoleDef, counterparts: &[&RoleDef]) -> TokenStream {
    let role_name = role.name.0.as_str();
    let server_ident = format_ident!("{role_name}Server");
    let peer_ident = format_ident!("{role_name}Peer");
    let registrar_root = registrar_ident(role_name, &[]);

    let peer_variants: Vec<TokenStream> = counterparts
        .iter()
        .map(|counterpart| {
            let variant = syn::Ident::new(&counterpart.name.0, Span::call_site());
            let proxy_root = proxy_ident(&counterpart.name.0, &[]);
            quote! { #variant(#proxy_root) }
        })
        .collect();
    let match_arms: Vec<TokenStream> = counterparts
        .iter()
        .map(|counterpart| {
            let announced = counterpart.name.0.as_str();
            let variant = syn::Ident::new(&counterpart.name.0, Span::call_site());
            let proxy_root = proxy_ident(&counterpart.name.0, &[]);
            quote! {
                #announced => callback(#peer_ident::#variant(#proxy_root::new(
                    accepted.channel(),
                ))),
            }
        })
        .collect();

    let peer_doc = format!("A connected peer of a `{role_name}` host, by announced role.");
    let server_doc = format!(
        "Hosting root for the `{role_name}` role: accepts connections and owns \
         the dispatcher behind `handlers`."
    );
    quote! {
        #[doc = #peer_doc]
        pub enum #peer_ident {
            #(#peer_variants,)*
        }

        #[doc = #server_doc]
        pub struct #server_ident {
            server: ::pathcall_lib::Server,
            pub handlers: #registrar_root,
        }
        impl #server_ident {
            pub fn new(options: ::pathcall_lib::ServerOptions, enable_sockets: bool) -> Self {
                let server = ::pathcall_lib::Server::new(options, enable_sockets, #role_name);
                let mut handlers = #registrar_root::new();
                handlers.attach(server.dispatcher());
                Self { server, handlers }
            }

            /// Binds the listener and returns the accept-loop future.
            pub async fn run(
                &self,
            ) -> ::std::result::Result<
                impl ::std::future::Future<Output = ()> + ::std::marker::Send + 'static,
                ::pathcall_lib::ServerError,
            > {
                self.server.run().await
            }

            /// Ceases accepting connections.
            pub fn stop(&self) -> ::std::result::Result<(), ::pathcall_lib::ServerError> {
                self.server.stop()
            }

            /// The bound address, available once `run` has returned.
            pub fn local_addr(&self) -> ::std::option::Option<::std::net::SocketAddr> {
                self.server.local_addr()
            }

            /// Registers a callback invoked once per accepted connection,
            /// with the peer's Proxy tree for issuing calls back to it.
            /// Connections announcing a role not declared in the schema are
            /// logged and not reported.
            pub fn on_connection<F>(&self, callback: F)
            where
                F: ::std::ops::Fn(#peer_ident) + ::std::marker::Send + ::std::marker::Sync + 'static,
            {
                self.server.on_connection(move |accepted| {
                    let _ = &callback;
                    match accepted.role() {
                        #(#match_arms)*
                        other => ::pathcall_lib::internal_for_macro::unmatched_role(
                            #role_name,
                            other,
                        ),
                    }
                });
            }
        }
    }
}

fn code_for_target_root(role: &RoleDef) -> TokenStream {
    let role_name = role.name.0.as_str();
    let target_ident = format_ident!("{role_name}Target");

    let child_fields: Vec<syn::Ident> = role
        .root
        .modules
        .iter()
        .map(|child| syn::Ident::new(&child.name.0, Span::call_site()))
        .collect();
    let child_types: Vec<syn::Ident> = role
        .root
        .modules
        .iter()
        .map(|child| proxy_ident(role_name, &[child.name.0.as_str()]))
        .collect();

    let root_methods: Vec<TokenStream> = role
        .root
        .methods
        .iter()
        .map(|method| code_for_proxy_method(method, ""))
        .collect();
    // Only store the channel when root-level methods call through it;
    // module proxies hold their own clones.
    let (channel_field, channel_init) = if root_methods.is_empty() {
        (quote! {}, quote! {})
    } else {
        (
            quote! { channel: ::pathcall_lib::CallChannel, },
            quote! { channel: target.channel(), },
        )
    };

    let doc = format!(
        "Connecting root for calling into a `{role_name}` host. Holds the \
         flattened Proxy tree of the host's bindings."
    );
    quote! {
        #[doc = #doc]
        pub struct #target_ident {
            target: ::pathcall_lib::Target,
            #channel_field
            #(pub #child_fields: #child_types,)*
        }
        impl #target_ident {
            /// Connects eagerly and announces `identity` as this endpoint's
            /// role before any call is routed.
            pub async fn connect(
                options: ::pathcall_lib::TargetOptions,
                identity: Role,
            ) -> ::std::io::Result<Self> {
                let target = ::pathcall_lib::Target::connect(options, identity.as_str()).await?;
                ::std::io::Result::Ok(Self {
                    #channel_init
                    #(#child_fields: #child_types::new(target.channel()),)*
                    target,
                })
            }

            /// Attach point for this endpoint's own Registrar tree, so the
            /// host can call back over the same connection.
            pub fn dispatcher(&self) -> &::pathcall_lib::Dispatcher {
                self.target.dispatcher()
            }

            #(#root_methods)*
        }
    }
}

fn value_type_tokens(value_type: &ValueType) -> TokenStream {
    match value_type {
        ValueType::String => quote! { ::std::string::String },
        ValueType::Int => quote! { i64 },
        ValueType::Float => quote! { f64 },
        ValueType::Bool => quote! { bool },
        ValueType::Object => quote! { ::pathcall_lib::internal_for_macro::Value },
        ValueType::List(inner) => {
            let inner_tokens = value_type_tokens(inner);
            quote! { ::std::vec::Vec<#inner_tokens> }
        }
    }
}
