//! Procedural macros for sqlweave.
//!
//! `#[derive(Host)]` generates the accessor table a property token binds
//! to, so the statement builder can read and write struct fields without
//! runtime reflection. Members are matched to entity properties by name,
//! ignoring ASCII case.

use proc_macro::TokenStream;

mod parse;

use parse::{HostDef, MemberKind, parse_host};

/// Derive macro for the `Host` trait.
///
/// Every named field becomes a member unless skipped. Field types must
/// convert to and from `sqlweave_core::Value`.
///
/// # Attributes
///
/// - `#[host(rename = "Name")]` - Member name used to match a property
/// - `#[host(skip)]` - Not visible to property tokens
/// - `#[host(flatten)]` - Field is itself a `Host`; its members are lifted
///   onto this type (embedded components)
///
/// # Example
///
/// ```ignore
/// use sqlweave::Host;
///
/// #[derive(Host)]
/// struct Order {
///     id: i64,
///     #[host(rename = "CustomerId")]
///     customer: i64,
///     #[host(flatten)]
///     audit: Audit,
/// }
/// ```
#[proc_macro_derive(Host, attributes(host))]
pub fn derive_host(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let host = match parse_host(&input) {
        Ok(h) => h,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_host_impl(&host).into()
}

fn generate_host_impl(host: &HostDef) -> proc_macro2::TokenStream {
    let name = &host.name;
    let (impl_generics, ty_generics, where_clause) = host.generics.split_for_impl();

    let pushes = host.members().map(|member| {
        let ident = &member.ident;
        let ty = &member.ty;
        match &member.kind {
            MemberKind::Plain { member_name } => quote::quote! {
                members.push(sqlweave_core::Member::new(
                    #member_name,
                    |host: &Self| sqlweave_core::Value::from(host.#ident.clone()),
                    |host: &mut Self, value: sqlweave_core::Value| {
                        host.#ident = <#ty as ::core::convert::TryFrom<sqlweave_core::Value>>::try_from(value)?;
                        Ok(())
                    },
                ));
            },
            MemberKind::Flatten => quote::quote! {
                for member in <#ty as sqlweave_core::Host>::members() {
                    members.push(member.project::<Self>(
                        |host: &Self| &host.#ident,
                        |host: &mut Self| &mut host.#ident,
                    ));
                }
            },
            MemberKind::Skip => quote::quote! {},
        }
    });

    quote::quote! {
        impl #impl_generics sqlweave_core::Host for #name #ty_generics #where_clause {
            fn members() -> Vec<sqlweave_core::Member<Self>> {
                let mut members = Vec::new();
                #(#pushes)*
                members
            }
        }
    }
}
