//! Parsing of `#[derive(Host)]` input.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// A parsed host struct.
#[derive(Debug)]
pub struct HostDef {
    pub name: Ident,
    pub generics: Generics,
    pub fields: Vec<MemberDef>,
}

/// How a field takes part in the host's member table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// One member named after the field (or its rename)
    Plain { member_name: String },
    /// The field's own type is a host; its members are lifted
    Flatten,
    Skip,
}

#[derive(Debug)]
pub struct MemberDef {
    pub ident: Ident,
    pub ty: Type,
    pub kind: MemberKind,
}

impl HostDef {
    pub fn members(&self) -> impl Iterator<Item = &MemberDef> {
        self.fields.iter().filter(|f| f.kind != MemberKind::Skip)
    }
}

pub fn parse_host(input: &DeriveInput) -> Result<HostDef> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "Host can only be derived for structs",
        ));
    };
    Ok(HostDef {
        name: input.ident.clone(),
        generics: input.generics.clone(),
        fields: parse_fields(&data.fields)?,
    })
}

fn parse_fields(fields: &Fields) -> Result<Vec<MemberDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Host requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

fn parse_field(field: &Field) -> Result<MemberDef> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let kind = parse_field_attrs(&field.attrs, &ident)?;
    Ok(MemberDef {
        ident,
        ty: field.ty.clone(),
        kind,
    })
}

fn parse_field_attrs(attrs: &[Attribute], ident: &Ident) -> Result<MemberKind> {
    let mut rename: Option<String> = None;
    let mut skip = false;
    let mut flatten = false;

    for attr in attrs {
        if !attr.path().is_ident("host") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if rename.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate host attribute: rename",
                    ));
                }
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    rename = Some(lit_str.value());
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        value,
                        "expected string literal for rename",
                    ))
                }
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else if meta.path.is_ident("flatten") {
                flatten = true;
                Ok(())
            } else {
                Err(meta.error("unknown host attribute, expected rename, skip or flatten"))
            }
        })?;
    }

    match (skip, flatten, rename) {
        (true, true, _) => Err(Error::new_spanned(
            ident,
            "a field cannot be both skipped and flattened",
        )),
        (_, true, Some(_)) => Err(Error::new_spanned(
            ident,
            "a flattened field has no member name to rename",
        )),
        (true, false, _) => Ok(MemberKind::Skip),
        (false, true, None) => Ok(MemberKind::Flatten),
        (false, false, rename) => Ok(MemberKind::Plain {
            member_name: rename.unwrap_or_else(|| ident.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_plain_rename_skip_flatten() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                id: i64,
                #[host(rename = "CustomerId")]
                customer: i64,
                #[host(skip)]
                cache: Vec<u8>,
                #[host(flatten)]
                audit: Audit,
            }
        };
        let def = parse_host(&input).unwrap();
        let kinds: Vec<_> = def.fields.iter().map(|f| f.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                MemberKind::Plain {
                    member_name: "id".to_string()
                },
                MemberKind::Plain {
                    member_name: "CustomerId".to_string()
                },
                MemberKind::Skip,
                MemberKind::Flatten,
            ]
        );
        assert_eq!(def.members().count(), 3);
    }

    #[test]
    fn test_unknown_attribute_errors() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[host(primary)]
                id: i64,
            }
        };
        let err = parse_host(&input).unwrap_err();
        assert!(err.to_string().contains("unknown host attribute"));
    }

    #[test]
    fn test_flatten_with_rename_errors() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[host(flatten, rename = "x")]
                audit: Audit,
            }
        };
        assert!(parse_host(&input).is_err());
    }

    #[test]
    fn test_tuple_struct_rejected() {
        let input: DeriveInput = parse_quote! {
            struct Pair(i64, i64);
        };
        assert!(parse_host(&input).is_err());
    }

    #[test]
    fn test_enum_rejected() {
        let input: DeriveInput = parse_quote! {
            enum Kind { A, B }
        };
        let err = parse_host(&input).unwrap_err();
        assert!(err.to_string().contains("only be derived for structs"));
    }
}
