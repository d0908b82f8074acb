use heck::ToTitleCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Type, Visibility};

#[derive(Default)]
struct FieldAttrs {
    builder: bool,
    skip: bool,
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("mail") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("builder") {
                attrs.builder = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `builder` or `skip`"))
            }
        })?;
    }
    Ok(attrs)
}

fn is_message_builder(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "MessageBuilder"),
        _ => false,
    }
}

pub(crate) fn mailable_fields_derive_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "MailableFields requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "MailableFields can only be derived for structs",
            ))
        }
    };

    let mut marked = None;
    let mut by_type = None;
    let mut exposed = Vec::new();

    for field in fields {
        let attrs = field_attrs(field)?;
        let ident = field.ident.as_ref();

        if attrs.builder {
            if marked.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field may be marked #[mail(builder)]",
                ));
            }
            marked = ident;
            continue;
        }
        if is_message_builder(&field.ty) {
            by_type = by_type.or(ident);
            continue;
        }
        if attrs.skip || !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }
        exposed.extend(ident);
    }

    let builder = marked.or(by_type).ok_or_else(|| {
        syn::Error::new_spanned(
            name,
            "no MessageBuilder field found; mark one with #[mail(builder)]",
        )
    })?;

    let keys = exposed.iter().map(|ident| ident.to_string());
    let type_name = name.to_string();
    let title = type_name.to_title_case();

    Ok(quote! {
        impl #impl_generics ::courier::mail::MailableFields for #name #ty_generics #where_clause {
            const NAME: &'static str = #type_name;
            const TITLE: &'static str = #title;
            const JOB_TYPE: &'static str = concat!(module_path!(), "::", #type_name);

            fn builder(&self) -> &::courier::mail::MessageBuilder {
                &self.#builder
            }

            fn builder_mut(&mut self) -> &mut ::courier::mail::MessageBuilder {
                &mut self.#builder
            }

            fn public_fields(
                &self,
            ) -> ::core::result::Result<
                ::courier::mail::ViewData,
                ::courier::__private::serde_json::Error,
            > {
                #[allow(unused_mut)]
                let mut fields = ::courier::mail::ViewData::new();
                #(
                    fields.insert(
                        ::std::string::String::from(#keys),
                        ::courier::__private::serde_json::to_value(&self.#exposed)?,
                    );
                )*
                ::core::result::Result::Ok(fields)
            }
        }
    })
}
