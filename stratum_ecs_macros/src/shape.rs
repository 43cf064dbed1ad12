//! Derive macro for the `Shape` trait.

use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Fields};

pub(crate) fn impl_shape(input: DeriveInput, crate_root: &Ident) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "shape types with generic parameters are not supported",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().cloned().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(fields) => {
                return Err(syn::Error::new_spanned(
                    fields,
                    "`Shape` can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "`Shape` can only be derived for structs",
            ));
        }
    };

    let type_name = &input.ident;
    let field_names: Vec<_> = fields
        .iter()
        .map(|field| field.ident.clone().unwrap())
        .collect();
    let field_types: Vec<_> = fields.iter().map(|field| field.ty.clone()).collect();

    let shape_impl = quote! {
        impl #crate_root::shape::Shape for #type_name {
            fn collect_columns(layout: &mut #crate_root::shape::ShapeLayout) {
                #(<#field_types as #crate_root::shape::Shape>::collect_columns(layout);)*
            }

            fn write_components(self, writer: &mut #crate_root::archetype::RowWriter<'_>) {
                let Self { #(#field_names),* } = self;
                #(#crate_root::shape::Shape::write_components(#field_names, writer);)*
            }
        }
    };

    // One membership route per field, so that `ShapeContains` resolves
    // through nested shape fragments as well as direct components.
    let contains_impls = field_types.iter().enumerate().map(|(idx, field_type)| {
        quote! {
            impl<QueriedComponent, Route>
                #crate_root::shape::ShapeContains<QueriedComponent, #crate_root::shape::Elem<#idx, Route>>
                for #type_name
            where
                QueriedComponent: #crate_root::component::Component,
                #field_type: #crate_root::shape::ShapeContains<QueriedComponent, Route>,
            {
            }
        }
    });

    Ok(quote! {
        #shape_impl
        #(#contains_impls)*
    })
}
