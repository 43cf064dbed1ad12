//! Derive macro for the `Component` trait.

use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::DeriveInput;

pub(crate) fn impl_component(input: DeriveInput, crate_root: &Ident) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "component types with generic parameters cannot be registered",
        ));
    }

    let type_name = &input.ident;

    let type_path_tail = format!("::{}", type_name);
    let type_path = quote!(concat!(module_path!(), #type_path_tail));

    Ok(quote! {
        impl #crate_root::component::Component for #type_name {
            const COMPONENT_TAG: #crate_root::component::ComponentTag =
                #crate_root::component::ComponentTag::from_u64(
                    #crate_root::const_fnv1a_hash::fnv1a_hash_str_64(#type_path),
                );
        }

        #crate_root::inventory::submit! {
            #crate_root::component::ComponentDescriptor::new::<#type_name>(#type_path)
        }

        // Every component is also the single-component shape of itself.
        impl #crate_root::shape::Shape for #type_name {
            fn collect_columns(layout: &mut #crate_root::shape::ShapeLayout) {
                layout.add::<Self>();
            }

            fn write_components(self, writer: &mut #crate_root::archetype::RowWriter<'_>) {
                writer.write(self);
            }
        }
    })
}
