use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn, LitStr, ReturnType};

/// Turns a render function into a function component.
///
/// ```ignore
/// #[function_component]
/// fn Greeting(props: &Props) -> RenderResult {
///     Ok(text(format!("hello {}", props.get_str("name").unwrap_or("world"))))
/// }
///
/// root.render(component(Greeting).prop("name", "fiber"));
/// ```
///
/// The function keeps its body but moves under a hidden name; `Greeting`
/// becomes a `ComponentType` constant usable with `component(..)`. An
/// optional string argument overrides the name shown in logs and errors:
/// `#[function_component("Greeting")]`.
#[proc_macro_attribute]
pub fn function_component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let display_name = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };
    let func = parse_macro_input!(item as ItemFn);
    match expand(display_name, func) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(error) => TokenStream::from(error.to_compile_error()),
    }
}

fn expand(display_name: Option<LitStr>, mut func: ItemFn) -> syn::Result<TokenStream2> {
    let sig = &func.sig;
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "function components cannot be generic",
        ));
    }
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.asyncness,
            "function components cannot be async",
        ));
    }
    if sig.inputs.len() != 1 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "function components take exactly one argument: `props: &Props`",
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new_spanned(
            receiver,
            "function components cannot take `self`",
        ));
    }
    if matches!(sig.output, ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "function components must return `RenderResult`",
        ));
    }

    let vis = func.vis.clone();
    let component_ident = func.sig.ident.clone();
    let render_ident = Ident::new(
        &format!("__fiber_render_{}", component_ident),
        Span::call_site(),
    );
    let name = display_name
        .unwrap_or_else(|| LitStr::new(&component_ident.to_string(), component_ident.span()));
    let docs: Vec<_> = func
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .cloned()
        .collect();

    func.sig.ident = render_ident.clone();
    func.attrs.retain(|attr| !attr.path().is_ident("doc"));

    Ok(quote! {
        #(#docs)*
        #[allow(non_upper_case_globals)]
        #vis const #component_ident: fiber_core::ComponentType =
            fiber_core::ComponentType::new(#name, #render_ident);

        #[doc(hidden)]
        #[allow(non_snake_case)]
        #func
    })
}
