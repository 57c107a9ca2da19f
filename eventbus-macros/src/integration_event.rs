use crate::utils::{apply_derives, ensure_required_fields};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    Expr, Item, LitStr, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input,
    punctuated::Punctuated,
};

/// #[integration_event] 宏实现
/// - 仅支持具名字段结构体
/// - 确保字段：`id: String`, `created_at: ::eventbus::integration_event::Timestamp`
/// - 合并派生：Debug, Clone, serde::Serialize, serde::Deserialize
/// - 生成 `::eventbus::integration_event::IntegrationEvent` 实现与 `new(..)` 构造函数
/// - 支持：`#[integration_event(name = "...")]` 覆写事件名（默认结构体名）
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let st = match &mut input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[integration_event] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let fields = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    // 构造函数参数：调用方自己声明的字段（不含 id / created_at）
    let payload_fields: Vec<(syn::Ident, Type)> = fields
        .named
        .iter()
        .filter_map(|f| f.ident.clone().map(|i| (i, f.ty.clone())))
        .filter(|(i, _)| i != "id" && i != "created_at")
        .collect();

    let id_ty: Type = syn::parse_quote! { String };
    let ts_ty: Type = syn::parse_quote! { ::eventbus::integration_event::Timestamp };
    ensure_required_fields(fields, &[("id", &id_ty), ("created_at", &ts_ty)]);

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let name = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let args = payload_fields.iter().map(|(i, t)| quote! { #i: #t });
    let inits = payload_fields.iter().map(|(i, _)| quote! { #i });

    let out = quote! {
        #st

        impl #impl_generics #ident #ty_generics #where_clause {
            /// 以新生成的事件标识与当前时间构造事件
            pub fn new(#( #args ),*) -> Self {
                Self {
                    id: ::eventbus::integration_event::new_event_id(),
                    created_at: ::eventbus::integration_event::now(),
                    #( #inits, )*
                }
            }
        }

        impl #impl_generics ::eventbus::integration_event::IntegrationEvent for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;

            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> ::eventbus::integration_event::Timestamp {
                self.created_at
            }
        }
    };

    TokenStream::from(out)
}

// 解析键值参数：name = "..."
struct EventAttrConfig {
    name: Option<LitStr>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut name: Option<LitStr> = None;

        let pairs = Punctuated::<syn::ExprAssign, Token![,]>::parse_terminated(input)?;
        for assign in pairs {
            let key = match &*assign.left {
                Expr::Path(p) if p.path.segments.len() == 1 => p.path.segments[0].ident.clone(),
                other => return Err(syn::Error::new(other.span(), "invalid attribute key")),
            };
            match key.to_string().as_str() {
                "name" => {
                    if name.is_some() {
                        return Err(syn::Error::new(key.span(), "duplicate key 'name' in attribute"));
                    }
                    name = Some(match *assign.right {
                        Expr::Lit(syn::ExprLit {
                            lit: syn::Lit::Str(lit),
                            ..
                        }) => lit,
                        other => {
                            return Err(syn::Error::new(
                                other.span(),
                                "expected string literal for 'name'",
                            ));
                        }
                    });
                }
                _ => return Err(syn::Error::new(key.span(), "unknown key; expected 'name'")),
            }
        }

        Ok(Self { name })
    }
}
