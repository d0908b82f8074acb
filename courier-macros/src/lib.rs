extern crate proc_macro;

mod mailable;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive `courier::mail::MailableFields` for a struct that embeds a
/// `MessageBuilder`.
///
/// The builder field is the one marked `#[mail(builder)]`, or else the one
/// whose type is named `MessageBuilder`. Every other `pub` field is exposed to
/// templates under its own name unless marked `#[mail(skip)]`. Fields must
/// implement `Serialize`.
///
/// ### Example
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize, courier::MailableFields)]
/// pub struct OrderShipped {
///     // available to templates as `order_id`
///     pub order_id: u64,
///
///     // public, but kept out of the template data
///     #[mail(skip)]
///     pub customer: Customer,
///
///     // private fields are never exposed
///     tracking_secret: String,
///
///     mail: MessageBuilder,
/// }
///
/// assert_eq!(OrderShipped::NAME, "OrderShipped");
/// ```
///
/// The generated `JOB_TYPE` is `module_path!()::TypeName`, which identifies the
/// type's queued jobs.
#[proc_macro_derive(MailableFields, attributes(mail))]
pub fn mailable_fields_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    mailable::mailable_fields_derive_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
