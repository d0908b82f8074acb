//! The extension points implemented by concrete message types.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::attachment::{Compressible, Decompressible};
use super::builder::{MessageBuilder, ViewData};
use super::MailError;

/// Per-type field registry, usually generated with
/// `#[derive(MailableFields)]`.
///
/// The derive embeds the type's name, locates the [`MessageBuilder`] field
/// and exposes every other `pub` field (minus `#[mail(skip)]` ones) to the
/// templates.
pub trait MailableFields {
    const NAME: &'static str;

    /// Title-cased type name used when the builder has no subject, e.g.
    /// `OrderShipped` becomes `Order Shipped`.
    const TITLE: &'static str;

    /// Identifier of this type's queued job.
    const JOB_TYPE: &'static str;

    fn builder(&self) -> &MessageBuilder;

    fn builder_mut(&mut self) -> &mut MessageBuilder;

    /// Public state of the concrete type, excluding the builder itself.
    fn public_fields(&self) -> Result<ViewData, serde_json::Error>;
}

/// A message type that can be rendered, sent or queued.
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, MailableFields)]
/// pub struct OrderShipped {
///     pub order_id: u64,
///     #[mail(skip)]
///     pub customer: Customer,
///     mail: MessageBuilder,
/// }
///
/// impl Mailable for OrderShipped {
///     fn build(&mut self) -> Result<(), MailError> {
///         let customer = self.customer.clone();
///         self.mail.to(&customer).html_view("orders.shipped");
///         Ok(())
///     }
/// }
/// ```
pub trait Mailable:
    MailableFields + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Configure the builder from the type's own fields.
    ///
    /// Runs once per delivery attempt on a clone of the caller's value, before
    /// anything is rendered.
    fn build(&mut self) -> Result<(), MailError> {
        Ok(())
    }

    /// Shrink state before it is pushed onto a queue.
    fn compress(&mut self) {
        self.builder_mut().compress();
    }

    /// Undo [`Mailable::compress`] inside the queued job.
    fn decompress(&mut self) -> Result<(), MailError> {
        self.builder_mut().decompress()
    }
}
